use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One published port. Ports with only null bindings are dropped
/// during summarization; a port with at least one valid binding is
/// kept with its first valid binding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortSummary {
  pub container_port: u16,
  pub protocol: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub host_ip: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub host_port: Option<u16>,
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContainerState {
  #[default]
  Unknown,
  Created,
  Running,
  Paused,
  Restarting,
  Exited,
  Removing,
  Dead,
}

/// One row of a container listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerInfo {
  pub host: String,
  pub id: String,
  pub name: String,
  pub image: String,
  pub state: ContainerState,
  pub status: Option<String>,
  pub created: Option<i64>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub ports: Vec<PortSummary>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub networks: Vec<String>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub labels: HashMap<String, String>,
}

/// Focused inspect output. The full Engine payload is deliberately
/// not mirrored; `container.recreate` works on the raw Engine config
/// server side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerDetails {
  pub host: String,
  pub id: String,
  pub name: String,
  pub image: String,
  pub state: ContainerState,
  pub status: Option<String>,
  pub created: Option<String>,
  pub started_at: Option<String>,
  pub exit_code: Option<i64>,
  pub restart_count: Option<i64>,
  pub restart_policy: Option<String>,
  pub network_mode: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub ports: Vec<PortSummary>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub mounts: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cmd: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub entrypoint: Vec<String>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub labels: HashMap<String, String>,
}

/// Single point-in-time stats row, already reduced from the Engine's
/// cumulative counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerStatsRow {
  pub host: String,
  pub name: String,
  pub cpu_percent: f64,
  pub memory_usage_bytes: u64,
  pub memory_limit_bytes: u64,
  pub memory_percent: f64,
  pub network_rx_bytes: u64,
  pub network_tx_bytes: u64,
  pub block_read_bytes: u64,
  pub block_write_bytes: u64,
  pub pids: u64,
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogStream {
  #[default]
  Stdout,
  Stderr,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEntry {
  /// RFC3339 timestamp when requested, otherwise empty.
  pub timestamp: String,
  pub stream: LogStream,
  pub message: String,
}

/// `docker top` style process listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessList {
  pub titles: Vec<String>,
  pub rows: Vec<Vec<String>>,
}
