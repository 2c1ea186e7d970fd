use serde::{Deserialize, Serialize};

/// How the control plane reaches a host's Docker Engine.
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
pub enum HostProtocol {
  /// Unix-domain Engine connection.
  #[default]
  Socket,
  Http,
  Https,
  /// SSH for both command execution and Engine access.
  Ssh,
}

/// One managed host. Immutable after load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
  /// Unique registry identifier (letters, digits, `-`, `_`).
  pub name: String,
  /// Hostname, IP, or absolute path to a local Unix socket.
  pub host: String,
  #[serde(default)]
  pub protocol: HostProtocol,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub port: Option<u16>,
  /// Also recognized when `host` starts with `/`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub socket_path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ssh_user: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ssh_key_path: Option<String>,
  /// Client TLS material, required for `https` Engine connections.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tls_key_path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tls_cert_path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tls_ca_path: Option<String>,
  /// Ordered absolute directories to scan for compose files.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub compose_search_paths: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<String>,
}

impl HostConfig {
  /// The Unix socket path, from `socket_path` or a `host`
  /// starting with `/`.
  pub fn unix_socket(&self) -> Option<&str> {
    if let Some(path) = self.socket_path.as_deref() {
      return Some(path);
    }
    self.host.starts_with('/').then_some(self.host.as_str())
  }

  /// Presence of `ssh_user` OR a non-loopback `host` triggers SSH
  /// execution mode for CLI-level operations.
  pub fn is_ssh_execution(&self) -> bool {
    if self.protocol == HostProtocol::Ssh {
      return true;
    }
    self.ssh_user.is_some() || !self.is_local()
  }

  pub fn is_local(&self) -> bool {
    self.unix_socket().is_some()
      || matches!(
        self.host.as_str(),
        "localhost" | "127.0.0.1" | "::1" | ""
      )
  }

  /// `user@host` destination for SSH dialing.
  pub fn ssh_destination(&self) -> String {
    match self.ssh_user.as_deref() {
      Some(user) => format!("{user}@{}", self.host),
      None => self.host.clone(),
    }
  }

  /// Non-sensitive summary for startup logs and `scout.nodes`.
  pub fn sanitized(&self) -> HostSummary {
    HostSummary {
      name: self.name.clone(),
      host: self.host.clone(),
      protocol: self.protocol,
      tags: self.tags.clone(),
    }
  }
}

impl std::fmt::Display for HostConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.name)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSummary {
  pub name: String,
  pub host: String,
  pub protocol: HostProtocol,
  pub tags: Vec<String>,
}

/// Reachability summary for `host.status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostStatus {
  pub host: String,
  pub reachable: bool,
  pub engine_version: Option<String>,
  pub containers_running: Option<i64>,
  pub containers_total: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
  pub total_bytes: u64,
  pub used_bytes: u64,
  pub free_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
  pub filesystem: String,
  pub mount: String,
  pub total_bytes: u64,
  pub used_bytes: u64,
  pub available_bytes: u64,
}

/// Parsed output of the fixed resources probe command.
/// Sections which fail to parse are left at their zero values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostResources {
  pub host: String,
  pub hostname: String,
  pub uptime: String,
  pub load_average: [f64; 3],
  pub cores: u32,
  pub cpu_percent: f64,
  pub memory: MemoryUsage,
  pub disks: Vec<DiskUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostUptime {
  pub host: String,
  pub uptime: String,
  pub load_average: [f64; 3],
}

/// Engine + system info for `host.info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostInfo {
  pub host: String,
  pub engine_version: Option<String>,
  pub os: Option<String>,
  pub kernel_version: Option<String>,
  pub architecture: Option<String>,
  pub cpus: Option<i64>,
  pub memory_bytes: Option<i64>,
  pub storage_driver: Option<String>,
  pub containers: Option<i64>,
  pub containers_running: Option<i64>,
  pub images: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceUnit {
  pub unit: String,
  pub load: String,
  pub active: String,
  pub sub: String,
  pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostServices {
  pub host: String,
  pub services: Vec<ServiceUnit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkInterface {
  pub name: String,
  pub state: String,
  pub addresses: Vec<String>,
  pub mac: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostNetwork {
  pub host: String,
  pub interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountEntry {
  pub target: String,
  pub source: String,
  pub fstype: String,
  pub options: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostMounts {
  pub host: String,
  pub mounts: Vec<MountEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListeningPort {
  pub protocol: String,
  pub address: String,
  pub port: u16,
  pub process: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostPorts {
  pub host: String,
  pub ports: Vec<ListeningPort>,
}

/// One row of the `host.doctor` check battery. Check failures are
/// rows, not request errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorCheck {
  pub check: String,
  pub ok: bool,
  pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReport {
  pub host: String,
  pub checks: Vec<DoctorCheck>,
}
