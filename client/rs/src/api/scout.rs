use resolver_api::Resolve;
use serde::{Deserialize, Serialize};

use crate::{
  api::default_lines,
  entities::{
    ExecResult,
    host::HostSummary,
    scout::{
      DeltaResult, DiffResult, EmitResult, FileContent, FindResult,
      HostDf, HostFileListing, HostProcesses, HostZfsDatasets,
      HostZfsPools, HostZfsSnapshots, LogLines, PeekResult,
      TransferResult,
    },
  },
  error::Error,
};

pub const MAX_READ_BYTES: u64 = 2 * 1024 * 1024;
pub const MAX_EMIT_BYTES: usize = 1024 * 1024;
pub const MAX_TREE_DEPTH: i64 = 8;
pub const MAX_FIND_LIMIT: i64 = 500;
pub const MAX_DELTA_FILES: usize = 2000;

fn default_read_bytes() -> u64 {
  256 * 1024
}

fn default_tree_depth() -> i64 {
  3
}

fn default_find_depth() -> i64 {
  4
}

fn default_find_limit() -> i64 {
  100
}

fn default_peek_lines() -> i64 {
  20
}

/// Read a remote file with a size cap; oversized content is
/// truncated and flagged.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(FileContent)]
#[error(Error)]
pub struct ScoutRead {
  pub host: String,
  pub path: String,
  /// Max 2 MiB.
  #[serde(default = "default_read_bytes", alias = "maxSize")]
  pub max_size: u64,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(HostFileListing)]
#[error(Error)]
pub struct ScoutList {
  pub host: String,
  pub path: String,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(HostFileListing)]
#[error(Error)]
pub struct ScoutTree {
  pub host: String,
  pub path: String,
  /// Max 8.
  #[serde(default = "default_tree_depth")]
  pub depth: i64,
}

//

/// Run an allow-listed command on a host.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ExecResult)]
#[error(Error)]
pub struct ScoutExec {
  pub host: String,
  pub command: String,
  /// Max 300000.
  #[serde(default, alias = "timeoutMs")]
  pub timeout_ms: Option<u64>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(FindResult)]
#[error(Error)]
pub struct ScoutFind {
  pub host: String,
  pub path: String,
  /// `find -name` pattern.
  #[serde(default)]
  pub name: Option<String>,
  /// `f` or `d`.
  #[serde(default)]
  pub file_type: Option<String>,
  /// Max 8.
  #[serde(default = "default_find_depth")]
  pub depth: i64,
  /// Max 500.
  #[serde(default = "default_find_limit")]
  pub limit: i64,
}

//

/// Copy one file between hosts through the control plane.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(TransferResult)]
#[error(Error)]
pub struct ScoutTransfer {
  pub source_host: String,
  pub source_path: String,
  pub dest_host: String,
  pub dest_path: String,
  /// Max 2 MiB.
  #[serde(default = "default_read_bytes", alias = "maxSize")]
  pub max_size: u64,
}

//

/// Line-level comparison of one file across two hosts.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(DiffResult)]
#[error(Error)]
pub struct ScoutDiff {
  pub source_host: String,
  pub source_path: String,
  pub dest_host: String,
  pub dest_path: String,
}

//

/// The registered fleet.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostSummary>)]
#[error(Error)]
pub struct ScoutNodes {}

//

/// `stat` plus a bounded head preview.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(PeekResult)]
#[error(Error)]
pub struct ScoutPeek {
  pub host: String,
  pub path: String,
  /// Max 200.
  #[serde(default = "default_peek_lines")]
  pub lines: i64,
}

//

/// Recursive checksum comparison of a directory across two hosts.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(DeltaResult)]
#[error(Error)]
pub struct ScoutDelta {
  pub source_host: String,
  pub source_path: String,
  pub dest_host: String,
  pub dest_path: String,
}

//

/// Write caller-supplied content to a remote path.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(EmitResult)]
#[error(Error)]
pub struct ScoutEmit {
  pub host: String,
  pub path: String,
  /// Max 1 MiB.
  pub content: String,
}

//

/// Recursive directory copy between hosts via tar stream.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(TransferResult)]
#[error(Error)]
pub struct ScoutBeam {
  pub source_host: String,
  pub source_path: String,
  pub dest_host: String,
  pub dest_path: String,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostProcesses>)]
#[error(Error)]
pub struct ScoutPs {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostDf>)]
#[error(Error)]
pub struct ScoutDfRequest {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostZfsPools>)]
#[error(Error)]
pub struct ScoutZfsPools {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostZfsDatasets>)]
#[error(Error)]
pub struct ScoutZfsDatasets {
  #[serde(default)]
  pub host: Option<String>,
  /// Restrict to one pool.
  #[serde(default)]
  pub pool: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostZfsSnapshots>)]
#[error(Error)]
pub struct ScoutZfsSnapshots {
  #[serde(default)]
  pub host: Option<String>,
  /// Restrict to one dataset.
  #[serde(default)]
  pub dataset: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(LogLines)]
#[error(Error)]
pub struct ScoutLogsSyslog {
  pub host: String,
  /// Max 500.
  #[serde(default = "default_lines")]
  pub lines: i64,
  #[serde(default)]
  pub grep: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(LogLines)]
#[error(Error)]
pub struct ScoutLogsJournal {
  pub host: String,
  /// Max 500.
  #[serde(default = "default_lines")]
  pub lines: i64,
  /// Restrict to one systemd unit.
  #[serde(default)]
  pub unit: Option<String>,
  #[serde(default)]
  pub grep: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(LogLines)]
#[error(Error)]
pub struct ScoutLogsDmesg {
  pub host: String,
  /// Max 500.
  #[serde(default = "default_lines")]
  pub lines: i64,
  #[serde(default)]
  pub grep: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(LogLines)]
#[error(Error)]
pub struct ScoutLogsAuth {
  pub host: String,
  /// Max 500.
  #[serde(default = "default_lines")]
  pub lines: i64,
  #[serde(default)]
  pub grep: Option<String>,
}
