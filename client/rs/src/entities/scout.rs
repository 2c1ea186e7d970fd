use serde::{Deserialize, Serialize};

use crate::entities::{
  docker::container::ProcessList,
  host::DiskUsage,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileContent {
  pub host: String,
  pub path: String,
  pub content: String,
  pub size_bytes: u64,
  /// Set when the file was larger than the requested cap.
  pub truncated: bool,
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
pub enum FileKind {
  #[default]
  File,
  Directory,
  Symlink,
  Other,
}

impl FileKind {
  /// From `find -printf %y` type characters.
  pub fn from_type_char(c: char) -> FileKind {
    match c {
      'f' => FileKind::File,
      'd' => FileKind::Directory,
      'l' => FileKind::Symlink,
      _ => FileKind::Other,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
  pub path: String,
  pub kind: FileKind,
  pub size_bytes: u64,
  /// Unix seconds of the last modification.
  pub modified: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostFileListing {
  pub host: String,
  pub path: String,
  pub entries: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStat {
  pub path: String,
  pub kind: FileKind,
  pub size_bytes: u64,
  pub modified: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeekResult {
  pub host: String,
  pub stat: FileStat,
  pub head: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindResult {
  pub host: String,
  pub matches: Vec<FileEntry>,
  /// Set when the match count hit the requested limit.
  pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
  pub source_host: String,
  pub source_path: String,
  pub dest_host: String,
  pub dest_path: String,
  pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitResult {
  pub host: String,
  pub path: String,
  pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
  pub identical: bool,
  pub source_lines: usize,
  pub dest_lines: usize,
  /// First differing lines, `-`/`+` prefixed, bounded.
  pub changes: Vec<String>,
  pub truncated: bool,
}

/// Directory-level comparison via recursive checksums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaResult {
  pub source_host: String,
  pub dest_host: String,
  pub added: Vec<String>,
  pub removed: Vec<String>,
  pub changed: Vec<String>,
  pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostProcesses {
  pub host: String,
  pub processes: ProcessList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDf {
  pub host: String,
  pub disks: Vec<DiskUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZfsPool {
  pub name: String,
  pub size_bytes: u64,
  pub alloc_bytes: u64,
  pub free_bytes: u64,
  pub capacity_percent: f64,
  pub health: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZfsDataset {
  pub name: String,
  pub used_bytes: u64,
  pub available_bytes: u64,
  pub referenced_bytes: u64,
  pub mountpoint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZfsSnapshot {
  pub name: String,
  pub used_bytes: u64,
  pub referenced_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostZfsPools {
  pub host: String,
  pub pools: Vec<ZfsPool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostZfsDatasets {
  pub host: String,
  pub datasets: Vec<ZfsDataset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostZfsSnapshots {
  pub host: String,
  pub snapshots: Vec<ZfsSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLines {
  pub host: String,
  pub source: String,
  pub lines: Vec<String>,
}
