use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which discovery layer produced a compose file path.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DiscoverySource {
  /// `docker compose ls` on the live daemon.
  DockerLs,
  /// Filesystem scan of the configured search roots.
  Scan,
}

/// A resolved `(host, project) → compose file` mapping in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredProject {
  pub host: String,
  pub project: String,
  pub compose_file_path: String,
  pub source: DiscoverySource,
}

/// One cached project entry. Freshness is per entry, not per file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedProject {
  pub path: String,
  pub name: String,
  pub discovered_from: DiscoverySource,
  /// Unix millis of the last sighting; compared against the TTL.
  pub last_seen: i64,
}

/// On-disk cache document, one JSON file per host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostDiscovery {
  #[serde(default)]
  pub last_scan: i64,
  #[serde(default)]
  pub search_paths: Vec<String>,
  #[serde(default)]
  pub projects: HashMap<String, CachedProject>,
}

/// One project as reported by `docker compose ls` or the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeProjectInfo {
  pub host: String,
  pub name: String,
  pub status: Option<String>,
  pub compose_files: Vec<String>,
}

/// Raw `docker compose ls --format json` item. Tolerates both
/// capitalizations seen across compose versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerComposeLsItem {
  #[serde(default, alias = "Name")]
  pub name: String,
  #[serde(default, alias = "Status")]
  pub status: Option<String>,
  /// Comma separated list of paths
  #[serde(default, alias = "ConfigFiles")]
  pub config_files: String,
}

impl DockerComposeLsItem {
  pub fn config_file_list(&self) -> Vec<String> {
    self
      .config_files
      .split(',')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_string)
      .collect()
  }
}

/// Raw `docker compose ps --format json` line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposePsItem {
  #[serde(default, alias = "Name")]
  pub name: String,
  #[serde(default, alias = "Service")]
  pub service: String,
  #[serde(default, alias = "State")]
  pub state: String,
  #[serde(default, alias = "Status")]
  pub status: String,
  #[serde(default, alias = "Image")]
  pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeActionResponse {
  pub host: String,
  pub project: String,
  pub compose_file: String,
  pub output: crate::entities::ExecResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeRecreateResponse {
  pub host: String,
  pub project: String,
  pub compose_file: String,
  pub down: crate::entities::ExecResult,
  pub up: crate::entities::ExecResult,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compose_ls_item_parses_capitalized_fields() {
    let raw = r#"[
      { "Name": "plex", "Status": "running(2)", "ConfigFiles": "/stacks/plex/compose.yml" },
      { "Name": "", "ConfigFiles": "" },
      { "name": "arr", "config_files": "/a.yml,/b.yml" }
    ]"#;
    let items: Vec<DockerComposeLsItem> =
      serde_json::from_str(raw).unwrap();
    assert_eq!(items[0].name, "plex");
    assert_eq!(
      items[0].config_file_list(),
      vec!["/stacks/plex/compose.yml"]
    );
    assert!(items[1].name.is_empty());
    assert_eq!(items[2].config_file_list(), vec!["/a.yml", "/b.yml"]);
  }

  #[test]
  fn host_discovery_defaults_on_partial_document() {
    let doc: HostDiscovery =
      serde_json::from_str("{\"last_scan\": 5}").unwrap();
    assert_eq!(doc.last_scan, 5);
    assert!(doc.projects.is_empty());
  }
}
