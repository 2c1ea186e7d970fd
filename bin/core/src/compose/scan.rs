//! Filesystem scan layer: walk the configured search roots to a
//! bounded depth and map compose files to effective project names.

use armada_client::{
  entities::{
    compose::{DiscoveredProject, DiscoverySource},
    host::HostConfig,
  },
  error::Result,
};
use command::ExecOpts;

use crate::{config::core_config, exec::exec_on_host};

pub const COMPOSE_FILE_NAMES: &[&str] = &[
  "docker-compose.yml",
  "docker-compose.yaml",
  "compose.yml",
  "compose.yaml",
];

pub const MAX_SCAN_DEPTH: u32 = 3;

/// Search roots for a host: its own configured paths first, then
/// the globally configured defaults.
pub fn search_roots(host: &HostConfig) -> Vec<String> {
  let mut roots = host.compose_search_paths.clone();
  for root in &core_config().compose_search_paths {
    if !roots.contains(root) {
      roots.push(root.clone());
    }
  }
  roots
}

/// Scan a host's search roots. Roots which do not exist contribute
/// nothing; the scan is bounded by depth and never follows
/// symlinks.
pub async fn scan_host(
  host: &HostConfig,
) -> Result<Vec<DiscoveredProject>> {
  scan_roots(host, &search_roots(host)).await
}

pub async fn scan_roots(
  host: &HostConfig,
  roots: &[String],
) -> Result<Vec<DiscoveredProject>> {
  let opts = crate::exec::default_exec_opts();
  let mut projects = Vec::new();
  for root in roots {
    let root = match validations::validate_secure_path(root) {
      Ok(root) => root,
      Err(e) => {
        warn!(
          "skipping invalid compose search root on host {} | {e:#}",
          host.name
        );
        continue;
      }
    };
    for path in find_compose_files(host, &root, &opts).await? {
      let name = effective_project_name(host, &path, &opts).await;
      projects.push(DiscoveredProject {
        host: host.name.clone(),
        project: name,
        compose_file_path: path,
        source: DiscoverySource::Scan,
      });
    }
  }
  Ok(projects)
}

async fn find_compose_files(
  host: &HostConfig,
  root: &str,
  opts: &ExecOpts,
) -> Result<Vec<String>> {
  let mut args: Vec<String> = vec![
    root.to_string(),
    String::from("-maxdepth"),
    MAX_SCAN_DEPTH.to_string(),
    String::from("-type"),
    String::from("f"),
    String::from("("),
  ];
  for (i, name) in COMPOSE_FILE_NAMES.iter().enumerate() {
    if i > 0 {
      args.push(String::from("-o"));
    }
    args.push(String::from("-name"));
    args.push(name.to_string());
  }
  args.push(String::from(")"));

  let res = exec_on_host(host, "find", &args, opts).await?;
  // find exits non-zero for missing roots; whatever it did print
  // is still usable.
  Ok(
    res
      .stdout
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect(),
  )
}

/// The effective project name of a compose file:
/// a top-level `name:` field when the file declares one, otherwise
/// the lowercased directory basename.
async fn effective_project_name(
  host: &HostConfig,
  path: &str,
  opts: &ExecOpts,
) -> String {
  let head = exec_on_host(
    host,
    "head",
    &[
      String::from("-c"),
      String::from("8192"),
      path.to_string(),
    ],
    opts,
  )
  .await;
  if let Ok(res) = head
    && res.success
    && let Some(name) = project_name_from_yaml(&res.stdout)
  {
    return name;
  }
  directory_basename(path)
}

/// Parse the `name:` field out of (possibly truncated) compose file
/// contents. Full YAML parse first, line scan as the fallback for
/// files cut mid-document by the head read.
pub fn project_name_from_yaml(contents: &str) -> Option<String> {
  if let Ok(value) =
    serde_yaml_ng::from_str::<serde_yaml_ng::Value>(contents)
    && let Some(name) = value.get("name").and_then(|v| v.as_str())
    && !name.is_empty()
  {
    return Some(name.to_string());
  }
  for line in contents.lines() {
    let Some(rest) = line.strip_prefix("name:") else {
      continue;
    };
    let name = rest.trim().trim_matches('"').trim_matches('\'');
    if !name.is_empty() {
      return Some(name.to_string());
    }
  }
  None
}

pub fn directory_basename(path: &str) -> String {
  std::path::Path::new(path)
    .parent()
    .and_then(|dir| dir.file_name())
    .map(|name| name.to_string_lossy().to_lowercase())
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn name_field_wins_over_basename() {
    let contents = "name: mediastack\nservices:\n  plex:\n    image: plexinc/pms-docker\n";
    assert_eq!(
      project_name_from_yaml(contents).as_deref(),
      Some("mediastack")
    );
  }

  #[test]
  fn quoted_and_truncated_names_parse() {
    assert_eq!(
      project_name_from_yaml("name: \"media\"\nservices:\n")
        .as_deref(),
      Some("media")
    );
    // Truncated mid-mapping: not valid YAML, line scan applies.
    let truncated =
      "services:\n  plex:\n    image: x\nname: arr\n  broken";
    assert_eq!(
      project_name_from_yaml(truncated).as_deref(),
      Some("arr")
    );
  }

  #[test]
  fn no_name_field_falls_back_to_basename() {
    assert_eq!(
      project_name_from_yaml("services:\n  app:\n    image: x\n"),
      None
    );
    assert_eq!(
      directory_basename("/stacks/Plex/docker-compose.yml"),
      "plex"
    );
    assert_eq!(directory_basename("/compose.yml"), "");
  }

  #[tokio::test]
  async fn scans_roots_to_bounded_depth() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    std::fs::create_dir_all(root.join("plex")).unwrap();
    std::fs::write(
      root.join("plex/docker-compose.yml"),
      "services:\n  plex:\n    image: x\n",
    )
    .unwrap();

    std::fs::create_dir_all(root.join("named")).unwrap();
    std::fs::write(
      root.join("named/compose.yaml"),
      "name: custom\nservices:\n  app:\n    image: x\n",
    )
    .unwrap();

    // Depth 4: outside the scan bound.
    let deep = root.join("a/b/c/deep");
    std::fs::create_dir_all(&deep).unwrap();
    std::fs::write(
      deep.join("compose.yml"),
      "services:\n  app:\n    image: x\n",
    )
    .unwrap();

    let host = HostConfig {
      name: String::from("local"),
      host: String::from("localhost"),
      ..Default::default()
    };
    let roots = vec![root.to_string_lossy().to_string()];
    let mut projects = scan_roots(&host, &roots).await.unwrap();
    projects.sort_by(|a, b| a.project.cmp(&b.project));

    let names: Vec<&str> =
      projects.iter().map(|p| p.project.as_str()).collect();
    assert_eq!(names, vec!["custom", "plex"]);
    assert!(
      projects
        .iter()
        .all(|p| p.source == DiscoverySource::Scan)
    );
  }
}
