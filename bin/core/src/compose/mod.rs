//! Compose command construction and execution. Free-form arguments
//! have passed shell-token vetting before they reach this module;
//! everything is executed as an argument vector.

use armada_client::{
  entities::{ExecResult, compose::DiscoveredProject, host::HostConfig},
  error::Result,
};
use command::ExecOpts;

use crate::exec::exec_on_host;

pub mod cache;
pub mod discovery;
pub mod scan;

/// `docker compose -p <project> -f <file> <subcommand..>` argument
/// vector.
pub fn compose_args(
  found: &DiscoveredProject,
  subcommand: &[&str],
  extra_args: &[String],
  services: &[String],
) -> Vec<String> {
  let mut args = vec![
    String::from("compose"),
    String::from("-p"),
    found.project.clone(),
    String::from("-f"),
    found.compose_file_path.clone(),
  ];
  args.extend(subcommand.iter().map(|s| s.to_string()));
  args.extend(extra_args.iter().cloned());
  args.extend(services.iter().cloned());
  args
}

/// Run one compose subcommand on the resolved host, invalidating
/// the cache entry when the downstream reports a missing file.
pub async fn run_compose(
  host: &HostConfig,
  found: &DiscoveredProject,
  subcommand: &[&str],
  extra_args: &[String],
  services: &[String],
  opts: &ExecOpts,
) -> Result<ExecResult> {
  let args = compose_args(found, subcommand, extra_args, services);
  let res = exec_on_host(host, "docker", &args, opts).await?;
  discovery::invalidate_if_missing_file(host, &found.project, &res)
    .await;
  Ok(res)
}

#[cfg(test)]
mod tests {
  use armada_client::entities::compose::DiscoverySource;

  use super::*;

  #[test]
  fn builds_the_full_argument_vector() {
    let found = DiscoveredProject {
      host: String::from("tower"),
      project: String::from("plex"),
      compose_file_path: String::from("/stacks/plex/compose.yml"),
      source: DiscoverySource::DockerLs,
    };
    let args = compose_args(
      &found,
      &["up", "-d"],
      &[String::from("--pull")],
      &[String::from("plex")],
    );
    assert_eq!(
      args,
      vec![
        "compose",
        "-p",
        "plex",
        "-f",
        "/stacks/plex/compose.yml",
        "up",
        "-d",
        "--pull",
        "plex",
      ]
    );
  }
}
