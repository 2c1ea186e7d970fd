use std::{path::PathBuf, sync::OnceLock};

use armada_client::entities::{
  host::HostConfig,
  logger::{LogConfig, LogLevel, StdioLogMode},
};
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "core", about = "Armada control plane")]
pub struct CliArgs {
  /// Path to the TOML config file.
  #[arg(long)]
  pub config_path: Option<PathBuf>,
  /// Override the logging level.
  #[arg(long)]
  pub log_level: Option<tracing::Level>,
}

/// Environment overrides, `ARMADA_` prefixed.
#[derive(Deserialize, Debug, Default)]
pub struct Env {
  #[serde(default)]
  pub armada_config_path: Option<PathBuf>,
  /// JSON array of host records; takes priority over the
  /// config file's host list when set.
  #[serde(default)]
  pub armada_hosts: Option<String>,
  #[serde(default)]
  pub armada_cache_ttl_hours: Option<u64>,
  #[serde(default)]
  pub armada_cache_dir: Option<PathBuf>,
  #[serde(default)]
  pub armada_ssh_max_per_host: Option<usize>,
  #[serde(default)]
  pub armada_ssh_idle_ttl_secs: Option<u64>,
  #[serde(default)]
  pub armada_ssh_acquire_timeout_secs: Option<u64>,
  #[serde(default)]
  pub armada_ssh_health_probe_interval_secs: Option<u64>,
  #[serde(default)]
  pub armada_command_timeout_secs: Option<u64>,
  #[serde(default)]
  pub armada_exec_timeout_secs: Option<u64>,
  #[serde(default)]
  pub armada_max_buffer_bytes: Option<usize>,
  #[serde(default)]
  pub armada_build_timeout_secs: Option<u64>,
  #[serde(default)]
  pub armada_default_socket_path: Option<String>,
  #[serde(default)]
  pub armada_port: Option<u16>,
  #[serde(default)]
  pub armada_bind_ip: Option<String>,
  #[serde(default)]
  pub armada_logging_level: Option<LogLevel>,
  #[serde(default)]
  pub armada_logging_stdio: Option<StdioLogMode>,
  #[serde(default)]
  pub armada_logging_pretty: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CoreConfig {
  /// The managed fleet.
  #[serde(default, rename = "host")]
  pub hosts: Vec<HostConfig>,

  /// Compose discovery cache entry TTL.
  #[serde(default = "default_cache_ttl_hours")]
  pub cache_ttl_hours: u64,

  /// Directory holding one cache file per host.
  #[serde(default = "default_cache_dir")]
  pub cache_dir: PathBuf,

  /// SSH pool: max live sessions per host.
  #[serde(default = "default_ssh_max_per_host")]
  pub ssh_max_per_host: usize,

  /// SSH pool: idle session eviction age.
  #[serde(default = "default_ssh_idle_ttl_secs")]
  pub ssh_idle_ttl_secs: u64,

  /// SSH pool: max wait for a session at the per-host cap.
  #[serde(default = "default_ssh_acquire_timeout_secs")]
  pub ssh_acquire_timeout_secs: u64,

  /// SSH pool: idle health probe cadence.
  #[serde(default = "default_ssh_health_probe_interval_secs")]
  pub ssh_health_probe_interval_secs: u64,

  /// Default deadline for host commands.
  #[serde(default = "default_command_timeout_secs")]
  pub command_timeout_secs: u64,

  /// Default deadline for container exec.
  #[serde(default = "default_exec_timeout_secs")]
  pub exec_timeout_secs: u64,

  /// Per-stream output cap for every executor.
  #[serde(default = "default_max_buffer_bytes")]
  pub max_buffer_bytes: usize,

  /// Deadline for image builds.
  #[serde(default = "default_build_timeout_secs")]
  pub build_timeout_secs: u64,

  /// Engine socket used for hosts without an explicit path.
  #[serde(default = "default_socket_path")]
  pub default_socket_path: String,

  /// Scan roots appended to each host's own search paths.
  #[serde(default = "default_compose_search_paths")]
  pub compose_search_paths: Vec<String>,

  #[serde(default = "default_port")]
  pub port: u16,

  #[serde(default = "default_bind_ip")]
  pub bind_ip: String,

  #[serde(default)]
  pub logging: LogConfig,
}

fn default_cache_ttl_hours() -> u64 {
  24
}

fn default_cache_dir() -> PathBuf {
  PathBuf::from(".cache/compose-projects")
}

fn default_ssh_max_per_host() -> usize {
  5
}

fn default_ssh_idle_ttl_secs() -> u64 {
  300
}

fn default_ssh_acquire_timeout_secs() -> u64 {
  30
}

fn default_ssh_health_probe_interval_secs() -> u64 {
  60
}

fn default_command_timeout_secs() -> u64 {
  30
}

fn default_exec_timeout_secs() -> u64 {
  30
}

fn default_max_buffer_bytes() -> usize {
  10 * 1024 * 1024
}

fn default_build_timeout_secs() -> u64 {
  600
}

fn default_socket_path() -> String {
  String::from("/var/run/docker.sock")
}

fn default_compose_search_paths() -> Vec<String> {
  vec![String::from("/opt/compose"), String::from("/srv/compose")]
}

fn default_port() -> u16 {
  9120
}

fn default_bind_ip() -> String {
  String::from("127.0.0.1")
}

impl Default for CoreConfig {
  fn default() -> Self {
    toml::from_str("")
      .expect("default CoreConfig must deserialize from empty toml")
  }
}

impl CoreConfig {
  /// Copy safe to log at startup.
  pub fn sanitized(&self) -> CoreConfig {
    let mut config = self.clone();
    for host in &mut config.hosts {
      if host.ssh_key_path.is_some() {
        host.ssh_key_path = Some(String::from("<redacted>"));
      }
    }
    config
  }

  fn validate(&self) -> anyhow::Result<()> {
    use anyhow::{Context, anyhow};
    if self.cache_ttl_hours == 0
      || self.ssh_max_per_host == 0
      || self.ssh_idle_ttl_secs == 0
      || self.ssh_acquire_timeout_secs == 0
      || self.ssh_health_probe_interval_secs == 0
      || self.command_timeout_secs == 0
      || self.exec_timeout_secs == 0
      || self.max_buffer_bytes == 0
      || self.build_timeout_secs == 0
    {
      return Err(anyhow!(
        "durations, caps and pool bounds must be positive"
      ));
    }
    for host in &self.hosts {
      validations::validate_host_name(&host.name)
        .with_context(|| format!("host '{}'", host.name))?;
    }
    Ok(())
  }
}

pub fn core_args() -> &'static CliArgs {
  static CORE_ARGS: OnceLock<CliArgs> = OnceLock::new();
  // The test harness owns argv in unit tests.
  CORE_ARGS.get_or_init(|| {
    if cfg!(test) {
      CliArgs {
        config_path: None,
        log_level: None,
      }
    } else {
      CliArgs::parse()
    }
  })
}

pub fn core_config() -> &'static CoreConfig {
  static CORE_CONFIG: OnceLock<CoreConfig> = OnceLock::new();
  CORE_CONFIG.get_or_init(|| {
    let env: Env = envy::from_env()
      .expect("failed to parse armada environment");
    let args = core_args();

    let config_path = args
      .config_path
      .as_ref()
      .or(env.armada_config_path.as_ref());

    let config = match config_path {
      Some(path) => {
        let contents =
          std::fs::read_to_string(path).unwrap_or_else(|e| {
            panic!(
              "failed to read config at {} | {e}",
              path.display()
            )
          });
        toml::from_str(&contents).unwrap_or_else(|e| {
          panic!(
            "failed to parse config at {} | {e}",
            path.display()
          )
        })
      }
      None => CoreConfig::default(),
    };

    let config = merge_env(config, env);
    config
      .validate()
      .expect("invalid armada configuration");
    config
  })
}

fn merge_env(mut config: CoreConfig, env: Env) -> CoreConfig {
  if let Some(hosts) = env.armada_hosts {
    config.hosts = serde_json::from_str(&hosts)
      .expect("failed to parse ARMADA_HOSTS as a JSON host list");
  }
  if let Some(v) = env.armada_cache_ttl_hours {
    config.cache_ttl_hours = v;
  }
  if let Some(v) = env.armada_cache_dir {
    config.cache_dir = v;
  }
  if let Some(v) = env.armada_ssh_max_per_host {
    config.ssh_max_per_host = v;
  }
  if let Some(v) = env.armada_ssh_idle_ttl_secs {
    config.ssh_idle_ttl_secs = v;
  }
  if let Some(v) = env.armada_ssh_acquire_timeout_secs {
    config.ssh_acquire_timeout_secs = v;
  }
  if let Some(v) = env.armada_ssh_health_probe_interval_secs {
    config.ssh_health_probe_interval_secs = v;
  }
  if let Some(v) = env.armada_command_timeout_secs {
    config.command_timeout_secs = v;
  }
  if let Some(v) = env.armada_exec_timeout_secs {
    config.exec_timeout_secs = v;
  }
  if let Some(v) = env.armada_max_buffer_bytes {
    config.max_buffer_bytes = v;
  }
  if let Some(v) = env.armada_build_timeout_secs {
    config.build_timeout_secs = v;
  }
  if let Some(v) = env.armada_default_socket_path {
    config.default_socket_path = v;
  }
  if let Some(v) = env.armada_port {
    config.port = v;
  }
  if let Some(v) = env.armada_bind_ip {
    config.bind_ip = v;
  }
  if let Some(v) = env.armada_logging_level {
    config.logging.level = v;
  }
  if let Some(v) = env.armada_logging_stdio {
    config.logging.stdio = v;
  }
  if let Some(v) = env.armada_logging_pretty {
    config.logging.pretty = v;
  }
  if let Some(level) = core_args().log_level {
    config.logging.level = level.into();
  }
  config
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_sane() {
    let config = CoreConfig::default();
    assert_eq!(config.cache_ttl_hours, 24);
    assert_eq!(config.ssh_max_per_host, 5);
    assert_eq!(config.ssh_acquire_timeout_secs, 30);
    assert_eq!(config.max_buffer_bytes, 10 * 1024 * 1024);
    assert!(config.hosts.is_empty());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn parses_host_table() {
    let config: CoreConfig = toml::from_str(
      r#"
      cache_ttl_hours = 6

      [[host]]
      name = "tower"
      host = "192.168.1.10"
      protocol = "ssh"
      ssh_user = "root"
      compose_search_paths = ["/mnt/user/compose"]

      [[host]]
      name = "local"
      host = "/var/run/docker.sock"
      "#,
    )
    .unwrap();
    assert_eq!(config.cache_ttl_hours, 6);
    assert_eq!(config.hosts.len(), 2);
    assert_eq!(config.hosts[0].name, "tower");
    assert!(config.hosts[0].is_ssh_execution());
    assert!(config.hosts[1].is_local());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn rejects_bad_host_names_and_zero_bounds() {
    let config: CoreConfig = toml::from_str(
      r#"
      [[host]]
      name = "bad name"
      host = "10.0.0.1"
      "#,
    )
    .unwrap();
    assert!(config.validate().is_err());

    let config: CoreConfig =
      toml::from_str("ssh_max_per_host = 0").unwrap();
    assert!(config.validate().is_err());
  }

  #[test]
  fn sanitized_redacts_key_paths() {
    let config: CoreConfig = toml::from_str(
      r#"
      [[host]]
      name = "tower"
      host = "10.0.0.1"
      ssh_key_path = "/root/.ssh/id_ed25519"
      "#,
    )
    .unwrap();
    let sanitized = config.sanitized();
    assert_eq!(
      sanitized.hosts[0].ssh_key_path.as_deref(),
      Some("<redacted>")
    );
  }
}
