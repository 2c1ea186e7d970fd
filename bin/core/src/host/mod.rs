//! Host-level probes. Each probe is a fixed command (no caller
//! input) executed through the host's executor, with a defensive
//! parser on this side.

use armada_client::{
  entities::{ExecResult, host::HostConfig},
  error::Result,
};

use crate::exec::{default_exec_opts, exec_checked, exec_on_host};

pub mod parse;

/// The fixed composite resources probe. Sections are separated by
/// a `---` sentinel; the two /proc/stat samples a second apart
/// yield the cpu busy percentage.
pub const RESOURCES_SCRIPT: &str = "\
hostname
echo ---
uptime
echo ---
cat /proc/loadavg
echo ---
nproc
echo ---
head -n1 /proc/stat; sleep 1; head -n1 /proc/stat
echo ---
grep -E 'MemTotal|MemFree|MemAvailable' /proc/meminfo
echo ---
df -P -B1 -x tmpfs -x devtmpfs -x overlay";

/// Run a fixed shell script on a host. Only compile-time constant
/// scripts go through here; caller input never does.
pub async fn run_fixed_script(
  host: &HostConfig,
  script: &str,
) -> Result<ExecResult> {
  exec_on_host(
    host,
    "sh",
    &[String::from("-c"), script.to_string()],
    &default_exec_opts(),
  )
  .await
}

pub async fn resources(
  host: &HostConfig,
) -> Result<armada_client::entities::host::HostResources> {
  let res = run_fixed_script(host, RESOURCES_SCRIPT).await?;
  Ok(parse::parse_resources(&host.name, &res.stdout))
}

pub async fn uptime(
  host: &HostConfig,
) -> Result<armada_client::entities::host::HostUptime> {
  let res = exec_checked(
    host,
    "uptime",
    &[],
    &default_exec_opts(),
  )
  .await?;
  let (uptime, load_average) =
    parse::parse_uptime_line(res.stdout.trim());
  Ok(armada_client::entities::host::HostUptime {
    host: host.name.clone(),
    uptime,
    load_average,
  })
}
