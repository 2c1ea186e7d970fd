use resolver_api::Resolve;
use serde::{Deserialize, Serialize};

use crate::{
  entities::host::{
    DoctorReport, HostInfo, HostMounts, HostNetwork, HostPorts,
    HostResources, HostServices, HostStatus, HostUptime,
  },
  error::Error,
};

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostStatus>)]
#[error(Error)]
pub struct HostStatusRequest {
  #[serde(default)]
  pub host: Option<String>,
}

//

/// Hostname, uptime, load, cores, cpu, memory and disk rows from
/// the fixed probe command.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostResources>)]
#[error(Error)]
pub struct HostResourcesRequest {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostInfo>)]
#[error(Error)]
pub struct HostInfoRequest {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostUptime>)]
#[error(Error)]
pub struct HostUptimeRequest {
  #[serde(default)]
  pub host: Option<String>,
}

//

/// Running service units, bounded listing.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostServices>)]
#[error(Error)]
pub struct HostServicesRequest {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostNetwork>)]
#[error(Error)]
pub struct HostNetworkRequest {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostMounts>)]
#[error(Error)]
pub struct HostMountsRequest {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<HostPorts>)]
#[error(Error)]
pub struct HostPortsRequest {
  #[serde(default)]
  pub host: Option<String>,
}

//

/// Check battery: registry entry, connectivity, Engine ping, disk
/// headroom, load. Failures are rows, not request errors.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<DoctorReport>)]
#[error(Error)]
pub struct HostDoctor {
  #[serde(default)]
  pub host: Option<String>,
}
