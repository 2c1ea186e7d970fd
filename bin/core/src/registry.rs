use std::collections::HashSet;

use anyhow::{Context, anyhow};
use armada_client::{
  entities::host::{HostConfig, HostProtocol},
  error::{Error, ErrorKind, Result},
};

/// The fleet. Read-only after startup, so lookups never lock.
#[derive(Debug, Default)]
pub struct HostRegistry {
  hosts: Vec<HostConfig>,
}

impl HostRegistry {
  pub fn new(hosts: Vec<HostConfig>) -> anyhow::Result<HostRegistry> {
    let mut seen = HashSet::new();
    for host in &hosts {
      validations::validate_host_name(&host.name)?;
      if !seen.insert(host.name.as_str()) {
        return Err(anyhow!(
          "duplicate host name '{}' in registry",
          host.name
        ));
      }
      if host.protocol == HostProtocol::Ssh
        && host.ssh_user.is_none()
        && host.is_local()
      {
        return Err(anyhow!(
          "host '{}' declares protocol ssh without an ssh capable address or ssh_user",
          host.name
        ));
      }
    }
    Ok(HostRegistry { hosts })
  }

  pub fn list(&self) -> &[HostConfig] {
    &self.hosts
  }

  pub fn find_by_name(&self, name: &str) -> Result<&HostConfig> {
    self
      .hosts
      .iter()
      .find(|host| host.name == name)
      .ok_or_else(|| {
        Error::msg(
          ErrorKind::NotFound,
          format!("host '{name}' is not registered"),
        )
      })
  }

  /// One host when a name is given, the whole fleet otherwise.
  /// Used by the multi-host fan-out paths.
  pub fn all_or_one(
    &self,
    name: Option<&str>,
  ) -> Result<Vec<&HostConfig>> {
    match name {
      Some(name) => Ok(vec![self.find_by_name(name)?]),
      None => Ok(self.hosts.iter().collect()),
    }
  }
}

/// Startup-time construction with config context attached.
pub fn load_registry(
  hosts: Vec<HostConfig>,
) -> anyhow::Result<HostRegistry> {
  HostRegistry::new(hosts)
    .context("invalid host registry configuration")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn host(name: &str, addr: &str) -> HostConfig {
    HostConfig {
      name: name.to_string(),
      host: addr.to_string(),
      ..Default::default()
    }
  }

  #[test]
  fn lookup_and_all_or_one() {
    let registry = HostRegistry::new(vec![
      host("tower", "10.0.0.1"),
      host("nas", "10.0.0.2"),
    ])
    .unwrap();

    assert_eq!(
      registry.find_by_name("nas").unwrap().host,
      "10.0.0.2"
    );
    let e = registry.find_by_name("missing").unwrap_err();
    assert_eq!(e.kind, ErrorKind::NotFound);

    assert_eq!(registry.all_or_one(None).unwrap().len(), 2);
    assert_eq!(
      registry.all_or_one(Some("tower")).unwrap().len(),
      1
    );
    assert!(registry.all_or_one(Some("missing")).is_err());
  }

  #[test]
  fn rejects_duplicates() {
    assert!(
      HostRegistry::new(vec![
        host("tower", "10.0.0.1"),
        host("tower", "10.0.0.2"),
      ])
      .is_err()
    );
  }

  #[test]
  fn rejects_unroutable_ssh_protocol() {
    let mut bad = host("local", "localhost");
    bad.protocol = HostProtocol::Ssh;
    assert!(HostRegistry::new(vec![bad]).is_err());

    let mut ok = host("tower", "10.0.0.1");
    ok.protocol = HostProtocol::Ssh;
    assert!(HostRegistry::new(vec![ok]).is_ok());
  }
}
