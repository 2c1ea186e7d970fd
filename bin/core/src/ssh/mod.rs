//! Pooled SSH sessions, one bounded FIFO pool per host. Sessions
//! are OpenSSH control masters, so commands multiplex over one
//! authenticated connection instead of paying dial + auth per op.

use std::{
  sync::{Arc, Mutex},
  time::{Duration, Instant},
};

use anyhow::{Context, anyhow};
use armada_client::{
  entities::host::HostConfig,
  error::{Error, ErrorKind, Result},
};
use dashmap::DashMap;
use openssh::{KnownHosts, Session, SessionBuilder};
use tokio::sync::Notify;

mod pool_state;

pub use pool_state::{Checkout, PoolEntry, PoolState};

use crate::config::core_config;

const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct SshPool {
  hosts: DashMap<String, Arc<HostPool>>,
}

struct HostPool {
  state: Mutex<PoolState<Session>>,
  notify: Notify,
}

/// A leased session. Dropping the lease returns the session to the
/// pool on every exit path, including cancellation; a poisoned
/// lease is destroyed instead of reused.
pub struct SshLease {
  entry: Option<PoolEntry<Session>>,
  pool: Arc<HostPool>,
  poisoned: bool,
}

impl SshLease {
  pub fn session(&self) -> &Session {
    &self
      .entry
      .as_ref()
      .expect("ssh lease used after settlement")
      .session
  }

  /// Mark the session unusable (process killed mid-stream, control
  /// connection gone). It is closed on drop instead of reused.
  pub fn poison(&mut self) {
    self.poisoned = true;
  }
}

impl Drop for SshLease {
  fn drop(&mut self) {
    let Some(entry) = self.entry.take() else {
      return;
    };
    if self.poisoned {
      lock(&self.pool.state).discard();
      close_in_background(entry.session);
    } else {
      lock(&self.pool.state).checkin(entry);
    }
    self.pool.notify.notify_one();
  }
}

fn lock<S>(state: &Mutex<PoolState<S>>) -> std::sync::MutexGuard<'_, PoolState<S>> {
  state.lock().expect("ssh pool state mutex poisoned")
}

fn close_in_background(session: Session) {
  if let Ok(handle) = tokio::runtime::Handle::try_current() {
    handle.spawn(async move {
      let _ = session.close().await;
    });
  }
}

impl SshPool {
  fn host_pool(&self, name: &str) -> Arc<HostPool> {
    self
      .hosts
      .entry(name.to_string())
      .or_insert_with(|| {
        Arc::new(HostPool {
          state: Mutex::new(PoolState::new(
            core_config().ssh_max_per_host,
          )),
          notify: Notify::new(),
        })
      })
      .clone()
  }

  /// Lease a healthy session: first idle, else dial under the cap,
  /// else wait for a release until the acquire deadline. Every
  /// entry is health probed before it is handed out; one probe
  /// failure retries, the second raises `Connectivity`.
  pub async fn acquire(&self, host: &HostConfig) -> Result<SshLease> {
    let deadline = tokio::time::Instant::now()
      + Duration::from_secs(core_config().ssh_acquire_timeout_secs);
    let pool = self.host_pool(&host.name);
    let mut probe_failures = 0usize;

    loop {
      let checkout = lock(&pool.state).checkout();
      match checkout {
        Checkout::Idle(entry) => {
          match probe(&entry.session).await {
            Ok(()) => {
              return Ok(SshLease {
                entry: Some(entry),
                pool,
                poisoned: false,
              });
            }
            Err(e) => {
              lock(&pool.state).discard();
              pool.notify.notify_one();
              let _ = entry.session.close().await;
              probe_failures += 1;
              if probe_failures >= 2 {
                return Err(Error::new(
                  ErrorKind::Connectivity,
                  e.context(format!(
                    "ssh health probe failed twice for host {}",
                    host.name
                  )),
                ));
              }
            }
          }
        }
        Checkout::Dial => match dial(host).await {
          Ok(session) => match probe(&session).await {
            Ok(()) => {
              return Ok(SshLease {
                entry: Some(PoolEntry::new(session)),
                pool,
                poisoned: false,
              });
            }
            Err(e) => {
              lock(&pool.state).discard();
              pool.notify.notify_one();
              let _ = session.close().await;
              probe_failures += 1;
              if probe_failures >= 2 {
                return Err(Error::new(
                  ErrorKind::Connectivity,
                  e.context(format!(
                    "ssh health probe failed twice for host {}",
                    host.name
                  )),
                ));
              }
            }
          },
          Err(e) => {
            lock(&pool.state).discard();
            pool.notify.notify_one();
            return Err(Error::new(
              ErrorKind::Connectivity,
              e.context(format!(
                "failed to open ssh session to host {}",
                host.name
              )),
            ));
          }
        },
        Checkout::Full => {
          let wait =
            tokio::time::timeout_at(deadline, pool.notify.notified())
              .await;
          if wait.is_err() {
            return Err(Error::msg(
              ErrorKind::Timeout,
              format!(
                "timed out waiting for an ssh session to host {}",
                host.name
              ),
            ));
          }
        }
      }
    }
  }

  fn snapshot(&self) -> Vec<(String, Arc<HostPool>)> {
    self
      .hosts
      .iter()
      .map(|entry| (entry.key().clone(), entry.value().clone()))
      .collect()
  }

  /// Close every idle session for one host. Idempotent.
  pub async fn close_host(&self, name: &str) {
    let Some(pool) =
      self.hosts.get(name).map(|entry| entry.value().clone())
    else {
      return;
    };
    let drained = lock(&pool.state).drain_idle();
    for entry in drained {
      let _ = entry.session.close().await;
    }
    pool.notify.notify_waiters();
  }

  /// Close every idle session on every host. Idempotent.
  pub async fn close_all(&self) {
    for (name, _) in self.snapshot() {
      self.close_host(&name).await;
    }
  }

  /// Evict idle sessions older than the idle TTL.
  pub async fn evict_idle(&self, ttl: Duration) {
    for (name, pool) in self.snapshot() {
      let evicted =
        lock(&pool.state).evict_idle(ttl, Instant::now());
      if evicted.is_empty() {
        continue;
      }
      debug!(
        "evicting {} idle ssh session(s) for host {name}",
        evicted.len(),
      );
      for entry in evicted {
        let _ = entry.session.close().await;
      }
      pool.notify.notify_waiters();
    }
  }

  /// Probe idle sessions, closing the ones that fail.
  pub async fn probe_idle(&self) {
    for (name, pool) in self.snapshot() {
      let mut entries = Vec::new();
      while let Some(entry) = lock(&pool.state).pop_idle() {
        entries.push(entry);
      }
      for entry in entries {
        match probe(&entry.session).await {
          Ok(()) => lock(&pool.state).checkin(entry),
          Err(e) => {
            warn!(
              "dropping unhealthy idle ssh session for host {name} | {e:#}"
            );
            lock(&pool.state).discard();
            let _ = entry.session.close().await;
            pool.notify.notify_one();
          }
        }
      }
    }
  }
}

/// Background maintainer: idle eviction every `idle_ttl / 2` and
/// health probing of surviving idle sessions on the probe interval.
pub fn spawn_pool_maintainer() {
  tokio::spawn(async {
    let config = core_config();
    let idle_ttl = Duration::from_secs(config.ssh_idle_ttl_secs);
    let mut evict_tick =
      tokio::time::interval(idle_ttl / 2);
    let mut probe_tick = tokio::time::interval(Duration::from_secs(
      config.ssh_health_probe_interval_secs,
    ));
    loop {
      tokio::select! {
        _ = evict_tick.tick() => {
          crate::state::ssh_pool().evict_idle(idle_ttl).await;
        }
        _ = probe_tick.tick() => {
          crate::state::ssh_pool().probe_idle().await;
        }
      }
    }
  });
}

async fn dial(host: &HostConfig) -> anyhow::Result<Session> {
  let mut builder = SessionBuilder::default();
  builder
    .known_hosts_check(KnownHosts::Accept)
    .connect_timeout(DIAL_TIMEOUT);
  if let Some(user) = &host.ssh_user {
    builder.user(user.clone());
  }
  if host.protocol
    == armada_client::entities::host::HostProtocol::Ssh
    && let Some(port) = host.port
  {
    builder.port(port);
  }
  if let Some(key) = &host.ssh_key_path {
    builder.keyfile(key);
  }
  builder
    .connect(&host.host)
    .await
    .with_context(|| format!("ssh dial failed for {}", host.host))
}

/// Cheap health probe with its own deadline.
async fn probe(session: &Session) -> anyhow::Result<()> {
  let output = tokio::time::timeout(
    PROBE_TIMEOUT,
    session.command("echo").arg("ok").output(),
  )
  .await
  .context("ssh health probe timed out")?
  .context("ssh health probe failed to run")?;
  if output.status.success()
    && String::from_utf8_lossy(&output.stdout).trim() == "ok"
  {
    Ok(())
  } else {
    Err(anyhow!("ssh health probe returned failure"))
  }
}
