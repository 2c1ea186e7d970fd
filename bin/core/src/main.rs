#[macro_use]
extern crate tracing;

use std::{net::SocketAddr, str::FromStr};

use anyhow::Context;

mod api;
mod compose;
mod config;
mod docker;
mod exec;
mod helpers;
mod host;
mod registry;
mod server;
mod ssh;
mod state;

async fn app() -> anyhow::Result<()> {
  let config = config::core_config();
  logger::init(&config.logging)?;

  info!("Armada Core version: v{}", env!("CARGO_PKG_VERSION"));
  info!("{:?}", config.sanitized());

  // Crash on an invalid registry now, not on the first request.
  info!(
    "{} host(s) registered",
    state::host_registry().list().len()
  );

  ssh::spawn_pool_maintainer();

  let addr = SocketAddr::from_str(&format!(
    "{}:{}",
    config.bind_ip, config.port
  ))
  .context("invalid bind address")?;
  let listener = tokio::net::TcpListener::bind(&addr)
    .await
    .with_context(|| format!("failed to bind {addr}"))?;
  info!("Armada Core listening on {addr}");

  axum::serve(listener, server::router().into_make_service())
    .await
    .context("server crashed")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  let mut term_signal = tokio::signal::unix::signal(
    tokio::signal::unix::SignalKind::terminate(),
  )?;

  let app = tokio::spawn(app());

  tokio::select! {
    res = app => return res?,
    _ = term_signal.recv() => {
      info!("Closing pooled ssh sessions for shutdown");
      state::ssh_pool().close_all().await;
    },
  }

  Ok(())
}
