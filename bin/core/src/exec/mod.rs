//! Executor routing: local process for the control plane's own
//! host, pooled SSH sessions for everything else. All paths share
//! the deadline + buffer-cap contract of the command lib.

use std::time::Duration;

use anyhow::Context;
use armada_client::{
  entities::{ExecResult, host::HostConfig},
  error::{Error, ErrorKind, Result},
};
use command::{CapExceeded, ExecOpts, RawOutput, read_capped};
use openssh::Stdio;

use crate::{config::core_config, state::ssh_pool};

/// Executor options seeded from the configured defaults.
pub fn default_exec_opts() -> ExecOpts {
  let config = core_config();
  ExecOpts::default()
    .timeout(Duration::from_secs(config.command_timeout_secs))
    .max_buffer_bytes(config.max_buffer_bytes)
}

/// Run `program args..` on `host` through the appropriate executor.
/// Arguments are a vector end to end; nothing is shell joined.
pub async fn exec_on_host(
  host: &HostConfig,
  program: &str,
  args: &[String],
  opts: &ExecOpts,
) -> Result<ExecResult> {
  exec_on_host_with_input(host, program, args, None, opts).await
}

/// [exec_on_host] with bytes piped to the remote stdin. Used by the
/// transfer paths that route file content through the control
/// plane.
pub async fn exec_on_host_with_input(
  host: &HostConfig,
  program: &str,
  args: &[String],
  input: Option<&[u8]>,
  opts: &ExecOpts,
) -> Result<ExecResult> {
  exec_raw_on_host(host, program, args, input, opts)
    .await
    .map(RawOutput::into_exec_result)
}

/// Raw-bytes variant for callers moving binary content between
/// hosts (tar streams, file transfers).
pub async fn exec_raw_on_host(
  host: &HostConfig,
  program: &str,
  args: &[String],
  input: Option<&[u8]>,
  opts: &ExecOpts,
) -> Result<RawOutput> {
  if host.is_ssh_execution() {
    exec_ssh(host, program, args, input, opts).await
  } else {
    command::run_capped_raw_with_input(program, args, opts, input)
      .await
  }
}

/// Like [exec_on_host], but a non-zero exit is an error carrying
/// the remote output.
pub async fn exec_checked(
  host: &HostConfig,
  program: &str,
  args: &[String],
  opts: &ExecOpts,
) -> Result<ExecResult> {
  let res = exec_on_host(host, program, args, opts).await?;
  if res.success {
    Ok(res)
  } else {
    Err(
      Error::msg(ErrorKind::RemoteFailure, res.combined()).context(
        format!(
          "'{program}' exited with code {} on host {}",
          res.exit_code, host.name
        ),
      ),
    )
  }
}

async fn exec_ssh(
  host: &HostConfig,
  program: &str,
  args: &[String],
  input: Option<&[u8]>,
  opts: &ExecOpts,
) -> Result<RawOutput> {
  let cap = opts.max_buffer_bytes;
  let mut lease = ssh_pool().acquire(host).await?;

  let spawned = {
    let mut command = lease.session().command(program);
    command
      .args(args)
      .stdin(if input.is_some() {
        Stdio::piped()
      } else {
        Stdio::null()
      })
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    command.spawn().await
  };

  let mut child = match spawned {
    Ok(child) => child,
    Err(e) => {
      // A failed spawn usually means the control connection died.
      lease.poison();
      return Err(Error::new(
        ErrorKind::Connectivity,
        anyhow::Error::from(e).context(format!(
          "failed to spawn '{program}' on host {}",
          host.name
        )),
      ));
    }
  };

  let stdin = child.stdin().take();
  let mut stdout = child
    .stdout()
    .take()
    .context("remote child missing stdout pipe")?;
  let mut stderr = child
    .stderr()
    .take()
    .context("remote child missing stderr pipe")?;

  let write_input = async move {
    if let (Some(mut stdin), Some(input)) = (stdin, input) {
      use tokio::io::AsyncWriteExt as _;
      // The remote side may exit before consuming everything.
      let _ = stdin.write_all(input).await;
      let _ = stdin.shutdown().await;
    }
    Ok(())
  };

  let outcome = tokio::time::timeout(opts.timeout, async {
    let streams = tokio::try_join!(
      write_input,
      read_capped(&mut stdout, cap),
      read_capped(&mut stderr, cap),
    );
    match streams {
      Ok(((), out, err)) => {
        let status = child.wait().await;
        Ok((out, err, status))
      }
      Err(e) => Err(e),
    }
  })
  .await;

  match outcome {
    Err(_elapsed) => {
      // Severing the session tears down the remote process; the
      // lease is not safe to reuse afterwards.
      lease.poison();
      Err(Error::msg(
        ErrorKind::Timeout,
        format!(
          "'{program}' on host {} exceeded the {}s deadline",
          host.name,
          opts.timeout.as_secs()
        ),
      ))
    }
    Ok(Err(CapExceeded)) => {
      lease.poison();
      Err(Error::msg(
        ErrorKind::BufferOverflow,
        format!(
          "'{program}' output on host {} exceeded the {cap} byte cap",
          host.name
        ),
      ))
    }
    Ok(Ok((out, err, status))) => {
      let status = status.with_context(|| {
        format!("failed to wait on '{program}' on host {}", host.name)
      })?;
      Ok(RawOutput {
        stdout: out,
        stderr: err,
        exit_code: status.code().unwrap_or(-1) as i64,
        success: status.success(),
      })
    }
  }
}
