//! Attached container exec with stdout/stderr demultiplexing.
//! The Engine multiplexes both streams over one connection; frames
//! arrive already split by the client, and the per-stream cap is
//! checked before every append.

use std::time::Duration;

use armada_client::{
  entities::ExecResult,
  error::{Error, ErrorKind, Result},
};
use bollard::{
  container::LogOutput,
  exec::{CreateExecOptions, StartExecResults},
};
use futures::StreamExt;

use super::{DockerClient, classify_docker_err};

#[derive(Debug, Clone, Copy)]
pub struct ExecCaps {
  pub timeout: Duration,
  /// Applied to stdout and stderr independently.
  pub max_buffer_bytes: usize,
}

/// How an attached exec settled. Exactly one winner; cleanup runs
/// once after settlement regardless of which it was.
enum Settlement {
  Finished,
  TimedOut,
  Overflowed,
  StreamError(bollard::errors::Error),
}

fn settle(
  settlement: &mut Option<Settlement>,
  outcome: Settlement,
) {
  settlement.get_or_insert(outcome);
}

impl DockerClient {
  /// Run an already-validated command vector inside a running
  /// container and capture the demultiplexed output.
  pub async fn exec_container(
    &self,
    container: &str,
    command: Vec<String>,
    caps: ExecCaps,
  ) -> Result<ExecResult> {
    let exec = self
      .docker
      .create_exec(
        container,
        CreateExecOptions {
          attach_stdout: Some(true),
          attach_stderr: Some(true),
          cmd: Some(command),
          ..Default::default()
        },
      )
      .await
      .map_err(classify_docker_err)
      .map_err(|e| {
        e.context(format!(
          "failed to create exec in container {container}"
        ))
      })?;

    let started = self
      .docker
      .start_exec(&exec.id, None)
      .await
      .map_err(classify_docker_err)?;

    let StartExecResults::Attached { mut output, .. } = started
    else {
      return Err(Error::msg(
        ErrorKind::RemoteFailure,
        "exec unexpectedly started detached",
      ));
    };

    let mut stdout: Vec<u8> = Vec::new();
    let mut stderr: Vec<u8> = Vec::new();
    let deadline = tokio::time::sleep(caps.timeout);
    tokio::pin!(deadline);

    let mut settlement: Option<Settlement> = None;
    while settlement.is_none() {
      tokio::select! {
        _ = &mut deadline => {
          settle(&mut settlement, Settlement::TimedOut);
        }
        frame = output.next() => match frame {
          None => settle(&mut settlement, Settlement::Finished),
          Some(Err(e)) => {
            settle(&mut settlement, Settlement::StreamError(e));
          }
          Some(Ok(frame)) => {
            let (buf, message) = match frame {
              LogOutput::StdOut { message }
              | LogOutput::Console { message } => {
                (&mut stdout, message)
              }
              LogOutput::StdErr { message } => {
                (&mut stderr, message)
              }
              LogOutput::StdIn { .. } => continue,
            };
            if buf.len() + message.len() > caps.max_buffer_bytes {
              settle(&mut settlement, Settlement::Overflowed);
            } else {
              buf.extend_from_slice(&message);
            }
          }
        }
      }
    }

    // Idempotent cleanup: dropping the stream closes the attach
    // connection, which also tears down a still-running process on
    // the timeout and overflow paths.
    drop(output);

    match settlement.expect("exec settled without an outcome") {
      Settlement::Finished => {
        let exit_code = self
          .docker
          .inspect_exec(&exec.id)
          .await
          .ok()
          .and_then(|inspect| inspect.exit_code)
          .unwrap_or(-1);
        Ok(ExecResult {
          stdout: String::from_utf8_lossy(&stdout).into_owned(),
          stderr: String::from_utf8_lossy(&stderr).into_owned(),
          exit_code,
          success: exit_code == 0,
        })
      }
      Settlement::TimedOut => Err(Error::msg(
        ErrorKind::Timeout,
        format!(
          "exec in container {container} exceeded the {}s deadline",
          caps.timeout.as_secs()
        ),
      )),
      Settlement::Overflowed => Err(Error::msg(
        ErrorKind::BufferOverflow,
        format!(
          "exec output in container {container} exceeded the {} byte cap",
          caps.max_buffer_bytes
        ),
      )),
      Settlement::StreamError(e) => {
        Err(classify_docker_err(e).context(format!(
          "exec stream failed in container {container}"
        )))
      }
    }
  }
}
