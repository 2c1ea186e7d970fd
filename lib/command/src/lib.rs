//! Direct process execution with the uniform executor contract:
//! a deadline, per-stream buffer caps checked before appending, and
//! no shell interpretation. Commands are argument vectors, never
//! joined through a shell.

use std::{path::PathBuf, process::Stdio, time::Duration};

use anyhow::Context;
use armada_client::{
  entities::ExecResult,
  error::{Error, ErrorKind, Result},
};
use tokio::{io::AsyncReadExt, process::Command};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ExecOpts {
  pub timeout: Duration,
  /// Cap applied to stdout and stderr independently.
  pub max_buffer_bytes: usize,
  pub cwd: Option<PathBuf>,
}

impl Default for ExecOpts {
  fn default() -> Self {
    ExecOpts {
      timeout: DEFAULT_TIMEOUT,
      max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
      cwd: None,
    }
  }
}

impl ExecOpts {
  pub fn timeout(mut self, timeout: Duration) -> ExecOpts {
    self.timeout = timeout;
    self
  }

  pub fn max_buffer_bytes(mut self, cap: usize) -> ExecOpts {
    self.max_buffer_bytes = cap;
    self
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> ExecOpts {
    self.cwd = Some(cwd.into());
    self
  }
}

/// Marker error: a stream hit its buffer cap and reading stopped.
pub struct CapExceeded;

/// Run `program` with `args` directly on this host.
/// Exactly one of three outcomes settles the call: completion,
/// deadline (`Timeout`, process killed), or a stream exceeding the
/// cap (`BufferOverflow`, process killed).
pub async fn run_capped_command(
  program: &str,
  args: &[String],
  opts: &ExecOpts,
) -> Result<ExecResult> {
  run_capped_command_with_input(program, args, opts, None).await
}

/// [run_capped_command] with bytes piped to the child's stdin.
pub async fn run_capped_command_with_input(
  program: &str,
  args: &[String],
  opts: &ExecOpts,
  input: Option<&[u8]>,
) -> Result<ExecResult> {
  run_capped_raw_with_input(program, args, opts, input)
    .await
    .map(RawOutput::into_exec_result)
}

/// Output with the stream bytes untouched, for callers moving
/// binary content (tar streams, file transfers).
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
  pub exit_code: i64,
  pub success: bool,
}

impl RawOutput {
  pub fn into_exec_result(self) -> ExecResult {
    ExecResult {
      stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
      exit_code: self.exit_code,
      success: self.success,
    }
  }
}

pub async fn run_capped_raw_with_input(
  program: &str,
  args: &[String],
  opts: &ExecOpts,
  input: Option<&[u8]>,
) -> Result<RawOutput> {
  let mut cmd = Command::new(program);
  cmd
    .args(args)
    .kill_on_drop(true)
    .stdin(if input.is_some() {
      Stdio::piped()
    } else {
      Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

  if let Some(cwd) = &opts.cwd {
    let cwd = cwd.canonicalize().with_context(|| {
      format!("Invalid working directory {}", cwd.display())
    })?;
    cmd.current_dir(cwd);
  }

  let mut child = cmd
    .spawn()
    .with_context(|| format!("Failed to spawn '{program}'"))?;

  let stdin = child.stdin.take();
  let mut stdout = child
    .stdout
    .take()
    .context("Child process missing stdout pipe")?;
  let mut stderr = child
    .stderr
    .take()
    .context("Child process missing stderr pipe")?;
  let cap = opts.max_buffer_bytes;

  let write_input = async move {
    if let (Some(mut stdin), Some(input)) = (stdin, input) {
      use tokio::io::AsyncWriteExt as _;
      // The child may exit before consuming everything.
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
      let _ = child.kill().await;
      Err(Error::msg(
        ErrorKind::Timeout,
        format!(
          "'{program}' exceeded the {}s deadline",
          opts.timeout.as_secs()
        ),
      ))
    }
    Ok(Err(CapExceeded)) => {
      let _ = child.kill().await;
      Err(Error::msg(
        ErrorKind::BufferOverflow,
        format!("'{program}' output exceeded the {cap} byte cap"),
      ))
    }
    Ok(Ok((out, err, status))) => {
      let status = status
        .with_context(|| format!("Failed to wait on '{program}'"))?;
      Ok(RawOutput {
        stdout: out,
        stderr: err,
        exit_code: status.code().unwrap_or(-1) as i64,
        success: status.success(),
      })
    }
  }
}

/// Like [run_capped_command], but a non-zero exit is an error of
/// kind `RemoteFailure` carrying the process output.
pub async fn run_checked_command(
  program: &str,
  args: &[String],
  opts: &ExecOpts,
) -> Result<ExecResult> {
  let res = run_capped_command(program, args, opts).await?;
  if res.success {
    Ok(res)
  } else {
    Err(
      Error::msg(ErrorKind::RemoteFailure, res.combined()).context(
        format!("'{program}' exited with code {}", res.exit_code),
      ),
    )
  }
}

/// Read a stream to EOF, checking the cap before each append so a
/// hostile process cannot grow the buffer past it. Shared with the
/// remote executors, which apply the same contract.
pub async fn read_capped<R: tokio::io::AsyncRead + Unpin>(
  reader: &mut R,
  cap: usize,
) -> std::result::Result<Vec<u8>, CapExceeded> {
  let mut buf = Vec::new();
  let mut chunk = [0u8; 8192];
  loop {
    match reader.read(&mut chunk).await {
      Ok(0) => return Ok(buf),
      Ok(n) => {
        if buf.len() + n > cap {
          return Err(CapExceeded);
        }
        buf.extend_from_slice(&chunk[..n]);
      }
      // Treat stream errors as EOF; the exit status tells the rest.
      Err(_) => return Ok(buf),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Instant;

  use super::*;

  fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[tokio::test]
  async fn captures_stdout_and_exit_code() {
    let res = run_capped_command(
      "echo",
      &args(&["hello", "armada"]),
      &ExecOpts::default(),
    )
    .await
    .unwrap();
    assert!(res.success);
    assert_eq!(res.exit_code, 0);
    assert_eq!(res.stdout.trim(), "hello armada");
    assert!(res.stderr.is_empty());
  }

  #[tokio::test]
  async fn stdin_is_piped_to_the_child() {
    let res = run_capped_command_with_input(
      "cat",
      &[],
      &ExecOpts::default(),
      Some(b"hello armada"),
    )
    .await
    .unwrap();
    assert!(res.success);
    assert_eq!(res.stdout, "hello armada");
  }

  #[tokio::test]
  async fn nonzero_exit_is_captured_not_an_error() {
    let res =
      run_capped_command("false", &[], &ExecOpts::default())
        .await
        .unwrap();
    assert!(!res.success);
    assert_ne!(res.exit_code, 0);
  }

  #[tokio::test]
  async fn checked_command_fails_on_nonzero_exit() {
    let e = run_checked_command("false", &[], &ExecOpts::default())
      .await
      .unwrap_err();
    assert_eq!(e.kind, ErrorKind::RemoteFailure);
  }

  #[tokio::test]
  async fn deadline_kills_the_process() {
    let start = Instant::now();
    let e = run_capped_command(
      "sleep",
      &args(&["30"]),
      &ExecOpts::default().timeout(Duration::from_millis(200)),
    )
    .await
    .unwrap_err();
    assert_eq!(e.kind, ErrorKind::Timeout);
    assert!(start.elapsed() < Duration::from_secs(5));
  }

  #[tokio::test]
  async fn buffer_cap_kills_the_process() {
    let start = Instant::now();
    let e = run_capped_command(
      "yes",
      &[],
      &ExecOpts::default()
        .timeout(Duration::from_secs(10))
        .max_buffer_bytes(16 * 1024),
    )
    .await
    .unwrap_err();
    assert_eq!(e.kind, ErrorKind::BufferOverflow);
    assert!(start.elapsed() < Duration::from_secs(5));
  }

  #[tokio::test]
  async fn missing_program_is_an_error() {
    assert!(
      run_capped_command(
        "definitely-not-a-real-binary",
        &[],
        &ExecOpts::default(),
      )
      .await
      .is_err()
    );
  }

  #[tokio::test]
  async fn cwd_is_applied() {
    let dir = std::env::temp_dir();
    let res = run_capped_command(
      "pwd",
      &[],
      &ExecOpts::default().cwd(&dir),
    )
    .await
    .unwrap();
    let expected = dir.canonicalize().unwrap();
    assert_eq!(
      res.stdout.trim(),
      expected.to_string_lossy().as_ref()
    );
  }
}
