//! The error taxonomy. Internal code circulates [anyhow] chains with a
//! machine-readable [ErrorKind] attached at the classification site;
//! only [crate::entities::ResponseEnvelope] escapes to callers.

use serde::{Deserialize, Serialize};

/// Machine-readable failure class, carried on every error response.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  /// Validation failure: bad action / subaction, pattern mismatch,
  /// disallowed character, destructive op without confirmation.
  InvalidInput,
  /// Host not registered, container / project / file not found.
  NotFound,
  /// Project exists on multiple hosts and caller did not pick one.
  Ambiguous,
  /// SSH dial failure, Engine connection refused, health probe
  /// failed twice.
  Connectivity,
  /// Executor deadline or pool acquire deadline exceeded.
  Timeout,
  /// stdout or stderr exceeded the configured cap.
  BufferOverflow,
  /// The remote operation failed; message preserved.
  #[default]
  RemoteFailure,
}

/// An anyhow chain tagged with an [ErrorKind].
/// Plain `?` conversion from [anyhow::Error] defaults the kind to
/// [ErrorKind::RemoteFailure]; classification sites attach a better
/// one with [AddErrorKind].
#[derive(Debug)]
pub struct Error {
  pub kind: ErrorKind,
  pub error: anyhow::Error,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
  pub fn new(
    kind: ErrorKind,
    error: impl Into<anyhow::Error>,
  ) -> Error {
    Error {
      kind,
      error: error.into(),
    }
  }

  pub fn msg(
    kind: ErrorKind,
    message: impl std::fmt::Display,
  ) -> Error {
    Error {
      kind,
      error: anyhow::Error::msg(message.to_string()),
    }
  }

  /// The short caller-facing message: the full context chain on
  /// one line, no backtraces.
  pub fn message(&self) -> String {
    format!("{:#}", self.error)
  }

  pub fn context(
    mut self,
    context: impl std::fmt::Display + Send + Sync + 'static,
  ) -> Error {
    self.error = self.error.context(context.to_string());
    self
  }
}

impl std::fmt::Display for Error {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {:#}", self.kind, self.error)
  }
}

// Note: no std::error::Error impl, so the blanket
// `From<E: std::error::Error> for anyhow::Error` never applies and
// the two AddErrorKind impls below cannot overlap.
impl From<anyhow::Error> for Error {
  fn from(error: anyhow::Error) -> Error {
    Error {
      kind: ErrorKind::default(),
      error,
    }
  }
}

/// Attach an [ErrorKind] to any fallible result on its way up.
pub trait AddErrorKind<T> {
  fn with_kind(self, kind: ErrorKind) -> Result<T>;
}

impl<T, E: Into<anyhow::Error>> AddErrorKind<T>
  for std::result::Result<T, E>
{
  fn with_kind(self, kind: ErrorKind) -> Result<T> {
    self.map_err(|e| Error {
      kind,
      error: e.into(),
    })
  }
}

impl<T> AddErrorKind<T> for Result<T> {
  fn with_kind(self, kind: ErrorKind) -> Result<T> {
    self.map_err(|mut e| {
      e.kind = kind;
      e
    })
  }
}

#[cfg(test)]
mod tests {
  use anyhow::{Context, anyhow};

  use super::*;

  #[test]
  fn kind_serializes_snake_case() {
    assert_eq!(
      serde_json::to_string(&ErrorKind::InvalidInput).unwrap(),
      "\"invalid_input\""
    );
    assert_eq!(
      serde_json::to_string(&ErrorKind::BufferOverflow).unwrap(),
      "\"buffer_overflow\""
    );
    let kind: ErrorKind =
      serde_json::from_str("\"timeout\"").unwrap();
    assert_eq!(kind, ErrorKind::Timeout);
  }

  #[test]
  fn anyhow_conversion_defaults_to_remote_failure() {
    let e: Error = anyhow!("boom").into();
    assert_eq!(e.kind, ErrorKind::RemoteFailure);
  }

  #[test]
  fn with_kind_overrides_and_message_keeps_chain() {
    let res: std::result::Result<(), anyhow::Error> =
      Err(anyhow!("dial tcp refused"))
        .context("failed to reach host tower");
    let e = res.with_kind(ErrorKind::Connectivity).unwrap_err();
    assert_eq!(e.kind, ErrorKind::Connectivity);
    let message = e.message();
    assert!(message.contains("failed to reach host tower"));
    assert!(message.contains("dial tcp refused"));
  }
}
