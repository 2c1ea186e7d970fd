use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

pub mod compose;
pub mod docker;
pub mod host;
pub mod logger;
pub mod scout;

/// Unix timestamp in milliseconds.
pub fn armada_timestamp() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

/// How a handler's result is returned to the caller.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
  /// Human readable rendering only.
  #[default]
  Text,
  /// Attach the raw structured payload alongside the text.
  Structured,
}

/// The single response shape of the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseEnvelope {
  Success {
    /// Always present, for human display.
    text: String,
    /// The raw record(s), attached when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    structured: Option<serde_json::Value>,
  },
  Error {
    message: String,
    kind: ErrorKind,
  },
}

impl ResponseEnvelope {
  pub fn error(
    kind: ErrorKind,
    message: impl std::fmt::Display,
  ) -> ResponseEnvelope {
    ResponseEnvelope::Error {
      message: message.to_string(),
      kind,
    }
  }

  pub fn is_error(&self) -> bool {
    matches!(self, ResponseEnvelope::Error { .. })
  }
}

/// Short acknowledgment for container / image actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
  pub host: String,
  pub subject: String,
  pub action: String,
}

/// The uniform result of every executor call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecResult {
  pub stdout: String,
  pub stderr: String,
  pub exit_code: i64,
  pub success: bool,
}

impl ExecResult {
  pub fn combined(&self) -> String {
    match (self.stdout.is_empty(), self.stderr.is_empty()) {
      (true, true) => String::new(),
      (false, true) => self.stdout.clone(),
      (true, false) => self.stderr.clone(),
      (false, false) => {
        format!("stdout:\n{}\n\nstderr:\n{}", self.stdout, self.stderr)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn success_envelope_round_trips() {
    let envelope = ResponseEnvelope::Success {
      text: "2 containers".to_string(),
      structured: Some(serde_json::json!([
        { "name": "web", "state": "running" },
        { "name": "db", "state": "exited" },
      ])),
    };
    let encoded = serde_json::to_string(&envelope).unwrap();
    let decoded: ResponseEnvelope =
      serde_json::from_str(&encoded).unwrap();
    assert_eq!(envelope, decoded);
  }

  #[test]
  fn error_envelope_carries_kind() {
    let envelope = ResponseEnvelope::error(
      ErrorKind::Ambiguous,
      "project plex found on hosts tower, nas",
    );
    let encoded = serde_json::to_value(&envelope).unwrap();
    assert_eq!(encoded["status"], "error");
    assert_eq!(encoded["kind"], "ambiguous");
    let decoded: ResponseEnvelope =
      serde_json::from_value(encoded).unwrap();
    assert_eq!(envelope, decoded);
  }

  #[test]
  fn text_only_success_omits_structured() {
    let envelope = ResponseEnvelope::Success {
      text: "done".to_string(),
      structured: None,
    };
    let encoded = serde_json::to_value(&envelope).unwrap();
    assert!(encoded.get("structured").is_none());
  }
}
