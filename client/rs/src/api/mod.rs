//! Request types, one struct per `(action, subaction)` pair in the
//! catalog. Each declares its typed response and resolves inside the
//! control plane binary.
//!
//! Envelope-level fields (`response_format`, `timeout_ms`) are read
//! by the dispatcher before variant deserialization and therefore do
//! not appear on the structs.

pub mod compose;
pub mod container;
pub mod docker;
pub mod host;
pub mod image;
pub mod scout;

/// Paging bounds shared by every listing request.
pub const MAX_LIMIT: i64 = 100;
/// Line-count bound for log retrieval.
pub const MAX_LOG_LINES: i64 = 500;
/// Upper bound for caller-supplied execution deadlines (ms).
pub const MAX_TIMEOUT_MS: u64 = 300_000;

pub(crate) fn default_limit() -> i64 {
  20
}

pub(crate) fn default_lines() -> i64 {
  100
}
