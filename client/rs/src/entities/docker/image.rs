use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageInfo {
  pub host: String,
  pub id: String,
  pub tags: Vec<String>,
  pub size_bytes: i64,
  pub created: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullResult {
  pub host: String,
  pub image: String,
  /// Final status line reported by the Engine.
  pub status: String,
}
