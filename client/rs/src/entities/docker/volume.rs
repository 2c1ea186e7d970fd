use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeInfo {
  pub host: String,
  pub name: String,
  pub driver: String,
  pub mountpoint: String,
  pub created: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub size_bytes: Option<i64>,
}
