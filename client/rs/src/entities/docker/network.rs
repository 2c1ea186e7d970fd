use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkInfo {
  pub host: String,
  pub id: String,
  pub name: String,
  pub driver: Option<String>,
  pub scope: Option<String>,
  pub internal: bool,
  pub attachable: bool,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub subnets: Vec<String>,
}
