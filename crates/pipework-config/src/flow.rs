use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDef {
  pub id: String,
  pub source: String,
  pub target: String,
  #[serde(default)]
  pub is_default: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}
