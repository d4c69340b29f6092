use serde::{Deserialize, Serialize};

/// Reference to a registered component from a service activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRef {
  /// Component code, e.g. "sleep_timer"
  pub code: String,

  /// Component-specific configuration, opaque to the core.
  #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
  pub data: serde_json::Value,
}
