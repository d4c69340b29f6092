use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::flow::FlowDef;
use crate::node::{ActivityDef, ActivityKind, EventDef, GatewayDef};

/// A complete pipeline definition as authored and stored.
///
/// Maps keep document order so that traversals (and therefore error traces)
/// are reproducible for a given payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTree {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub start_event: EventDef,
  pub end_event: EventDef,
  #[serde(default)]
  pub activities: IndexMap<String, ActivityDef>,
  #[serde(default)]
  pub gateways: IndexMap<String, GatewayDef>,
  #[serde(default)]
  pub flows: IndexMap<String, FlowDef>,
  #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
  pub data: serde_json::Value,
}

impl PipelineTree {
  /// Parse a tree from a raw JSON payload.
  pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
    Self::deserialize(value)
  }

  /// Sub-process references as `(activity_id, template_id)`, in document order.
  pub fn subprocess_refs(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .activities
      .values()
      .filter_map(|activity| match &activity.kind {
        ActivityKind::SubProcess { template_id, .. } => {
          Some((activity.id.as_str(), template_id.as_str()))
        }
        ActivityKind::ServiceActivity { .. } => None,
      })
  }

  /// Component codes used by service activities as `(activity_id, code)`.
  pub fn component_refs(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .activities
      .values()
      .filter_map(|activity| match &activity.kind {
        ActivityKind::ServiceActivity { component } => {
          Some((activity.id.as_str(), component.code.as_str()))
        }
        ActivityKind::SubProcess { .. } => None,
      })
  }
}
