use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::component::ComponentRef;
use crate::enums::GatewayKind;
use crate::tree::PipelineTree;

/// The start or end event of a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default)]
  pub incoming: Vec<String>,
  #[serde(default)]
  pub outgoing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDef {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(flatten)]
  pub kind: ActivityKind,
  #[serde(default)]
  pub incoming: Vec<String>,
  #[serde(default)]
  pub outgoing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActivityKind {
  /// A node that runs a registered component.
  ServiceActivity { component: ComponentRef },
  /// A node that delegates to another template's full graph.
  SubProcess {
    template_id: String,
    /// The referenced template's tree, inlined when an instance is unfolded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pipeline: Option<Box<PipelineTree>>,
  },
}

/// Condition attached to one outgoing flow of an exclusive gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionDef {
  pub evaluate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayDef {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(rename = "type")]
  pub kind: GatewayKind,
  #[serde(default)]
  pub incoming: Vec<String>,
  #[serde(default)]
  pub outgoing: Vec<String>,
  /// Conditions keyed by outgoing flow id (exclusive gateways only).
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub conditions: IndexMap<String, ConditionDef>,
  /// Author-supplied hint naming the converge gateway that closes this one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub converge_gateway_id: Option<String>,
}
