use pipework_config::GatewayKind;

use crate::flow::FlowCollection;

/// What a node does when the runtime reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
  StartEvent,
  EndEvent,
  ServiceActivity { component_code: String },
  SubProcess { template_id: String },
  Gateway(GatewayKind),
}

/// A node in the graph arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub id: String,
  pub name: Option<String>,
  pub kind: NodeKind,
  /// Component-specific configuration, opaque to the graph.
  pub data: Option<serde_json::Value>,
  pub incoming: FlowCollection,
  pub outgoing: FlowCollection,
}

impl Node {
  pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
    Self {
      id: id.into(),
      name: None,
      kind,
      data: None,
      incoming: FlowCollection::new(),
      outgoing: FlowCollection::new(),
    }
  }

  pub fn with_name(mut self, name: Option<String>) -> Self {
    self.name = name;
    self
  }

  pub fn with_data(mut self, data: Option<serde_json::Value>) -> Self {
    self.data = data;
    self
  }

  /// The gateway kind, if this node is a gateway.
  pub fn gateway_kind(&self) -> Option<GatewayKind> {
    match self.kind {
      NodeKind::Gateway(kind) => Some(kind),
      _ => None,
    }
  }

  pub fn is_diverging_gateway(&self) -> bool {
    self.gateway_kind().is_some_and(GatewayKind::is_diverging)
  }

  pub fn is_converging_gateway(&self) -> bool {
    self.gateway_kind().is_some_and(GatewayKind::is_converging)
  }
}
