use std::collections::HashSet;

use indexmap::IndexMap;
use pipework_config::{ActivityKind, EventDef, PipelineTree};

use crate::error::GraphError;
use crate::flow::Flow;
use crate::node::{Node, NodeKind};

/// Arena owning every node and flow of one pipeline.
#[derive(Debug, Clone, Default)]
pub struct Graph {
  /// Nodes by id, in declaration order.
  nodes: IndexMap<String, Node>,
  /// Flows by id, in declaration order.
  flows: IndexMap<String, Flow>,
  start: Option<String>,
  end: Option<String>,
}

impl Graph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build the arena from a pipeline tree.
  ///
  /// Flows are taken from the tree's flow table; the incoming/outgoing ids
  /// each node declares must agree with it.
  pub fn from_tree(tree: &PipelineTree) -> Result<Self, GraphError> {
    let mut graph = Self::new();

    graph.add_node(event_node(&tree.start_event, NodeKind::StartEvent))?;
    graph.start = Some(tree.start_event.id.clone());

    for activity in tree.activities.values() {
      let (kind, data) = match &activity.kind {
        ActivityKind::ServiceActivity { component } => (
          NodeKind::ServiceActivity {
            component_code: component.code.clone(),
          },
          Some(component.data.clone()),
        ),
        ActivityKind::SubProcess { template_id, .. } => (
          NodeKind::SubProcess {
            template_id: template_id.clone(),
          },
          None,
        ),
      };
      graph.add_node(
        Node::new(activity.id.clone(), kind)
          .with_name(activity.name.clone())
          .with_data(data),
      )?;
    }

    for gateway in tree.gateways.values() {
      graph.add_node(
        Node::new(gateway.id.clone(), NodeKind::Gateway(gateway.kind))
          .with_name(gateway.name.clone()),
      )?;
    }

    graph.add_node(event_node(&tree.end_event, NodeKind::EndEvent))?;
    graph.end = Some(tree.end_event.id.clone());

    for flow in tree.flows.values() {
      graph.add_flow(
        &flow.id,
        &flow.source,
        &flow.target,
        flow.is_default,
        flow.name.clone(),
      )?;
    }

    let start = &tree.start_event;
    let end = &tree.end_event;
    let declared = std::iter::once((&start.id, &start.incoming, &start.outgoing))
      .chain(
        tree
          .activities
          .values()
          .map(|a| (&a.id, &a.incoming, &a.outgoing)),
      )
      .chain(
        tree
          .gateways
          .values()
          .map(|g| (&g.id, &g.incoming, &g.outgoing)),
      )
      .chain(std::iter::once((&end.id, &end.incoming, &end.outgoing)));

    for (node_id, incoming, outgoing) in declared {
      graph.check_declared(node_id, incoming, outgoing)?;
    }

    Ok(graph)
  }

  /// Insert a node. Node ids are unique within a graph.
  pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
    if self.nodes.contains_key(&node.id) {
      return Err(GraphError::DuplicateNode(node.id));
    }
    self.nodes.insert(node.id.clone(), node);
    Ok(())
  }

  /// Connect two existing nodes.
  ///
  /// Re-adding a flow id replaces the previous flow; if its endpoints moved,
  /// it is detached from the old ones first.
  pub fn add_flow(
    &mut self,
    id: &str,
    source: &str,
    target: &str,
    is_default: bool,
    name: Option<String>,
  ) -> Result<(), GraphError> {
    let flow = match (self.nodes.get(source), self.nodes.get(target)) {
      (Some(s), Some(t)) => Flow::new(id, s, t, is_default).with_name(name),
      _ => {
        return Err(GraphError::InvalidFlow {
          flow_id: id.to_string(),
          source_id: source.to_string(),
          target_id: target.to_string(),
        });
      }
    };

    if let Some(previous) = self.flows.get(id).cloned() {
      self.detach(&previous);
    }

    if let Some(node) = self.nodes.get_mut(source) {
      node.outgoing.add_flow(flow.clone());
    }
    if let Some(node) = self.nodes.get_mut(target) {
      node.incoming.add_flow(flow.clone());
    }
    self.flows.insert(flow.id.clone(), flow);

    Ok(())
  }

  /// Remove a node and every flow touching it.
  pub fn remove_node(&mut self, id: &str) -> Result<Node, GraphError> {
    let node = self
      .nodes
      .shift_remove(id)
      .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

    for flow in node.incoming.iter().chain(node.outgoing.iter()) {
      self.flows.shift_remove(&flow.id);
      self.detach(flow);
    }

    if self.start.as_deref() == Some(id) {
      self.start = None;
    }
    if self.end.as_deref() == Some(id) {
      self.end = None;
    }

    Ok(node)
  }

  pub fn node(&self, id: &str) -> Option<&Node> {
    self.nodes.get(id)
  }

  /// Get a node by id, failing if it is absent.
  pub fn require_node(&self, id: &str) -> Result<&Node, GraphError> {
    self
      .node(id)
      .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
  }

  pub fn flow(&self, id: &str) -> Option<&Flow> {
    self.flows.get(id)
  }

  pub fn nodes(&self) -> impl Iterator<Item = &Node> {
    self.nodes.values()
  }

  pub fn flows(&self) -> impl Iterator<Item = &Flow> {
    self.flows.values()
  }

  pub fn start(&self) -> Option<&Node> {
    self.start.as_deref().and_then(|id| self.node(id))
  }

  pub fn end(&self) -> Option<&Node> {
    self.end.as_deref().and_then(|id| self.node(id))
  }

  /// Downstream node ids of a node, in outgoing flow order.
  pub fn successors(&self, id: &str) -> Vec<&str> {
    self
      .node(id)
      .map(|node| node.outgoing.all_target_node())
      .unwrap_or_default()
  }

  /// Upstream node ids of a node, in incoming flow order.
  pub fn predecessors(&self, id: &str) -> Vec<&str> {
    self
      .node(id)
      .map(|node| node.incoming.all_source_node())
      .unwrap_or_default()
  }

  fn detach(&mut self, flow: &Flow) {
    if let Some(node) = self.nodes.get_mut(&flow.source) {
      node.outgoing.remove_flow(&flow.id);
    }
    if let Some(node) = self.nodes.get_mut(&flow.target) {
      node.incoming.remove_flow(&flow.id);
    }
  }

  fn check_declared(
    &self,
    node_id: &str,
    incoming: &[String],
    outgoing: &[String],
  ) -> Result<(), GraphError> {
    let node = self.require_node(node_id)?;

    let mismatch = |flow_id: &str, expected: &'static str| GraphError::FlowMismatch {
      node_id: node_id.to_string(),
      flow_id: flow_id.to_string(),
      expected,
    };

    let declared_in: HashSet<&str> = incoming.iter().map(String::as_str).collect();
    let declared_out: HashSet<&str> = outgoing.iter().map(String::as_str).collect();

    for flow_id in &declared_in {
      if node.incoming.get_flow(flow_id).is_none() {
        return Err(mismatch(*flow_id, "end at this node"));
      }
    }
    for flow_id in &declared_out {
      if node.outgoing.get_flow(flow_id).is_none() {
        return Err(mismatch(*flow_id, "start at this node"));
      }
    }
    for flow_id in node.incoming.ids() {
      if !declared_in.contains(flow_id) {
        return Err(mismatch(flow_id, "appear in the node's incoming list"));
      }
    }
    for flow_id in node.outgoing.ids() {
      if !declared_out.contains(flow_id) {
        return Err(mismatch(flow_id, "appear in the node's outgoing list"));
      }
    }

    Ok(())
  }
}

fn event_node(event: &EventDef, kind: NodeKind) -> Node {
  Node::new(event.id.clone(), kind).with_name(event.name.clone())
}
