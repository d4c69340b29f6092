use indexmap::IndexMap;

use crate::error::GraphError;
use crate::node::Node;

/// A directed sequence flow between two nodes.
///
/// Endpoints are stored as node ids; resolve them through the owning
/// [`crate::Graph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
  pub id: String,
  pub source: String,
  pub target: String,
  pub is_default: bool,
  pub name: Option<String>,
}

impl Flow {
  /// Build a flow between two existing nodes.
  pub fn new(id: impl Into<String>, source: &Node, target: &Node, is_default: bool) -> Self {
    Self {
      id: id.into(),
      source: source.id.clone(),
      target: target.id.clone(),
      is_default,
      name: None,
    }
  }

  pub fn with_name(mut self, name: Option<String>) -> Self {
    self.name = name;
    self
  }
}

/// Ordered collection of flows, indexed by flow id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowCollection {
  flows: IndexMap<String, Flow>,
}

impl FlowCollection {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get a flow by id.
  pub fn get_flow(&self, id: &str) -> Option<&Flow> {
    self.flows.get(id)
  }

  /// The only flow of the collection.
  ///
  /// Fails when the collection is empty or holds more than one flow.
  pub fn unique_one(&self) -> Result<&Flow, GraphError> {
    if self.flows.len() != 1 {
      return Err(GraphError::AmbiguousFlow {
        count: self.flows.len(),
      });
    }
    Ok(&self.flows[0])
  }

  pub fn is_empty(&self) -> bool {
    self.flows.is_empty()
  }

  pub fn len(&self) -> usize {
    self.flows.len()
  }

  /// First flow marked as default, in insertion order.
  pub fn default_flow(&self) -> Option<&Flow> {
    self.flows.values().find(|flow| flow.is_default)
  }

  /// Add a flow. A flow with the same id is replaced in place.
  pub fn add_flow(&mut self, flow: Flow) {
    self.flows.insert(flow.id.clone(), flow);
  }

  pub(crate) fn remove_flow(&mut self, id: &str) -> Option<Flow> {
    self.flows.shift_remove(id)
  }

  /// Target node ids of every flow, in flow order.
  pub fn all_target_node(&self) -> Vec<&str> {
    self.flows.values().map(|flow| flow.target.as_str()).collect()
  }

  /// Source node ids of every flow, in flow order.
  pub fn all_source_node(&self) -> Vec<&str> {
    self.flows.values().map(|flow| flow.source.as_str()).collect()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Flow> {
    self.flows.values()
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.flows.keys().map(String::as_str)
  }
}

impl<'a> IntoIterator for &'a FlowCollection {
  type Item = &'a Flow;
  type IntoIter = indexmap::map::Values<'a, String, Flow>;

  fn into_iter(self) -> Self::IntoIter {
    self.flows.values()
  }
}
