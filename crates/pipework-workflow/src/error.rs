use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("node not found: {0}")]
  NodeNotFound(String),

  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("flow '{flow_id}' references unknown node: source={source_id}, target={target_id}")]
  InvalidFlow {
    flow_id: String,
    source_id: String,
    target_id: String,
  },

  #[error("node '{node_id}' disagrees with the flow table on '{flow_id}': flow should {expected}")]
  FlowMismatch {
    node_id: String,
    flow_id: String,
    expected: &'static str,
  },

  #[error("expected exactly one flow, collection holds {count}")]
  AmbiguousFlow { count: usize },
}
