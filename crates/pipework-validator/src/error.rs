use pipework_workflow::GraphError;
use serde::Serialize;
use serde_json::json;

/// Boxed error returned by a [`crate::TemplateSource`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while validating a pipeline tree.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
  /// The payload does not have the shape of a pipeline tree.
  #[error("malformed pipeline tree: {0}")]
  Malformed(#[source] serde_json::Error),

  /// The tree does not form a consistent graph.
  #[error("invalid graph: {0}")]
  Graph(#[from] GraphError),

  /// A sub-process references a template that cannot be found.
  #[error("sub-process '{activity_id}' references unknown template '{template_id}'")]
  UnknownSubprocess {
    activity_id: String,
    template_id: String,
  },

  /// Sub-process references loop back on themselves.
  #[error("circular sub-process reference: {}", .trace.join(" -> "))]
  CircularReference { trace: Vec<String> },

  /// Diverging and converging gateways do not match up.
  #[error("converge gateway mismatch at '{gateway_id}': {reason}")]
  ConvergeMatch { gateway_id: String, reason: String },

  /// The template source failed while loading a referenced template.
  #[error("failed to load template '{template_id}': {source}")]
  Lookup {
    template_id: String,
    #[source]
    source: BoxError,
  },
}

/// A validation failure in the shape the resource layer renders as a
/// field-level error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
  pub kind: &'static str,
  pub message: String,
  pub detail: serde_json::Value,
}

impl ValidateError {
  pub(crate) fn converge(gateway_id: &str, reason: impl Into<String>) -> Self {
    Self::ConvergeMatch {
      gateway_id: gateway_id.to_string(),
      reason: reason.into(),
    }
  }

  /// Stable machine-readable kind of this error.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Malformed(_) => "malformed_payload",
      Self::Graph(GraphError::AmbiguousFlow { .. }) => "ambiguous_flow",
      Self::Graph(_) => "invalid_graph",
      Self::UnknownSubprocess { .. } => "unknown_subprocess",
      Self::CircularReference { .. } => "circular_reference",
      Self::ConvergeMatch { .. } => "converge_mismatch",
      Self::Lookup { .. } => "lookup_failed",
    }
  }

  pub fn report(&self) -> ErrorReport {
    let detail = match self {
      Self::Malformed(e) => json!({ "line": e.line(), "column": e.column() }),
      Self::Graph(GraphError::AmbiguousFlow { count }) => json!({ "count": count }),
      Self::Graph(GraphError::FlowMismatch {
        node_id, flow_id, ..
      }) => json!({ "node_id": node_id, "flow_id": flow_id }),
      Self::Graph(GraphError::InvalidFlow { flow_id, .. }) => json!({ "flow_id": flow_id }),
      Self::Graph(GraphError::NodeNotFound(id) | GraphError::DuplicateNode(id)) => {
        json!({ "node_id": id })
      }
      Self::UnknownSubprocess {
        activity_id,
        template_id,
      } => json!({ "activity_id": activity_id, "template_id": template_id }),
      Self::CircularReference { trace } => json!({ "trace": trace }),
      Self::ConvergeMatch { gateway_id, .. } => json!({ "gateway_id": gateway_id }),
      Self::Lookup { template_id, .. } => json!({ "template_id": template_id }),
    };

    ErrorReport {
      kind: self.kind(),
      message: self.to_string(),
      detail,
    }
  }
}
