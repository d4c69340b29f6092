use pipework_config::PipelineTree;
use pipework_workflow::Graph;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::converge::{ConvergeMatches, validate_converge_gateways};
use crate::error::ValidateError;
use crate::reference::check_subprocess_references;
use crate::source::{RootTemplate, TemplateSource};

/// A payload that passed every structural check.
#[derive(Debug)]
pub struct Validated {
  pub tree: PipelineTree,
  pub graph: Graph,
  pub converge: ConvergeMatches,
}

/// Run all structural checks on a submitted payload.
///
/// Order is parse, graph build, sub-process cycle check, converge check; the
/// first failure wins.
#[instrument(name = "validate", skip_all, fields(root = %root.id()))]
pub async fn validate<S>(
  payload: &Value,
  root: &RootTemplate,
  source: &S,
) -> Result<Validated, ValidateError>
where
  S: TemplateSource + ?Sized,
{
  let tree = PipelineTree::from_value(payload).map_err(ValidateError::Malformed)?;
  let graph = Graph::from_tree(&tree)?;
  let references = check_subprocess_references(&tree, root, source).await?;
  let converge = validate_converge_gateways(&graph)?;

  debug!(
    templates = references.len(),
    gateways = converge.len(),
    "payload is structurally valid"
  );

  Ok(Validated {
    tree,
    graph,
    converge,
  })
}

/// Parse and check a payload's own graph without following sub-process
/// references.
pub fn validate_structure(payload: &Value) -> Result<Validated, ValidateError> {
  let tree = PipelineTree::from_value(payload).map_err(ValidateError::Malformed)?;
  let graph = Graph::from_tree(&tree)?;
  let converge = validate_converge_gateways(&graph)?;

  Ok(Validated {
    tree,
    graph,
    converge,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{MemorySource, payload, tree_referencing};
  use serde_json::json;

  #[tokio::test]
  async fn test_valid_payload() {
    let body = payload(&["a"], &[], &[("f1", "start", "a"), ("f2", "a", "end")]);
    let validated = validate(&body, &RootTemplate::New, &MemorySource::default())
      .await
      .unwrap();

    assert_eq!(validated.graph.nodes().count(), 3);
    assert!(validated.converge.is_empty());
  }

  #[tokio::test]
  async fn test_malformed_payload() {
    let err = validate(
      &json!({"activities": []}),
      &RootTemplate::New,
      &MemorySource::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "malformed_payload");
  }

  #[tokio::test]
  async fn test_undeclared_flow_is_invalid_graph() {
    let mut body = payload(&["a"], &[], &[("f1", "start", "a"), ("f2", "a", "end")]);
    body["activities"]["a"]["outgoing"] = json!([]);

    let err = validate(&body, &RootTemplate::New, &MemorySource::default())
      .await
      .unwrap_err();

    assert_eq!(err.kind(), "invalid_graph");
  }

  #[tokio::test]
  async fn test_cycle_reported_before_converge() {
    let source = MemorySource::default().with("b", "B", tree_referencing(&["a"]));
    let body = serde_json::to_value(tree_referencing(&["b"])).unwrap();

    let err = validate(&body, &RootTemplate::existing("a", "A"), &source)
      .await
      .unwrap_err();

    assert_eq!(err.to_string(), "circular sub-process reference: A -> B -> A");
  }

  #[test]
  fn test_structure_only_ignores_references() {
    let body = serde_json::to_value(tree_referencing(&["nowhere"])).unwrap();
    assert!(validate_structure(&body).is_ok());
  }
}
