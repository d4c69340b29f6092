//! Converge gateway matching.
//!
//! The graph is walked from the start event carrying the stack of diverge
//! scopes the walk is inside of. A diverging gateway opens one scope per
//! outgoing flow and a converge gateway closes the innermost one. Every
//! diverging gateway must be closed by exactly one converge gateway that all
//! of its branches reach, and nothing outside those branches may flow into
//! that converge gateway.

use std::collections::{HashMap, VecDeque};

use indexmap::{IndexMap, IndexSet};
use pipework_workflow::{Graph, GraphError, NodeKind};
use tracing::debug;

use crate::error::ValidateError;

/// Diverging gateway id -> id of the converge gateway that closes it.
pub type ConvergeMatches = IndexMap<String, String>;

/// One open branch: the diverging gateway and the outgoing flow taken.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Scope {
  gateway: String,
  branch: String,
}

/// What a converge gateway has seen so far.
struct Arrivals {
  diverge: String,
  outer: Vec<Scope>,
  branches: IndexSet<String>,
  flows: IndexSet<String>,
}

pub fn validate_converge_gateways(graph: &Graph) -> Result<ConvergeMatches, ValidateError> {
  let start = graph
    .start()
    .ok_or_else(|| GraphError::NodeNotFound("start event".to_string()))?;

  let mut contexts: HashMap<&str, Vec<Scope>> = HashMap::new();
  let mut arrivals: IndexMap<&str, Arrivals> = IndexMap::new();
  let mut matches = ConvergeMatches::new();
  let mut diverges: Vec<&str> = Vec::new();
  let mut open_at_end: IndexSet<String> = IndexSet::new();
  // Reported after converge completeness, which usually explains it better
  let mut merged: Option<ValidateError> = None;

  // (node, flow it was reached through, open scopes)
  let mut queue: VecDeque<(&str, Option<&str>, Vec<Scope>)> = VecDeque::new();
  queue.push_back((start.id.as_str(), None, Vec::new()));

  while let Some((node_id, via, mut stack)) = queue.pop_front() {
    let node = graph.require_node(node_id)?;

    if node.is_converging_gateway() {
      let Some(scope) = stack.pop() else {
        return Err(ValidateError::converge(
          node_id,
          "reached outside of any diverging branch",
        ));
      };

      match arrivals.get_mut(node_id) {
        Some(seen) => {
          if seen.diverge != scope.gateway {
            return Err(ValidateError::converge(
              node_id,
              format!(
                "joins branches of '{}' and '{}'",
                seen.diverge, scope.gateway
              ),
            ));
          }
          if seen.outer != stack {
            return Err(ValidateError::converge(
              node_id,
              "branches arrive from different enclosing branches",
            ));
          }
          seen.branches.insert(scope.branch);
          seen.flows.extend(via.map(str::to_string));
        }
        None => {
          if let Some(other) = matches.get(&scope.gateway) {
            return Err(ValidateError::converge(
              &scope.gateway,
              format!("closed by both '{other}' and '{node_id}'"),
            ));
          }
          matches.insert(scope.gateway.clone(), node_id.to_string());

          let next = node.outgoing.unique_one()?;
          arrivals.insert(
            node_id,
            Arrivals {
              diverge: scope.gateway,
              outer: stack.clone(),
              branches: IndexSet::from([scope.branch]),
              flows: via.map(str::to_string).into_iter().collect(),
            },
          );
          queue.push_back((next.target.as_str(), Some(next.id.as_str()), stack));
        }
      }
      continue;
    }

    if let NodeKind::EndEvent = node.kind {
      open_at_end.extend(stack.into_iter().map(|scope| scope.gateway));
      continue;
    }

    match contexts.get(node_id) {
      Some(seen) => {
        if *seen != stack && merged.is_none() {
          merged = Some(ValidateError::converge(
            node_id,
            "merges branches without a converge gateway",
          ));
        }
        continue;
      }
      None => {
        contexts.insert(node_id, stack.clone());
      }
    }

    if node.is_diverging_gateway() {
      if node.outgoing.is_empty() {
        return Err(GraphError::AmbiguousFlow { count: 0 }.into());
      }
      diverges.push(node_id);
      for flow in &node.outgoing {
        let mut branch = stack.clone();
        branch.push(Scope {
          gateway: node.id.clone(),
          branch: flow.id.clone(),
        });
        queue.push_back((flow.target.as_str(), Some(flow.id.as_str()), branch));
      }
    } else {
      let next = node.outgoing.unique_one()?;
      queue.push_back((next.target.as_str(), Some(next.id.as_str()), stack));
    }
  }

  for (converge_id, seen) in &arrivals {
    let diverge = graph.require_node(&seen.diverge)?;
    let missing: Vec<&str> = diverge
      .outgoing
      .ids()
      .filter(|id| !seen.branches.contains(*id))
      .collect();

    if !missing.is_empty() {
      return Err(ValidateError::converge(
        converge_id,
        format!(
          "branches [{}] of '{}' never reach it",
          missing.join(", "),
          seen.diverge
        ),
      ));
    }
  }

  // Flows the walk never took come from nodes outside every branch
  for (converge_id, seen) in &arrivals {
    let converge = graph.require_node(converge_id)?;
    if let Some(stray) = converge.incoming.ids().find(|id| !seen.flows.contains(*id)) {
      return Err(ValidateError::converge(
        converge_id,
        format!(
          "receives flow '{stray}' from outside the branches of '{}'",
          seen.diverge
        ),
      ));
    }
  }

  if let Some(err) = merged {
    return Err(err);
  }

  for diverge in diverges {
    if !matches.contains_key(diverge) {
      let reason = if open_at_end.contains(diverge) {
        "branches reach the end event without converging"
      } else {
        "never closed by a converge gateway"
      };
      return Err(ValidateError::converge(diverge, reason));
    }
  }

  debug!(matched = matches.len(), "converge gateways matched");
  Ok(matches)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::payload;
  use pipework_config::PipelineTree;
  use serde_json::Value;

  fn check(payload: Value) -> Result<ConvergeMatches, ValidateError> {
    let tree = PipelineTree::from_value(&payload).unwrap();
    let graph = Graph::from_tree(&tree).unwrap();
    validate_converge_gateways(&graph)
  }

  fn assert_mismatch_at(result: Result<ConvergeMatches, ValidateError>, expected: &str) {
    match result {
      Err(ValidateError::ConvergeMatch { gateway_id, .. }) => assert_eq!(gateway_id, expected),
      other => panic!("expected ConvergeMatch at {expected}, got {other:?}"),
    }
  }

  #[test]
  fn test_straight_line() {
    let matches = check(payload(
      &["a"],
      &[],
      &[("f1", "start", "a"), ("f2", "a", "end")],
    ))
    .unwrap();

    assert!(matches.is_empty());
  }

  #[test]
  fn test_parallel_matched() {
    let matches = check(payload(
      &["a", "b"],
      &[("g1", "ParallelGateway"), ("g2", "ConvergeGateway")],
      &[
        ("f1", "start", "g1"),
        ("f2", "g1", "a"),
        ("f3", "g1", "b"),
        ("f4", "a", "g2"),
        ("f5", "b", "g2"),
        ("f6", "g2", "end"),
      ],
    ))
    .unwrap();

    assert_eq!(matches.get("g1").map(String::as_str), Some("g2"));
  }

  #[test]
  fn test_nested_gateways() {
    let matches = check(payload(
      &["a", "b", "c"],
      &[
        ("g1", "ParallelGateway"),
        ("g2", "ExclusiveGateway"),
        ("c2", "ConvergeGateway"),
        ("c1", "ConvergeGateway"),
      ],
      &[
        ("f1", "start", "g1"),
        ("f2", "g1", "g2"),
        ("f3", "g2", "a"),
        ("f4", "g2", "b"),
        ("f5", "a", "c2"),
        ("f6", "b", "c2"),
        ("f7", "c2", "c1"),
        ("f8", "g1", "c"),
        ("f9", "c", "c1"),
        ("f10", "c1", "end"),
      ],
    ))
    .unwrap();

    assert_eq!(matches.get("g1").map(String::as_str), Some("c1"));
    assert_eq!(matches.get("g2").map(String::as_str), Some("c2"));
  }

  #[test]
  fn test_branch_missing_from_converge() {
    // g1 fans out; only one branch reaches g2, the other goes to the end
    let result = check(payload(
      &["a", "b"],
      &[("g1", "ParallelGateway"), ("g2", "ConvergeGateway")],
      &[
        ("f1", "start", "g1"),
        ("f2", "g1", "a"),
        ("f3", "g1", "b"),
        ("f4", "a", "g2"),
        ("f5", "g2", "end"),
        ("f6", "b", "end"),
      ],
    ));

    assert_mismatch_at(result, "g2");
  }

  #[test]
  fn test_converge_fed_from_unreachable_node() {
    // x has no incoming flow, so the walk never visits it
    let result = check(payload(
      &["a", "b", "x"],
      &[("g1", "ParallelGateway"), ("c1", "ConvergeGateway")],
      &[
        ("f1", "start", "g1"),
        ("f2", "g1", "a"),
        ("f3", "g1", "b"),
        ("f4", "a", "c1"),
        ("f5", "b", "c1"),
        ("f6", "x", "c1"),
        ("f7", "c1", "end"),
      ],
    ));

    match result {
      Err(ValidateError::ConvergeMatch { gateway_id, reason }) => {
        assert_eq!(gateway_id, "c1");
        assert!(reason.contains("'f6'"), "{reason}");
      }
      other => panic!("expected ConvergeMatch at c1, got {other:?}"),
    }
  }

  #[test]
  fn test_converge_without_diverge() {
    let result = check(payload(
      &["a"],
      &[("c1", "ConvergeGateway")],
      &[("f1", "start", "a"), ("f2", "a", "c1"), ("f3", "c1", "end")],
    ));

    assert_mismatch_at(result, "c1");
  }

  #[test]
  fn test_diverge_never_closed() {
    let result = check(payload(
      &["a", "b"],
      &[("g1", "ExclusiveGateway")],
      &[
        ("f1", "start", "g1"),
        ("f2", "g1", "a"),
        ("f3", "g1", "b"),
        ("f4", "a", "end"),
        ("f5", "b", "end"),
      ],
    ));

    assert_mismatch_at(result, "g1");
  }

  #[test]
  fn test_merge_without_converge() {
    let result = check(payload(
      &["a", "b", "c"],
      &[("g1", "ParallelGateway")],
      &[
        ("f1", "start", "g1"),
        ("f2", "g1", "a"),
        ("f3", "g1", "b"),
        ("f4", "a", "c"),
        ("f5", "b", "c"),
        ("f6", "c", "end"),
      ],
    ));

    assert_mismatch_at(result, "c");
  }

  #[test]
  fn test_converge_mixing_two_diverges() {
    // c1 receives one branch of g1 and one branch of g2
    let result = check(payload(
      &["a", "b"],
      &[
        ("g1", "ParallelGateway"),
        ("g2", "ParallelGateway"),
        ("c1", "ConvergeGateway"),
        ("c2", "ConvergeGateway"),
      ],
      &[
        ("f1", "start", "g1"),
        ("f2", "g1", "g2"),
        ("f3", "g1", "a"),
        ("f4", "g2", "b"),
        ("f5", "g2", "c1"),
        ("f6", "a", "c1"),
        ("f7", "b", "c2"),
        ("f8", "c1", "c2"),
        ("f9", "c2", "end"),
      ],
    ));

    assert!(matches!(result, Err(ValidateError::ConvergeMatch { .. })));
  }

  #[test]
  fn test_activity_with_two_outgoing_flows() {
    let result = check(payload(
      &["a", "b"],
      &[],
      &[
        ("f1", "start", "a"),
        ("f2", "a", "b"),
        ("f3", "a", "end"),
        ("f4", "b", "end"),
      ],
    ));

    assert!(matches!(
      result,
      Err(ValidateError::Graph(GraphError::AmbiguousFlow { count: 2 }))
    ));
  }
}
