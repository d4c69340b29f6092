//! Sub-process reference graph.
//!
//! Nodes are template ids; an edge `A -> B` means template A contains a
//! sub-process activity that references template B.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use pipework_config::PipelineTree;
use tracing::debug;

use crate::error::ValidateError;
use crate::source::{RootTemplate, TemplateSource};

#[derive(Debug, Default)]
pub struct ReferenceGraph {
  root: String,
  edges: IndexMap<String, Vec<String>>,
  names: HashMap<String, String>,
}

impl ReferenceGraph {
  /// Discover every template reachable from `tree` through sub-process
  /// references, loading referenced templates from `source`.
  ///
  /// The root's stored content is never loaded: `tree` stands in for it.
  pub async fn build<S>(
    tree: &PipelineTree,
    root: &RootTemplate,
    source: &S,
  ) -> Result<Self, ValidateError>
  where
    S: TemplateSource + ?Sized,
  {
    let mut graph = Self {
      root: root.id().to_string(),
      ..Self::default()
    };
    graph
      .names
      .insert(root.id().to_string(), root.name().to_string());

    let mut queue = VecDeque::new();
    queue.push_back((root.id().to_string(), owned_refs(tree)));

    while let Some((template_id, refs)) = queue.pop_front() {
      let mut targets: Vec<String> = Vec::new();

      for (activity_id, target) in refs {
        if !targets.contains(&target) {
          targets.push(target.clone());
        }
        if graph.names.contains_key(&target) {
          continue;
        }

        let loaded = source
          .load_template(&target)
          .await
          .map_err(|source| ValidateError::Lookup {
            template_id: target.clone(),
            source,
          })?
          .ok_or_else(|| ValidateError::UnknownSubprocess {
            activity_id,
            template_id: target.clone(),
          })?;

        debug!(template_id = %target, name = %loaded.name, "loaded referenced template");
        graph.names.insert(target.clone(), loaded.name);
        queue.push_back((target, owned_refs(&loaded.tree)));
      }

      graph.edges.insert(template_id, targets);
    }

    Ok(graph)
  }

  pub fn root(&self) -> &str {
    &self.root
  }

  /// Templates referenced directly by `template_id`.
  pub fn references(&self, template_id: &str) -> &[String] {
    self.edges.get(template_id).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Number of templates in the graph, root included.
  pub fn len(&self) -> usize {
    self.edges.len()
  }

  pub fn is_empty(&self) -> bool {
    self.edges.is_empty()
  }

  pub fn name(&self, template_id: &str) -> Option<&str> {
    self.names.get(template_id).map(String::as_str)
  }

  /// Find the first cycle reachable from the root, searching depth first in
  /// insertion order. Returns the template ids from the cycle entry back to
  /// itself, e.g. `[a, b, a]`.
  pub fn find_cycle(&self) -> Option<Vec<String>> {
    // DFS with coloring: 0 = white (unvisited), 1 = gray (in progress), 2 = black (done)
    let mut color: HashMap<&str, u8> = self.edges.keys().map(|id| (id.as_str(), 0u8)).collect();
    let mut path: Vec<&str> = Vec::new();

    fn dfs<'a>(
      node: &'a str,
      edges: &'a IndexMap<String, Vec<String>>,
      color: &mut HashMap<&'a str, u8>,
      path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
      color.insert(node, 1);
      path.push(node);

      for neighbor in edges.get(node).into_iter().flatten() {
        match color.get(neighbor.as_str()) {
          Some(1) => {
            // Back edge: the cycle starts where the neighbor sits on the path
            let entry = path.iter().position(|id| *id == neighbor.as_str())?;
            let mut trace: Vec<String> = path[entry..].iter().map(|id| id.to_string()).collect();
            trace.push(neighbor.clone());
            return Some(trace);
          }
          Some(0) | None => {
            if let Some(trace) = dfs(neighbor, edges, color, path) {
              return Some(trace);
            }
          }
          _ => {}
        }
      }

      path.pop();
      color.insert(node, 2);
      None
    }

    for template_id in self.edges.keys() {
      if color.get(template_id.as_str()) == Some(&0) {
        if let Some(trace) = dfs(template_id, &self.edges, &mut color, &mut path) {
          return Some(trace);
        }
      }
    }
    None
  }

  fn display(&self, ids: Vec<String>) -> Vec<String> {
    ids
      .into_iter()
      .map(|id| self.names.get(&id).cloned().unwrap_or(id))
      .collect()
  }
}

fn owned_refs(tree: &PipelineTree) -> Vec<(String, String)> {
  tree
    .subprocess_refs()
    .map(|(activity_id, template_id)| (activity_id.to_string(), template_id.to_string()))
    .collect()
}

/// Build the reference graph rooted at `root` and reject it if any
/// sub-process chain leads back to a template already on the chain.
pub async fn check_subprocess_references<S>(
  tree: &PipelineTree,
  root: &RootTemplate,
  source: &S,
) -> Result<ReferenceGraph, ValidateError>
where
  S: TemplateSource + ?Sized,
{
  let graph = ReferenceGraph::build(tree, root, source).await?;

  if let Some(cycle) = graph.find_cycle() {
    return Err(ValidateError::CircularReference {
      trace: graph.display(cycle),
    });
  }

  Ok(graph)
}
