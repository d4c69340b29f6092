//! In-memory template source and tree builders for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use pipework_config::PipelineTree;
use serde_json::{Map, Value, json};

use crate::error::BoxError;
use crate::source::{SourceTemplate, TemplateSource};

#[derive(Default)]
pub struct MemorySource {
  templates: HashMap<String, SourceTemplate>,
}

impl MemorySource {
  pub fn with(mut self, template_id: &str, name: &str, tree: PipelineTree) -> Self {
    self.templates.insert(
      template_id.to_string(),
      SourceTemplate {
        template_id: template_id.to_string(),
        name: name.to_string(),
        tree,
      },
    );
    self
  }
}

#[async_trait]
impl TemplateSource for MemorySource {
  async fn load_template(&self, template_id: &str) -> Result<Option<SourceTemplate>, BoxError> {
    Ok(self.templates.get(template_id).cloned())
  }
}

/// A straight line `start -> sub0 -> sub1 -> .. -> end` with one sub-process
/// per referenced template id.
pub fn tree_referencing(template_ids: &[&str]) -> PipelineTree {
  let mut chain = vec!["start".to_string()];
  chain.extend((0..template_ids.len()).map(|i| format!("sub{i}")));
  chain.push("end".to_string());

  let links = |i: usize| {
    let incoming: Vec<String> = (i > 0).then(|| format!("f{}", i - 1)).into_iter().collect();
    let outgoing: Vec<String> = (i + 1 < chain.len()).then(|| format!("f{i}")).into_iter().collect();
    (incoming, outgoing)
  };

  let mut activities = Map::new();
  for (i, template_id) in template_ids.iter().enumerate() {
    let (incoming, outgoing) = links(i + 1);
    activities.insert(
      chain[i + 1].clone(),
      json!({
        "id": chain[i + 1],
        "type": "SubProcess",
        "template_id": template_id,
        "incoming": incoming,
        "outgoing": outgoing,
      }),
    );
  }

  let mut flows = Map::new();
  for i in 0..chain.len() - 1 {
    let id = format!("f{i}");
    flows.insert(
      id.clone(),
      json!({"id": id, "source": chain[i], "target": chain[i + 1]}),
    );
  }

  let (_, start_out) = links(0);
  let (end_in, _) = links(chain.len() - 1);
  let value: Value = json!({
    "start_event": {"id": "start", "outgoing": start_out},
    "end_event": {"id": "end", "incoming": end_in},
    "activities": activities,
    "flows": flows,
  });

  PipelineTree::from_value(&value).unwrap()
}

/// Payload for a graph with `start`, `end`, service activities running a
/// `noop` component, the given gateways `(id, type)` and flows
/// `(id, source, target)`. Node incoming/outgoing lists follow the flows.
pub fn payload(activities: &[&str], gateways: &[(&str, &str)], flows: &[(&str, &str, &str)]) -> Value {
  let links = |node: &str| {
    let incoming: Vec<&str> = flows.iter().filter(|f| f.2 == node).map(|f| f.0).collect();
    let outgoing: Vec<&str> = flows.iter().filter(|f| f.1 == node).map(|f| f.0).collect();
    (incoming, outgoing)
  };

  let mut activity_map = Map::new();
  for id in activities {
    let (incoming, outgoing) = links(id);
    activity_map.insert(
      id.to_string(),
      json!({
        "id": id,
        "type": "ServiceActivity",
        "component": {"code": "noop"},
        "incoming": incoming,
        "outgoing": outgoing,
      }),
    );
  }

  let mut gateway_map = Map::new();
  for (id, kind) in gateways {
    let (incoming, outgoing) = links(id);
    gateway_map.insert(
      id.to_string(),
      json!({"id": id, "type": kind, "incoming": incoming, "outgoing": outgoing}),
    );
  }

  let mut flow_map = Map::new();
  for (id, source, target) in flows {
    flow_map.insert(
      id.to_string(),
      json!({"id": id, "source": source, "target": target}),
    );
  }

  let (_, start_out) = links("start");
  let (end_in, _) = links("end");
  json!({
    "start_event": {"id": "start", "outgoing": start_out},
    "end_event": {"id": "end", "incoming": end_in},
    "activities": activity_map,
    "gateways": gateway_map,
    "flows": flow_map,
  })
}
