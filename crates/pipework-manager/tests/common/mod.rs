#![allow(dead_code)]

use std::sync::Arc;

use pipework_manager::{InstanceManager, TemplateManager};
use pipework_store::SqliteStore;
use serde_json::{Value, json};

pub async fn managers() -> (TemplateManager<SqliteStore>, InstanceManager<SqliteStore>) {
  let store = Arc::new(SqliteStore::in_memory().await.unwrap());
  (
    TemplateManager::new(store.clone()),
    InstanceManager::new(store),
  )
}

/// `start -> act -> end` running a `sleep_timer` component.
pub fn simple_tree() -> Value {
  json!({
    "start_event": {"id": "start", "outgoing": ["f1"]},
    "end_event": {"id": "end", "incoming": ["f2"]},
    "activities": {
      "act": {
        "id": "act",
        "type": "ServiceActivity",
        "component": {"code": "sleep_timer", "data": {"seconds": 1}},
        "incoming": ["f1"],
        "outgoing": ["f2"]
      }
    },
    "flows": {
      "f1": {"id": "f1", "source": "start", "target": "act"},
      "f2": {"id": "f2", "source": "act", "target": "end"}
    }
  })
}

/// `start -> sub -> end` where `sub` runs the given template.
pub fn tree_with_subprocess(template_id: &str) -> Value {
  json!({
    "start_event": {"id": "start", "outgoing": ["f1"]},
    "end_event": {"id": "end", "incoming": ["f2"]},
    "activities": {
      "sub": {
        "id": "sub",
        "type": "SubProcess",
        "template_id": template_id,
        "incoming": ["f1"],
        "outgoing": ["f2"]
      }
    },
    "flows": {
      "f1": {"id": "f1", "source": "start", "target": "sub"},
      "f2": {"id": "f2", "source": "sub", "target": "end"}
    }
  })
}

/// A parallel gateway whose second branch skips the converge gateway.
pub fn unconverged_tree() -> Value {
  json!({
    "start_event": {"id": "start", "outgoing": ["f1"]},
    "end_event": {"id": "end", "incoming": ["f5", "f6"]},
    "activities": {
      "a": {"id": "a", "type": "ServiceActivity", "component": {"code": "noop"},
            "incoming": ["f2"], "outgoing": ["f4"]},
      "b": {"id": "b", "type": "ServiceActivity", "component": {"code": "noop"},
            "incoming": ["f3"], "outgoing": ["f6"]}
    },
    "gateways": {
      "G1": {"id": "G1", "type": "ParallelGateway", "incoming": ["f1"], "outgoing": ["f2", "f3"]},
      "G2": {"id": "G2", "type": "ConvergeGateway", "incoming": ["f4"], "outgoing": ["f5"]}
    },
    "flows": {
      "f1": {"id": "f1", "source": "start", "target": "G1"},
      "f2": {"id": "f2", "source": "G1", "target": "a"},
      "f3": {"id": "f3", "source": "G1", "target": "b"},
      "f4": {"id": "f4", "source": "a", "target": "G2"},
      "f5": {"id": "f5", "source": "G2", "target": "end"},
      "f6": {"id": "f6", "source": "b", "target": "end"}
    }
  })
}
