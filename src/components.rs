//! Components shipped with the binary.

use std::sync::Arc;

use anyhow::Result;
use pipework_component_registry::{ComponentDescriptor, ComponentRegistry};
use pipework_store::SqliteStore;
use serde_json::json;

fn builtins() -> Vec<ComponentDescriptor> {
  vec![
    ComponentDescriptor::new("sleep_timer", "Sleep", "timer")
      .with_inputs(json!([
        {"key": "seconds", "type": "int", "required": true}
      ]))
      .with_form(json!({"seconds": {"type": "input", "label": "Seconds"}})),
    ComponentDescriptor::new("pause_node", "Pause", "flow")
      .with_outputs(json!([
        {"key": "resumed_by", "type": "string"}
      ])),
    ComponentDescriptor::new("noop", "No-op", "flow"),
  ]
}

/// Build the process registry with the built-in components, recording them
/// in the store's component catalog.
pub async fn install(store: Arc<SqliteStore>) -> Result<Arc<ComponentRegistry>> {
  let registry = ComponentRegistry::with_catalog(store);
  for descriptor in builtins() {
    registry.register(descriptor).await?;
  }
  Ok(pipework_component_registry::init(registry)?)
}
