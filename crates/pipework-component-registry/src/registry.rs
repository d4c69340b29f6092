use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use pipework_config::PipelineTree;
use tracing::{debug, info, warn};

use crate::catalog::ComponentCatalog;
use crate::descriptor::ComponentDescriptor;
use crate::error::RegistryError;

/// What [`ComponentRegistry::register`] did with a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
  Created,
  Updated,
  Unchanged,
}

/// In-memory registry of component descriptors keyed by code.
///
/// Entries are only ever added or rewritten, never removed. When a catalog is
/// attached, every registration is also reported to it.
#[derive(Default)]
pub struct ComponentRegistry {
  components: RwLock<IndexMap<String, ComponentDescriptor>>,
  catalog: Option<Arc<dyn ComponentCatalog>>,
}

impl ComponentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_catalog(catalog: Arc<dyn ComponentCatalog>) -> Self {
    Self {
      components: RwLock::default(),
      catalog: Some(catalog),
    }
  }

  /// Add or refresh a component.
  ///
  /// The new descriptor always replaces the stored one. The outcome only
  /// reports whether the name or enabled status changed. Catalog failures
  /// are logged and do not fail the registration.
  pub async fn register(&self, descriptor: ComponentDescriptor) -> Result<Registration, RegistryError> {
    descriptor.check()?;

    let registration = {
      let mut components = self
        .components
        .write()
        .unwrap_or_else(PoisonError::into_inner);

      match components.insert(descriptor.code.clone(), descriptor.clone()) {
        Some(previous)
          if previous.name == descriptor.name && previous.enabled == descriptor.enabled =>
        {
          Registration::Unchanged
        }
        Some(_) => Registration::Updated,
        None => Registration::Created,
      }
    };

    if let Some(catalog) = &self.catalog {
      let name = descriptor.catalog_name();
      match catalog
        .register(&descriptor.code, &name, descriptor.enabled)
        .await
      {
        Ok(outcome) => debug!(code = %descriptor.code, ?outcome, "component catalog updated"),
        Err(e) => warn!(code = %descriptor.code, error = %e, "failed to record component in catalog"),
      }
    }

    info!(code = %descriptor.code, ?registration, "registered component");
    Ok(registration)
  }

  pub fn get(&self, code: &str) -> Result<ComponentDescriptor, RegistryError> {
    self
      .components
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(code)
      .cloned()
      .ok_or_else(|| RegistryError::UnknownComponent {
        code: code.to_string(),
      })
  }

  pub fn contains(&self, code: &str) -> bool {
    self
      .components
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(code)
  }

  /// Enabled descriptors in registration order.
  pub fn list_enabled(&self) -> Vec<ComponentDescriptor> {
    self
      .components
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .filter(|descriptor| descriptor.enabled)
      .cloned()
      .collect()
  }

  /// The descriptor behind each service activity of `tree`, keyed by
  /// activity id. Activities whose component is not registered are skipped.
  pub fn describe_tree(&self, tree: &PipelineTree) -> IndexMap<String, ComponentDescriptor> {
    let components = self
      .components
      .read()
      .unwrap_or_else(PoisonError::into_inner);

    let mut described = IndexMap::new();
    for (activity_id, code) in tree.component_refs() {
      match components.get(code) {
        Some(descriptor) => {
          described.insert(activity_id.to_string(), descriptor.clone());
        }
        None => warn!(activity_id, code, "activity uses an unregistered component"),
      }
    }
    described
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::CatalogOutcome;
  use async_trait::async_trait;
  use serde_json::json;

  struct BrokenCatalog;

  #[async_trait]
  impl ComponentCatalog for BrokenCatalog {
    async fn register(&self, _: &str, _: &str, _: bool) -> Result<CatalogOutcome, RegistryError> {
      Err(RegistryError::Catalog(pipework_store::Error::NotFound(
        "catalog table".to_string(),
      )))
    }
  }

  fn sleep_timer() -> ComponentDescriptor {
    ComponentDescriptor::new("sleep_timer", "Sleep", "timer")
      .with_inputs(json!([{"key": "seconds", "type": "int"}]))
  }

  #[tokio::test]
  async fn test_register_outcomes() {
    let registry = ComponentRegistry::new();

    assert_eq!(
      registry.register(sleep_timer()).await.unwrap(),
      Registration::Created
    );
    assert_eq!(
      registry.register(sleep_timer()).await.unwrap(),
      Registration::Unchanged
    );
    assert_eq!(
      registry.register(sleep_timer().disabled()).await.unwrap(),
      Registration::Updated
    );
    assert!(!registry.get("sleep_timer").unwrap().enabled);
  }

  #[tokio::test]
  async fn test_unchanged_registration_still_refreshes_descriptor() {
    let registry = ComponentRegistry::new();
    registry.register(sleep_timer()).await.unwrap();

    let refreshed = sleep_timer().with_inputs(json!([{"key": "minutes", "type": "int"}]));
    assert_eq!(
      registry.register(refreshed.clone()).await.unwrap(),
      Registration::Unchanged
    );
    assert_eq!(registry.get("sleep_timer").unwrap(), refreshed);
  }

  #[tokio::test]
  async fn test_invalid_descriptor() {
    let registry = ComponentRegistry::new();
    let err = registry
      .register(ComponentDescriptor::new("x", "", "g"))
      .await
      .unwrap_err();

    assert!(matches!(err, RegistryError::InvalidDescriptor(_)));
    assert!(!registry.contains("x"));
  }

  #[test]
  fn test_get_unknown() {
    let registry = ComponentRegistry::new();
    assert!(matches!(
      registry.get("nope"),
      Err(RegistryError::UnknownComponent { code }) if code == "nope"
    ));
  }

  #[tokio::test]
  async fn test_list_enabled_in_registration_order() {
    let registry = ComponentRegistry::new();
    registry
      .register(ComponentDescriptor::new("b", "B", "g"))
      .await
      .unwrap();
    registry
      .register(ComponentDescriptor::new("off", "Off", "g").disabled())
      .await
      .unwrap();
    registry
      .register(ComponentDescriptor::new("a", "A", "g"))
      .await
      .unwrap();

    let codes: Vec<String> = registry
      .list_enabled()
      .into_iter()
      .map(|d| d.code)
      .collect();
    assert_eq!(codes, vec!["b", "a"]);
  }

  #[tokio::test]
  async fn test_catalog_failure_does_not_fail_registration() {
    let registry = ComponentRegistry::with_catalog(Arc::new(BrokenCatalog));

    assert_eq!(
      registry.register(sleep_timer()).await.unwrap(),
      Registration::Created
    );
  }

  #[tokio::test]
  async fn test_describe_tree_skips_unknown() {
    let registry = ComponentRegistry::new();
    registry.register(sleep_timer()).await.unwrap();

    let tree = PipelineTree::from_value(&json!({
      "start_event": {"id": "s", "outgoing": ["f1"]},
      "end_event": {"id": "e", "incoming": ["f3"]},
      "activities": {
        "a1": {"id": "a1", "type": "ServiceActivity", "component": {"code": "sleep_timer"},
               "incoming": ["f1"], "outgoing": ["f2"]},
        "a2": {"id": "a2", "type": "ServiceActivity", "component": {"code": "missing"},
               "incoming": ["f2"], "outgoing": ["f3"]}
      },
      "flows": {
        "f1": {"id": "f1", "source": "s", "target": "a1"},
        "f2": {"id": "f2", "source": "a1", "target": "a2"},
        "f3": {"id": "f3", "source": "a2", "target": "e"}
      }
    }))
    .unwrap();

    let described = registry.describe_tree(&tree);
    assert_eq!(described.len(), 1);
    assert_eq!(described["a1"].code, "sleep_timer");
  }
}
