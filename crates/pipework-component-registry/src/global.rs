//! Process-wide registry.
//!
//! The binary installs one registry at startup; tests build their own
//! [`ComponentRegistry`] instead of touching this.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::RegistryError;
use crate::registry::ComponentRegistry;

static GLOBAL: RwLock<Option<Arc<ComponentRegistry>>> = RwLock::new(None);

/// Install `registry` as the process-wide registry.
pub fn init(registry: ComponentRegistry) -> Result<Arc<ComponentRegistry>, RegistryError> {
  let mut slot = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
  if slot.is_some() {
    return Err(RegistryError::AlreadyInitialized);
  }

  let registry = Arc::new(registry);
  *slot = Some(registry.clone());
  Ok(registry)
}

pub fn global() -> Option<Arc<ComponentRegistry>> {
  GLOBAL
    .read()
    .unwrap_or_else(PoisonError::into_inner)
    .clone()
}

/// Drop the process-wide registry so that [`init`] can be called again.
pub fn reset() {
  *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = None;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_init_global_reset() {
    reset();
    assert!(global().is_none());

    let installed = init(ComponentRegistry::new()).unwrap();
    assert!(Arc::ptr_eq(&installed, &global().unwrap()));
    assert!(matches!(
      init(ComponentRegistry::new()),
      Err(RegistryError::AlreadyInitialized)
    ));

    reset();
    assert!(global().is_none());
  }
}
