use async_trait::async_trait;
use pipework_store::{ComponentRecord, SqliteStore, Store};

use crate::error::RegistryError;

/// Result of telling the catalog about a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOutcome {
  Registered,
  Updated,
  AlreadyRegistered,
}

/// Durable record of which components exist, used by listings outside the
/// running process.
#[async_trait]
pub trait ComponentCatalog: Send + Sync {
  async fn register(&self, code: &str, name: &str, enabled: bool) -> Result<CatalogOutcome, RegistryError>;
}

#[async_trait]
impl ComponentCatalog for SqliteStore {
  async fn register(&self, code: &str, name: &str, enabled: bool) -> Result<CatalogOutcome, RegistryError> {
    let record = ComponentRecord {
      code: code.to_string(),
      name: name.to_string(),
      status: enabled,
    };

    match self.get_component(code).await? {
      None => match self.insert_component(&record).await {
        Ok(()) => Ok(CatalogOutcome::Registered),
        // Registered concurrently by another process
        Err(pipework_store::Error::Conflict(_)) => Ok(CatalogOutcome::AlreadyRegistered),
        Err(e) => Err(e.into()),
      },
      Some(existing) if existing == record => Ok(CatalogOutcome::AlreadyRegistered),
      Some(_) => {
        self.update_component(&record).await?;
        Ok(CatalogOutcome::Updated)
      }
    }
  }
}
