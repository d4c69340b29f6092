//! Pipework Store
//!
//! This crate provides the storage trait and its SQLite implementation for
//! pipeline snapshots, templates, instances, template schemes and the
//! component catalog.
//!
//! The [`Store`] trait defines operations for:
//! - Content-addressed snapshot storage (one row per distinct payload)
//! - Template and instance rows with soft deletion
//! - Conditional instance state transitions
//! - Template schemes and component catalog entries

pub mod hashing;
mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use sqlx::types::Json;
pub use types::{ComponentRecord, InstanceRecord, SchemeRecord, Snapshot, TemplateRecord};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

/// How many times a snapshot insert that lost a race is retried.
const SNAPSHOT_ATTEMPTS: usize = 3;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A uniqueness constraint rejected the write.
  #[error("conflict: {0}")]
  Conflict(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for Pipework records.
#[async_trait]
pub trait Store: Send + Sync {
  /// Get a snapshot by row id.
  async fn get_snapshot(&self, id: i64) -> Result<Snapshot, Error>;

  /// Find a snapshot by content hash.
  async fn find_snapshot(&self, hash: &str) -> Result<Option<Snapshot>, Error>;

  /// Insert a snapshot. Fails with [`Error::Conflict`] if the hash exists.
  async fn insert_snapshot(&self, hash: &str, data: &serde_json::Value) -> Result<Snapshot, Error>;

  /// Delete snapshots no template or instance references. Returns the count.
  async fn purge_orphan_snapshots(&self) -> Result<u64, Error>;

  /// Store `data` unless an identical payload is already stored.
  ///
  /// Returns the snapshot and whether it was created by this call.
  async fn create_or_get_snapshot(&self, data: &serde_json::Value) -> Result<(Snapshot, bool), Error> {
    let hash = hashing::snapshot_hash(data);

    for attempt in 1..=SNAPSHOT_ATTEMPTS {
      if let Some(snapshot) = self.find_snapshot(&hash).await? {
        return Ok((snapshot, false));
      }
      match self.insert_snapshot(&hash, data).await {
        Ok(snapshot) => return Ok((snapshot, true)),
        Err(Error::Conflict(_)) => {
          debug!(hash = %hash, attempt, "snapshot insert raced, fetching again");
        }
        Err(e) => return Err(e),
      }
    }

    Err(Error::Conflict(format!(
      "snapshot {hash} could not be stored after {SNAPSHOT_ATTEMPTS} attempts"
    )))
  }

  /// Create a new template. Fails with [`Error::Conflict`] on a duplicate id.
  async fn insert_template(&self, template: &TemplateRecord) -> Result<(), Error>;

  /// Get a template by id, deleted or not.
  async fn get_template(&self, template_id: &str) -> Result<TemplateRecord, Error>;

  /// Point a live template at a new definition.
  async fn update_template(
    &self,
    template_id: &str,
    name: &str,
    editor: &str,
    edit_time: DateTime<Utc>,
    snapshot_id: i64,
  ) -> Result<(), Error>;

  /// Soft delete templates. Returns how many rows changed.
  async fn soft_delete_templates(&self, template_ids: &[String]) -> Result<u64, Error>;

  /// List live templates, oldest first.
  async fn list_templates(&self) -> Result<Vec<TemplateRecord>, Error>;

  /// Create a new instance. Fails with [`Error::Conflict`] on a duplicate id.
  async fn insert_instance(&self, instance: &InstanceRecord) -> Result<(), Error>;

  /// Get an instance by id, deleted or not.
  async fn get_instance(&self, instance_id: &str) -> Result<InstanceRecord, Error>;

  /// Mark an instance started if it has not been. Returns whether a row changed.
  async fn mark_instance_started(&self, instance_id: &str, at: DateTime<Utc>) -> Result<bool, Error>;

  /// Mark a started instance finished if it has not been. Returns whether a
  /// row changed.
  async fn mark_instance_finished(&self, instance_id: &str, at: DateTime<Utc>) -> Result<bool, Error>;

  /// Repoint an instance that has not started at a new execution snapshot.
  /// Returns whether a row changed.
  async fn update_execution_snapshot(&self, instance_id: &str, snapshot_id: i64) -> Result<bool, Error>;

  /// Soft delete instances. Returns how many rows changed.
  async fn soft_delete_instances(&self, instance_ids: &[String]) -> Result<u64, Error>;

  /// List live instances, optionally only those of one template.
  async fn list_instances(&self, template_id: Option<&str>) -> Result<Vec<InstanceRecord>, Error>;

  /// Create or overwrite a template scheme.
  async fn upsert_scheme(&self, scheme: &SchemeRecord) -> Result<(), Error>;

  /// List the schemes saved for a template.
  async fn list_schemes(&self, template_id: &str) -> Result<Vec<SchemeRecord>, Error>;

  /// Get a catalog entry by code.
  async fn get_component(&self, code: &str) -> Result<Option<ComponentRecord>, Error>;

  /// Add a catalog entry. Fails with [`Error::Conflict`] if the code exists.
  async fn insert_component(&self, component: &ComponentRecord) -> Result<(), Error>;

  /// Overwrite a catalog entry's name and status.
  async fn update_component(&self, component: &ComponentRecord) -> Result<(), Error>;

  /// List catalog entries, optionally only enabled ones.
  async fn list_components(&self, enabled_only: bool) -> Result<Vec<ComponentRecord>, Error>;
}
