use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::{
  ComponentRecord, Error, InstanceRecord, SchemeRecord, Snapshot, Store, TemplateRecord,
};

const TEMPLATE_COLUMNS: &str =
  "template_id, name, creator, editor, create_time, edit_time, snapshot_id, is_deleted";

const INSTANCE_COLUMNS: &str = "instance_id, name, creator, template_id, snapshot_id, \
  execution_snapshot_id, is_started, is_finished, is_deleted, create_time, start_time, finish_time";

/// SQLite-based store implementation.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database at `url` and run migrations.
  pub async fn connect(url: &str) -> Result<Self, Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    let store = Self::new(pool);
    store.migrate().await?;
    info!(url, "connected to sqlite store");
    Ok(store)
  }

  /// A migrated, private in-memory database.
  ///
  /// Each in-memory connection is its own database, so the pool is pinned to
  /// one connection that is never recycled.
  pub async fn in_memory() -> Result<Self, Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .connect_with(options)
      .await?;

    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), Error> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  async fn soft_delete(&self, table: &str, key: &str, ids: &[String]) -> Result<u64, Error> {
    if ids.is_empty() {
      return Ok(0);
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!(
      "UPDATE {table} SET is_deleted = 1 WHERE is_deleted = 0 AND {key} IN ("
    ));
    let mut separated = query.separated(", ");
    for id in ids {
      separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");

    let result = query.build().execute(&self.pool).await?;
    debug!(table, requested = ids.len(), deleted = result.rows_affected(), "soft delete");
    Ok(result.rows_affected())
  }
}

/// Turn a uniqueness violation into [`Error::Conflict`].
fn conflict_on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> Error {
  if let sqlx::Error::Database(db) = &err {
    if db.is_unique_violation() {
      return Error::Conflict(what());
    }
  }
  Error::Database(err)
}

#[async_trait]
impl Store for SqliteStore {
  async fn get_snapshot(&self, id: i64) -> Result<Snapshot, Error> {
    sqlx::query_as(
      r#"
            SELECT id, hash, data, create_time
            FROM snapshots
            WHERE id = ?
            "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("snapshot {id}")))
  }

  async fn find_snapshot(&self, hash: &str) -> Result<Option<Snapshot>, Error> {
    let snapshot = sqlx::query_as(
      r#"
            SELECT id, hash, data, create_time
            FROM snapshots
            WHERE hash = ?
            "#,
    )
    .bind(hash)
    .fetch_optional(&self.pool)
    .await?;

    Ok(snapshot)
  }

  async fn insert_snapshot(&self, hash: &str, data: &serde_json::Value) -> Result<Snapshot, Error> {
    sqlx::query_as(
      r#"
            INSERT INTO snapshots (hash, data, create_time)
            VALUES (?, ?, ?)
            RETURNING id, hash, data, create_time
            "#,
    )
    .bind(hash)
    .bind(Json(data))
    .bind(Utc::now())
    .fetch_one(&self.pool)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("snapshot {hash}")))
  }

  async fn purge_orphan_snapshots(&self) -> Result<u64, Error> {
    let result = sqlx::query(
      r#"
            DELETE FROM snapshots
            WHERE id NOT IN (SELECT snapshot_id FROM templates)
              AND id NOT IN (SELECT snapshot_id FROM instances)
              AND id NOT IN (SELECT execution_snapshot_id FROM instances)
            "#,
    )
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected())
  }

  async fn insert_template(&self, template: &TemplateRecord) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO templates (template_id, name, creator, editor, create_time, edit_time, snapshot_id, is_deleted)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&template.template_id)
    .bind(&template.name)
    .bind(&template.creator)
    .bind(&template.editor)
    .bind(template.create_time)
    .bind(template.edit_time)
    .bind(template.snapshot_id)
    .bind(template.is_deleted)
    .execute(&self.pool)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("template {}", template.template_id)))?;

    Ok(())
  }

  async fn get_template(&self, template_id: &str) -> Result<TemplateRecord, Error> {
    sqlx::query_as(&format!(
      "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE template_id = ?"
    ))
    .bind(template_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("template {template_id}")))
  }

  async fn update_template(
    &self,
    template_id: &str,
    name: &str,
    editor: &str,
    edit_time: DateTime<Utc>,
    snapshot_id: i64,
  ) -> Result<(), Error> {
    let result = sqlx::query(
      r#"
            UPDATE templates
            SET name = ?, editor = ?, edit_time = ?, snapshot_id = ?
            WHERE template_id = ? AND is_deleted = 0
            "#,
    )
    .bind(name)
    .bind(editor)
    .bind(edit_time)
    .bind(snapshot_id)
    .bind(template_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("template {template_id}")));
    }
    Ok(())
  }

  async fn soft_delete_templates(&self, template_ids: &[String]) -> Result<u64, Error> {
    self.soft_delete("templates", "template_id", template_ids).await
  }

  async fn list_templates(&self) -> Result<Vec<TemplateRecord>, Error> {
    let templates = sqlx::query_as(&format!(
      "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE is_deleted = 0 ORDER BY create_time ASC, template_id ASC"
    ))
    .fetch_all(&self.pool)
    .await?;

    Ok(templates)
  }

  async fn insert_instance(&self, instance: &InstanceRecord) -> Result<(), Error> {
    sqlx::query(&format!(
      "INSERT INTO instances ({INSTANCE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&instance.instance_id)
    .bind(&instance.name)
    .bind(&instance.creator)
    .bind(&instance.template_id)
    .bind(instance.snapshot_id)
    .bind(instance.execution_snapshot_id)
    .bind(instance.is_started)
    .bind(instance.is_finished)
    .bind(instance.is_deleted)
    .bind(instance.create_time)
    .bind(instance.start_time)
    .bind(instance.finish_time)
    .execute(&self.pool)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("instance {}", instance.instance_id)))?;

    Ok(())
  }

  async fn get_instance(&self, instance_id: &str) -> Result<InstanceRecord, Error> {
    sqlx::query_as(&format!(
      "SELECT {INSTANCE_COLUMNS} FROM instances WHERE instance_id = ?"
    ))
    .bind(instance_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("instance {instance_id}")))
  }

  async fn mark_instance_started(&self, instance_id: &str, at: DateTime<Utc>) -> Result<bool, Error> {
    let result = sqlx::query(
      r#"
            UPDATE instances
            SET is_started = 1, start_time = ?
            WHERE instance_id = ? AND is_started = 0
            "#,
    )
    .bind(at)
    .bind(instance_id)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() == 1)
  }

  async fn mark_instance_finished(&self, instance_id: &str, at: DateTime<Utc>) -> Result<bool, Error> {
    let result = sqlx::query(
      r#"
            UPDATE instances
            SET is_finished = 1, finish_time = ?
            WHERE instance_id = ? AND is_started = 1 AND is_finished = 0
            "#,
    )
    .bind(at)
    .bind(instance_id)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() == 1)
  }

  async fn update_execution_snapshot(&self, instance_id: &str, snapshot_id: i64) -> Result<bool, Error> {
    let result = sqlx::query(
      r#"
            UPDATE instances
            SET execution_snapshot_id = ?
            WHERE instance_id = ? AND is_started = 0 AND is_deleted = 0
            "#,
    )
    .bind(snapshot_id)
    .bind(instance_id)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() == 1)
  }

  async fn soft_delete_instances(&self, instance_ids: &[String]) -> Result<u64, Error> {
    self.soft_delete("instances", "instance_id", instance_ids).await
  }

  async fn list_instances(&self, template_id: Option<&str>) -> Result<Vec<InstanceRecord>, Error> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
      "SELECT {INSTANCE_COLUMNS} FROM instances WHERE is_deleted = 0"
    ));
    if let Some(template_id) = template_id {
      query.push(" AND template_id = ").push_bind(template_id);
    }
    query.push(" ORDER BY create_time ASC, instance_id ASC");

    let instances = query
      .build_query_as::<InstanceRecord>()
      .fetch_all(&self.pool)
      .await?;
    Ok(instances)
  }

  async fn upsert_scheme(&self, scheme: &SchemeRecord) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO template_schemes (unique_id, template_id, name, data, edit_time)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (unique_id) DO UPDATE SET data = excluded.data, edit_time = excluded.edit_time
            "#,
    )
    .bind(&scheme.unique_id)
    .bind(&scheme.template_id)
    .bind(&scheme.name)
    .bind(&scheme.data)
    .bind(scheme.edit_time)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_schemes(&self, template_id: &str) -> Result<Vec<SchemeRecord>, Error> {
    let schemes = sqlx::query_as(
      r#"
            SELECT unique_id, template_id, name, data, edit_time
            FROM template_schemes
            WHERE template_id = ?
            ORDER BY name ASC
            "#,
    )
    .bind(template_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(schemes)
  }

  async fn get_component(&self, code: &str) -> Result<Option<ComponentRecord>, Error> {
    let component = sqlx::query_as("SELECT code, name, status FROM components WHERE code = ?")
      .bind(code)
      .fetch_optional(&self.pool)
      .await?;

    Ok(component)
  }

  async fn insert_component(&self, component: &ComponentRecord) -> Result<(), Error> {
    sqlx::query("INSERT INTO components (code, name, status) VALUES (?, ?, ?)")
      .bind(&component.code)
      .bind(&component.name)
      .bind(component.status)
      .execute(&self.pool)
      .await
      .map_err(|e| conflict_on_unique(e, || format!("component {}", component.code)))?;

    Ok(())
  }

  async fn update_component(&self, component: &ComponentRecord) -> Result<(), Error> {
    let result = sqlx::query("UPDATE components SET name = ?, status = ? WHERE code = ?")
      .bind(&component.name)
      .bind(component.status)
      .bind(&component.code)
      .execute(&self.pool)
      .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("component {}", component.code)));
    }
    Ok(())
  }

  async fn list_components(&self, enabled_only: bool) -> Result<Vec<ComponentRecord>, Error> {
    let sql = if enabled_only {
      "SELECT code, name, status FROM components WHERE status = 1 ORDER BY code ASC"
    } else {
      "SELECT code, name, status FROM components ORDER BY code ASC"
    };
    let components = sqlx::query_as(sql).fetch_all(&self.pool).await?;

    Ok(components)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use serde_json::json;

  async fn store() -> SqliteStore {
    SqliteStore::in_memory().await.unwrap()
  }

  fn template(template_id: &str, snapshot_id: i64) -> TemplateRecord {
    let now = Utc::now();
    TemplateRecord {
      template_id: template_id.to_string(),
      name: format!("template {template_id}"),
      creator: "alice".to_string(),
      editor: None,
      create_time: now,
      edit_time: now,
      snapshot_id,
      is_deleted: false,
    }
  }

  fn instance(instance_id: &str, template_id: &str, snapshot_id: i64) -> InstanceRecord {
    InstanceRecord {
      instance_id: instance_id.to_string(),
      name: format!("instance {instance_id}"),
      creator: "alice".to_string(),
      template_id: Some(template_id.to_string()),
      snapshot_id,
      execution_snapshot_id: snapshot_id,
      is_started: false,
      is_finished: false,
      is_deleted: false,
      create_time: Utc::now(),
      start_time: None,
      finish_time: None,
    }
  }

  #[tokio::test]
  async fn test_snapshot_dedup() {
    let store = store().await;
    let (first, created) = store
      .create_or_get_snapshot(&json!({"a": 1, "b": [1, 2]}))
      .await
      .unwrap();
    assert!(created);

    let (second, created) = store
      .create_or_get_snapshot(&json!({"b": [1, 2], "a": 1}))
      .await
      .unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);
    assert_eq!(first.hash, second.hash);
  }

  #[tokio::test]
  async fn test_concurrent_snapshot_creation_yields_one_row() {
    let store = store().await;
    let payload = json!({"k": "v"});

    let results =
      futures::future::join_all((0..8).map(|_| store.create_or_get_snapshot(&payload))).await;
    let ids: Vec<i64> = results.into_iter().map(|r| r.unwrap().0.id).collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
  }

  #[tokio::test]
  async fn test_insert_duplicate_hash_conflicts() {
    let store = store().await;
    store.insert_snapshot("h", &json!(1)).await.unwrap();

    let err = store.insert_snapshot("h", &json!(2)).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
  }

  #[tokio::test]
  async fn test_get_missing_snapshot() {
    let store = store().await;
    assert!(matches!(store.get_snapshot(42).await, Err(Error::NotFound(_))));
  }

  #[tokio::test]
  async fn test_template_update_and_soft_delete() {
    let store = store().await;
    let (v1, _) = store.create_or_get_snapshot(&json!({"v": 1})).await.unwrap();
    let (v2, _) = store.create_or_get_snapshot(&json!({"v": 2})).await.unwrap();
    store.insert_template(&template("t1", v1.id)).await.unwrap();

    let later = Utc::now() + Duration::seconds(1);
    store
      .update_template("t1", "renamed", "bob", later, v2.id)
      .await
      .unwrap();
    let row = store.get_template("t1").await.unwrap();
    assert_eq!(row.name, "renamed");
    assert_eq!(row.editor.as_deref(), Some("bob"));
    assert_eq!(row.snapshot_id, v2.id);

    let ids = vec!["t1".to_string(), "missing".to_string()];
    assert_eq!(store.soft_delete_templates(&ids).await.unwrap(), 1);
    assert_eq!(store.soft_delete_templates(&ids).await.unwrap(), 0);
    assert!(store.list_templates().await.unwrap().is_empty());
    assert!(store.get_template("t1").await.unwrap().is_deleted);

    let err = store
      .update_template("t1", "again", "bob", later, v1.id)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn test_duplicate_template_conflicts() {
    let store = store().await;
    let (snapshot, _) = store.create_or_get_snapshot(&json!({})).await.unwrap();
    store.insert_template(&template("t1", snapshot.id)).await.unwrap();

    let err = store
      .insert_template(&template("t1", snapshot.id))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
  }

  #[tokio::test]
  async fn test_instance_transitions_are_conditional() {
    let store = store().await;
    let (snapshot, _) = store.create_or_get_snapshot(&json!({})).await.unwrap();
    store
      .insert_instance(&instance("i1", "t1", snapshot.id))
      .await
      .unwrap();

    let now = Utc::now();
    assert!(!store.mark_instance_finished("i1", now).await.unwrap());
    assert!(store.mark_instance_started("i1", now).await.unwrap());
    assert!(!store.mark_instance_started("i1", now).await.unwrap());
    assert!(!store.update_execution_snapshot("i1", snapshot.id).await.unwrap());
    assert!(store.mark_instance_finished("i1", now).await.unwrap());
    assert!(!store.mark_instance_finished("i1", now).await.unwrap());

    let row = store.get_instance("i1").await.unwrap();
    assert!(row.is_started && row.is_finished);
    assert_eq!(row.start_time, Some(now));
    assert_eq!(row.finish_time, Some(now));
  }

  #[tokio::test]
  async fn test_list_instances_by_template() {
    let store = store().await;
    let (snapshot, _) = store.create_or_get_snapshot(&json!({})).await.unwrap();
    for (id, template_id) in [("i1", "t1"), ("i2", "t2"), ("i3", "t1")] {
      store
        .insert_instance(&instance(id, template_id, snapshot.id))
        .await
        .unwrap();
    }
    store
      .soft_delete_instances(&["i3".to_string()])
      .await
      .unwrap();

    let all = store.list_instances(None).await.unwrap();
    assert_eq!(all.len(), 2);

    let of_t1 = store.list_instances(Some("t1")).await.unwrap();
    assert_eq!(of_t1.len(), 1);
    assert_eq!(of_t1[0].instance_id, "i1");
  }

  #[tokio::test]
  async fn test_purge_keeps_referenced_snapshots() {
    let store = store().await;
    let (kept, _) = store.create_or_get_snapshot(&json!({"kept": true})).await.unwrap();
    let (orphan, _) = store.create_or_get_snapshot(&json!({"kept": false})).await.unwrap();
    store.insert_template(&template("t1", kept.id)).await.unwrap();

    assert_eq!(store.purge_orphan_snapshots().await.unwrap(), 1);
    assert!(store.get_snapshot(kept.id).await.is_ok());
    assert!(matches!(
      store.get_snapshot(orphan.id).await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_scheme_upsert_overwrites() {
    let store = store().await;
    let mut scheme = SchemeRecord {
      unique_id: "t1-fast".to_string(),
      template_id: "t1".to_string(),
      name: "fast".to_string(),
      data: Json(json!(["a"])),
      edit_time: Utc::now(),
    };
    store.upsert_scheme(&scheme).await.unwrap();
    scheme.data = Json(json!(["a", "b"]));
    store.upsert_scheme(&scheme).await.unwrap();

    let schemes = store.list_schemes("t1").await.unwrap();
    assert_eq!(schemes.len(), 1);
    assert_eq!(schemes[0].data.0, json!(["a", "b"]));
  }

  #[tokio::test]
  async fn test_component_catalog_rows() {
    let store = store().await;
    let mut component = ComponentRecord {
      code: "sleep_timer".to_string(),
      name: "timer-sleep".to_string(),
      status: false,
    };
    store.insert_component(&component).await.unwrap();
    assert!(matches!(
      store.insert_component(&component).await,
      Err(Error::Conflict(_))
    ));
    assert!(store.list_components(true).await.unwrap().is_empty());

    component.status = true;
    store.update_component(&component).await.unwrap();
    assert_eq!(store.list_components(true).await.unwrap(), vec![component.clone()]);
    assert_eq!(store.get_component("sleep_timer").await.unwrap(), Some(component));
  }
}
