use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// An immutable, content-addressed pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Snapshot {
  pub id: i64,
  pub hash: String,
  pub data: Json<serde_json::Value>,
  pub create_time: DateTime<Utc>,
}

/// A template row. `snapshot_id` points at the current definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TemplateRecord {
  pub template_id: String,
  pub name: String,
  pub creator: String,
  pub editor: Option<String>,
  pub create_time: DateTime<Utc>,
  pub edit_time: DateTime<Utc>,
  pub snapshot_id: i64,
  pub is_deleted: bool,
}

/// An instance row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InstanceRecord {
  pub instance_id: String,
  pub name: String,
  pub creator: String,
  pub template_id: Option<String>,
  /// The template's definition at instantiation time.
  pub snapshot_id: i64,
  /// The unfolded tree handed to the runtime.
  pub execution_snapshot_id: i64,
  pub is_started: bool,
  pub is_finished: bool,
  pub is_deleted: bool,
  pub create_time: DateTime<Utc>,
  pub start_time: Option<DateTime<Utc>>,
  pub finish_time: Option<DateTime<Utc>>,
}

/// A named node selection saved for a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SchemeRecord {
  pub unique_id: String,
  pub template_id: String,
  pub name: String,
  pub data: Json<serde_json::Value>,
  pub edit_time: DateTime<Utc>,
}

/// A component catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ComponentRecord {
  pub code: String,
  pub name: String,
  pub status: bool,
}
