use chrono::{DateTime, Utc};
use pipework_store::{InstanceRecord, Snapshot, TemplateRecord};
use serde::Serialize;

use crate::error::ManagerError;

/// A template together with its current definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
  pub template_id: String,
  pub name: String,
  pub creator: String,
  pub editor: Option<String>,
  pub create_time: DateTime<Utc>,
  pub edit_time: DateTime<Utc>,
  pub snapshot: Snapshot,
  pub is_deleted: bool,
}

impl Template {
  pub(crate) fn from_record(record: TemplateRecord, snapshot: Snapshot) -> Self {
    Self {
      template_id: record.template_id,
      name: record.name,
      creator: record.creator,
      editor: record.editor,
      create_time: record.create_time,
      edit_time: record.edit_time,
      snapshot,
      is_deleted: record.is_deleted,
    }
  }

  /// The stored pipeline tree payload.
  pub fn data(&self) -> &serde_json::Value {
    &self.snapshot.data.0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
  Created,
  Started,
  Finished,
}

impl InstanceState {
  pub(crate) fn of(record: &InstanceRecord) -> Result<Self, ManagerError> {
    match (record.is_started, record.is_finished) {
      (false, false) => Ok(Self::Created),
      (true, false) => Ok(Self::Started),
      (true, true) => Ok(Self::Finished),
      (false, true) => Err(ManagerError::CorruptState {
        instance_id: record.instance_id.clone(),
      }),
    }
  }
}

/// An instance with both of its snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
  pub instance_id: String,
  pub name: String,
  pub creator: String,
  /// The template instantiated, if its row still exists.
  pub template: Option<String>,
  /// The template's definition at instantiation time.
  pub snapshot: Snapshot,
  /// The unfolded tree handed to the runtime.
  pub execution_snapshot: Snapshot,
  pub state: InstanceState,
  pub is_deleted: bool,
  pub create_time: DateTime<Utc>,
  pub start_time: Option<DateTime<Utc>>,
  pub finish_time: Option<DateTime<Utc>>,
}

impl Instance {
  pub(crate) fn from_record(
    record: InstanceRecord,
    template: Option<String>,
    snapshot: Snapshot,
    execution_snapshot: Snapshot,
  ) -> Result<Self, ManagerError> {
    let state = InstanceState::of(&record)?;
    Ok(Self {
      instance_id: record.instance_id,
      name: record.name,
      creator: record.creator,
      template,
      snapshot,
      execution_snapshot,
      state,
      is_deleted: record.is_deleted,
      create_time: record.create_time,
      start_time: record.start_time,
      finish_time: record.finish_time,
    })
  }

  pub fn is_started(&self) -> bool {
    self.state != InstanceState::Created
  }

  pub fn is_finished(&self) -> bool {
    self.state == InstanceState::Finished
  }

  /// The unfolded execution tree payload.
  pub fn execution_data(&self) -> &serde_json::Value {
    &self.execution_snapshot.data.0
  }
}
