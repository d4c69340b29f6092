use std::sync::Arc;

use chrono::Utc;
use pipework_store::{InstanceRecord, Store};
use pipework_validator::{RootTemplate, validate_structure};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{ManagerError, or_already_exists, or_not_found};
use crate::ids::Ids;
use crate::model::{Instance, InstanceState};
use crate::new_id;
use crate::unfold::unfold_subprocesses;

/// Optional settings for [`InstanceManager::create`].
#[derive(Debug, Clone, Default)]
pub struct InstanceOverrides {
  pub name: Option<String>,
  /// Execute this tree instead of the template's definition.
  pub exec_data: Option<Value>,
  pub instance_id: Option<String>,
}

/// Creates instances from templates and records their lifecycle.
pub struct InstanceManager<S: ?Sized> {
  store: Arc<S>,
}

impl<S: Store + ?Sized> InstanceManager<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Instantiate a template.
  ///
  /// The instance keeps the template's current definition snapshot and gets
  /// an execution snapshot with every sub-process unfolded and the tree id
  /// set to the instance id.
  #[instrument(skip(self, overrides), fields(instance_id))]
  pub async fn create(
    &self,
    template_id: &str,
    creator: &str,
    overrides: InstanceOverrides,
  ) -> Result<Instance, ManagerError> {
    let template = self
      .store
      .get_template(template_id)
      .await
      .map_err(or_not_found("template", template_id))?;
    if template.is_deleted {
      return Err(ManagerError::not_found("template", template_id));
    }
    let snapshot = self.store.get_snapshot(template.snapshot_id).await?;

    let mut exec_data = match overrides.exec_data {
      Some(data) => {
        validate_structure(&data)?;
        data
      }
      None => snapshot.data.0.clone(),
    };

    let instance_id = overrides.instance_id.unwrap_or_else(new_id);
    tracing::Span::current().record("instance_id", instance_id.as_str());

    let root = RootTemplate::existing(template.template_id.clone(), template.name.clone());
    let execution_snapshot = self
      .store_execution(&instance_id, &mut exec_data, &root)
      .await?;

    let now = Utc::now();
    let record = InstanceRecord {
      instance_id,
      name: overrides
        .name
        .unwrap_or_else(|| format!("{}_{}", template.name, now.format("%Y%m%d%H%M%S"))),
      creator: creator.to_string(),
      template_id: Some(template.template_id.clone()),
      snapshot_id: snapshot.id,
      execution_snapshot_id: execution_snapshot.id,
      is_started: false,
      is_finished: false,
      is_deleted: false,
      create_time: now,
      start_time: None,
      finish_time: None,
    };
    self
      .store
      .insert_instance(&record)
      .await
      .map_err(or_already_exists("instance", &record.instance_id))?;

    info!(execution_snapshot_id = execution_snapshot.id, "instance created");
    Instance::from_record(
      record,
      Some(template.template_id),
      snapshot,
      execution_snapshot,
    )
  }

  /// Move an instance from created to started, stamping its start time.
  ///
  /// Deletion does not block the transition; the runtime may still be
  /// driving a deleted instance.
  #[instrument(skip(self))]
  pub async fn set_started(&self, instance_id: &str) -> Result<Instance, ManagerError> {
    let record = self.record(instance_id).await?;
    if InstanceState::of(&record)? != InstanceState::Created {
      return Err(ManagerError::AlreadyStarted {
        instance_id: instance_id.to_string(),
      });
    }

    let at = Utc::now().max(record.create_time);
    if !self.store.mark_instance_started(instance_id, at).await? {
      // Lost a race with another caller
      return Err(ManagerError::AlreadyStarted {
        instance_id: instance_id.to_string(),
      });
    }

    info!("instance started");
    let record = self.record(instance_id).await?;
    self.load(record).await
  }

  /// Move a started instance to finished, stamping its finish time.
  #[instrument(skip(self))]
  pub async fn set_finished(&self, instance_id: &str) -> Result<Instance, ManagerError> {
    let record = self.record(instance_id).await?;
    match InstanceState::of(&record)? {
      InstanceState::Created => {
        return Err(ManagerError::NotStarted {
          instance_id: instance_id.to_string(),
        });
      }
      InstanceState::Finished => {
        return Err(ManagerError::AlreadyFinished {
          instance_id: instance_id.to_string(),
        });
      }
      InstanceState::Started => {}
    }

    let at = Utc::now().max(record.start_time.unwrap_or(record.create_time));
    if !self.store.mark_instance_finished(instance_id, at).await? {
      return Err(ManagerError::AlreadyFinished {
        instance_id: instance_id.to_string(),
      });
    }

    info!("instance finished");
    let record = self.record(instance_id).await?;
    self.load(record).await
  }

  /// Soft delete one or many instances. Already deleted or unknown ids are
  /// ignored. Returns how many instances were deleted by this call.
  #[instrument(skip_all)]
  pub async fn delete(&self, ids: impl Into<Ids>) -> Result<u64, ManagerError> {
    let ids = ids.into().into_vec();
    let deleted = self.store.soft_delete_instances(&ids).await?;
    info!(requested = ids.len(), deleted, "instances deleted");
    Ok(deleted)
  }

  pub async fn get(&self, instance_id: &str) -> Result<Instance, ManagerError> {
    let record = self.live_record(instance_id).await?;
    self.load(record).await
  }

  /// Live instances, optionally only those created from one template.
  pub async fn list(&self, template_id: Option<&str>) -> Result<Vec<Instance>, ManagerError> {
    let mut instances = Vec::new();
    for record in self.store.list_instances(template_id).await? {
      instances.push(self.load(record).await?);
    }
    Ok(instances)
  }

  /// Replace the tree an instance will execute. Refused once it has started.
  #[instrument(skip(self, payload))]
  pub async fn replace_execution_data(
    &self,
    instance_id: &str,
    payload: &Value,
  ) -> Result<Instance, ManagerError> {
    let record = self.live_record(instance_id).await?;
    if InstanceState::of(&record)? != InstanceState::Created {
      return Err(ManagerError::AlreadyStarted {
        instance_id: instance_id.to_string(),
      });
    }

    validate_structure(payload)?;
    let mut exec_data = payload.clone();
    let root = self.root_of(&record).await?;
    let execution_snapshot = self
      .store_execution(instance_id, &mut exec_data, &root)
      .await?;

    if !self
      .store
      .update_execution_snapshot(instance_id, execution_snapshot.id)
      .await?
    {
      return Err(ManagerError::AlreadyStarted {
        instance_id: instance_id.to_string(),
      });
    }

    info!(execution_snapshot_id = execution_snapshot.id, "execution data replaced");
    self.get(instance_id).await
  }

  async fn store_execution(
    &self,
    instance_id: &str,
    exec_data: &mut Value,
    root: &RootTemplate,
  ) -> Result<pipework_store::Snapshot, ManagerError> {
    unfold_subprocesses(self.store.as_ref(), exec_data, root).await?;
    if let Some(fields) = exec_data.as_object_mut() {
      fields.insert("id".to_string(), Value::String(instance_id.to_string()));
    }

    let (snapshot, _) = self.store.create_or_get_snapshot(exec_data).await?;
    Ok(snapshot)
  }

  /// The template an instance was created from, for tracing reference
  /// cycles. Falls back to an anonymous root when that row is gone.
  async fn root_of(&self, record: &InstanceRecord) -> Result<RootTemplate, ManagerError> {
    let Some(template_id) = &record.template_id else {
      return Ok(RootTemplate::New);
    };
    match self.store.get_template(template_id).await {
      Ok(template) => Ok(RootTemplate::existing(template.template_id, template.name)),
      Err(pipework_store::Error::NotFound(_)) => Ok(RootTemplate::New),
      Err(e) => Err(e.into()),
    }
  }

  /// The stored row, deleted or not.
  async fn record(&self, instance_id: &str) -> Result<InstanceRecord, ManagerError> {
    self
      .store
      .get_instance(instance_id)
      .await
      .map_err(or_not_found("instance", instance_id))
  }

  async fn live_record(&self, instance_id: &str) -> Result<InstanceRecord, ManagerError> {
    let record = self.record(instance_id).await?;
    if record.is_deleted {
      return Err(ManagerError::not_found("instance", instance_id));
    }
    Ok(record)
  }

  async fn load(&self, record: InstanceRecord) -> Result<Instance, ManagerError> {
    let snapshot = self.store.get_snapshot(record.snapshot_id).await?;
    let execution_snapshot = self
      .store
      .get_snapshot(record.execution_snapshot_id)
      .await?;

    let template = match &record.template_id {
      Some(template_id) => match self.store.get_template(template_id).await {
        Ok(_) => Some(template_id.clone()),
        Err(pipework_store::Error::NotFound(_)) => {
          warn!(instance_id = %record.instance_id, template_id = %template_id, "instance template row is gone");
          None
        }
        Err(e) => return Err(e.into()),
      },
      None => None,
    };

    Instance::from_record(record, template, snapshot, execution_snapshot)
  }
}
