use std::sync::Arc;

use chrono::Utc;
use pipework_store::{Json, SchemeRecord, Store, TemplateRecord};
use pipework_validator::{RootTemplate, validate};
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::{ManagerError, or_already_exists, or_not_found};
use crate::ids::Ids;
use crate::model::Template;
use crate::new_id;
use crate::source::StoreTemplateSource;

/// Creates, edits and deletes pipeline templates.
pub struct TemplateManager<S: ?Sized> {
  store: Arc<S>,
}

impl<S: Store + ?Sized> TemplateManager<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Validate `payload` and store it as a new template.
  ///
  /// Nothing is written if validation fails.
  #[instrument(skip(self, payload), fields(template_id))]
  pub async fn create(
    &self,
    payload: &Value,
    creator: &str,
    name: &str,
    template_id: Option<String>,
  ) -> Result<Template, ManagerError> {
    let source = StoreTemplateSource::new(self.store.as_ref());
    validate(payload, &RootTemplate::New, &source).await?;

    let template_id = template_id.unwrap_or_else(new_id);
    tracing::Span::current().record("template_id", template_id.as_str());

    let (snapshot, created) = self.store.create_or_get_snapshot(payload).await?;
    let now = Utc::now();
    let record = TemplateRecord {
      template_id,
      name: name.to_string(),
      creator: creator.to_string(),
      editor: None,
      create_time: now,
      edit_time: now,
      snapshot_id: snapshot.id,
      is_deleted: false,
    };
    self
      .store
      .insert_template(&record)
      .await
      .map_err(or_already_exists("template", &record.template_id))?;

    info!(snapshot_id = snapshot.id, new_snapshot = created, "template created");
    Ok(Template::from_record(record, snapshot))
  }

  /// Validate `payload` against the template's own identity and make it the
  /// template's definition.
  #[instrument(skip(self, payload, name))]
  pub async fn update(
    &self,
    template_id: &str,
    payload: &Value,
    editor: &str,
    name: Option<&str>,
  ) -> Result<Template, ManagerError> {
    let current = self.live_record(template_id).await?;

    let source = StoreTemplateSource::new(self.store.as_ref());
    let root = RootTemplate::existing(&current.template_id, &current.name);
    validate(payload, &root, &source).await?;

    let (snapshot, created) = self.store.create_or_get_snapshot(payload).await?;
    let name = name.unwrap_or(&current.name).to_string();
    let edit_time = Utc::now().max(current.edit_time);

    self
      .store
      .update_template(template_id, &name, editor, edit_time, snapshot.id)
      .await
      .map_err(or_not_found("template", template_id))?;

    info!(snapshot_id = snapshot.id, new_snapshot = created, "template updated");
    let record = TemplateRecord {
      name,
      editor: Some(editor.to_string()),
      edit_time,
      snapshot_id: snapshot.id,
      ..current
    };
    Ok(Template::from_record(record, snapshot))
  }

  /// Soft delete one or many templates. Already deleted or unknown ids are
  /// ignored. Returns how many templates were deleted by this call.
  #[instrument(skip_all)]
  pub async fn delete(&self, ids: impl Into<Ids>) -> Result<u64, ManagerError> {
    let ids = ids.into().into_vec();
    let deleted = self.store.soft_delete_templates(&ids).await?;
    info!(requested = ids.len(), deleted, "templates deleted");
    Ok(deleted)
  }

  pub async fn get(&self, template_id: &str) -> Result<Template, ManagerError> {
    let record = self.live_record(template_id).await?;
    let snapshot = self.store.get_snapshot(record.snapshot_id).await?;
    Ok(Template::from_record(record, snapshot))
  }

  pub async fn list(&self) -> Result<Vec<Template>, ManagerError> {
    let mut templates = Vec::new();
    for record in self.store.list_templates().await? {
      let snapshot = self.store.get_snapshot(record.snapshot_id).await?;
      templates.push(Template::from_record(record, snapshot));
    }
    Ok(templates)
  }

  /// Save a named node selection for a template, replacing any scheme of the
  /// same name.
  #[instrument(skip(self, node_ids))]
  pub async fn save_scheme(
    &self,
    template_id: &str,
    name: &str,
    node_ids: Vec<String>,
  ) -> Result<SchemeRecord, ManagerError> {
    self.live_record(template_id).await?;

    let scheme = SchemeRecord {
      unique_id: format!("{template_id}-{name}"),
      template_id: template_id.to_string(),
      name: name.to_string(),
      data: Json(Value::from(node_ids)),
      edit_time: Utc::now(),
    };
    self.store.upsert_scheme(&scheme).await?;

    info!(unique_id = %scheme.unique_id, "template scheme saved");
    Ok(scheme)
  }

  pub async fn list_schemes(&self, template_id: &str) -> Result<Vec<SchemeRecord>, ManagerError> {
    Ok(self.store.list_schemes(template_id).await?)
  }

  async fn live_record(&self, template_id: &str) -> Result<TemplateRecord, ManagerError> {
    let record = self
      .store
      .get_template(template_id)
      .await
      .map_err(or_not_found("template", template_id))?;

    if record.is_deleted {
      return Err(ManagerError::not_found("template", template_id));
    }
    Ok(record)
  }
}
