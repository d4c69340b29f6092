use async_trait::async_trait;
use pipework_config::PipelineTree;
use pipework_store::Store;
use pipework_validator::{BoxError, SourceTemplate, TemplateSource};

/// Loads referenced templates from a [`Store`] for validation.
///
/// Deleted templates are invisible: a reference to one is reported as an
/// unknown sub-process.
pub struct StoreTemplateSource<'a, S: ?Sized> {
  store: &'a S,
}

impl<'a, S: Store + ?Sized> StoreTemplateSource<'a, S> {
  pub fn new(store: &'a S) -> Self {
    Self { store }
  }
}

#[async_trait]
impl<S: Store + ?Sized> TemplateSource for StoreTemplateSource<'_, S> {
  async fn load_template(&self, template_id: &str) -> Result<Option<SourceTemplate>, BoxError> {
    let template = match self.store.get_template(template_id).await {
      Ok(template) if !template.is_deleted => template,
      Ok(_) | Err(pipework_store::Error::NotFound(_)) => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let snapshot = self.store.get_snapshot(template.snapshot_id).await?;
    let tree = PipelineTree::from_value(&snapshot.data.0)?;

    Ok(Some(SourceTemplate {
      template_id: template.template_id,
      name: template.name,
      tree,
    }))
  }
}
