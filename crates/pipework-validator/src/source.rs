use async_trait::async_trait;
use pipework_config::PipelineTree;

use crate::error::BoxError;

/// Id of the reference-graph root while a template is being created.
pub const NEW_TEMPLATE_ID: &str = "__pipework_root__";

/// Display name of the reference-graph root while a template is being created.
pub const NEW_TEMPLATE_NAME: &str = "<new template>";

/// A template loaded to follow its sub-process references.
#[derive(Debug, Clone)]
pub struct SourceTemplate {
  pub template_id: String,
  pub name: String,
  pub tree: PipelineTree,
}

/// Where referenced templates are loaded from.
#[async_trait]
pub trait TemplateSource: Send + Sync {
  /// Load a template by id. Returns `None` if the template is unknown.
  async fn load_template(&self, template_id: &str) -> Result<Option<SourceTemplate>, BoxError>;
}

/// The template being validated, as it appears in the reference graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootTemplate {
  /// A template that does not exist yet.
  New,
  /// An existing template being updated.
  Existing { template_id: String, name: String },
}

impl RootTemplate {
  pub fn existing(template_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self::Existing {
      template_id: template_id.into(),
      name: name.into(),
    }
  }

  pub fn id(&self) -> &str {
    match self {
      Self::New => NEW_TEMPLATE_ID,
      Self::Existing { template_id, .. } => template_id,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::New => NEW_TEMPLATE_NAME,
      Self::Existing { name, .. } => name,
    }
  }
}
