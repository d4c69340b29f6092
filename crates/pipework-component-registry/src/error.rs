use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("invalid component descriptor: {0}")]
  InvalidDescriptor(String),

  #[error("unknown component: {code}")]
  UnknownComponent { code: String },

  #[error("the global component registry is already initialized")]
  AlreadyInitialized,

  #[error("component catalog error: {0}")]
  Catalog(#[from] pipework_store::Error),
}
