use pipework_validator::{ErrorReport, ValidateError};
use thiserror::Error;

/// Errors returned by the template and instance managers.
#[derive(Debug, Error)]
pub enum ManagerError {
  /// The submitted definition failed structural validation.
  #[error("validation failed: {0}")]
  Validation(#[from] ValidateError),

  #[error("instance {instance_id} has already started")]
  AlreadyStarted { instance_id: String },

  #[error("instance {instance_id} has already finished")]
  AlreadyFinished { instance_id: String },

  #[error("instance {instance_id} has not started")]
  NotStarted { instance_id: String },

  #[error("{kind} {id} not found")]
  NotFound { kind: &'static str, id: String },

  /// A caller-supplied id is already taken, deleted rows included.
  #[error("{kind} {id} already exists")]
  AlreadyExists { kind: &'static str, id: String },

  /// A stored instance is finished without ever having started.
  #[error("instance {instance_id} is finished but was never started")]
  CorruptState { instance_id: String },

  #[error("storage error: {0}")]
  Store(#[from] pipework_store::Error),
}

/// Coarse classification callers map onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
  Validation,
  StateConflict,
  NotFound,
  Storage,
}

impl ManagerError {
  pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
    Self::NotFound {
      kind,
      id: id.into(),
    }
  }

  pub fn category(&self) -> ErrorCategory {
    match self {
      Self::Validation(ValidateError::Lookup { .. }) => ErrorCategory::Storage,
      Self::Validation(_) => ErrorCategory::Validation,
      Self::AlreadyStarted { .. }
      | Self::AlreadyFinished { .. }
      | Self::NotStarted { .. }
      | Self::CorruptState { .. }
      | Self::AlreadyExists { .. } => ErrorCategory::StateConflict,
      Self::NotFound { .. } => ErrorCategory::NotFound,
      Self::Store(_) => ErrorCategory::Storage,
    }
  }

  /// Field-level report for validation failures.
  pub fn report(&self) -> Option<ErrorReport> {
    match self {
      Self::Validation(e) => Some(e.report()),
      _ => None,
    }
  }
}

/// Map a store `NotFound` onto the manager's own variant.
pub(crate) fn or_not_found(
  kind: &'static str,
  id: &str,
) -> impl FnOnce(pipework_store::Error) -> ManagerError {
  move |err| match err {
    pipework_store::Error::NotFound(_) => ManagerError::not_found(kind, id),
    other => ManagerError::Store(other),
  }
}

/// Map a store `Conflict` from inserting `id` onto `AlreadyExists`.
pub(crate) fn or_already_exists(
  kind: &'static str,
  id: &str,
) -> impl FnOnce(pipework_store::Error) -> ManagerError {
  move |err| match err {
    pipework_store::Error::Conflict(_) => ManagerError::AlreadyExists {
      kind,
      id: id.to_string(),
    },
    other => ManagerError::Store(other),
  }
}
