//! Pipework Manager
//!
//! Lifecycle of pipeline templates and the instances created from them.
//!
//! A template is a validated pipeline tree stored as a snapshot. Creating an
//! instance copies the template's current snapshot, inlines every
//! sub-process it references ("unfolding") and stores the result as the
//! instance's execution snapshot. The runtime then moves the instance through
//! `created -> started -> finished`.

mod error;
mod ids;
mod instance;
mod model;
mod source;
mod template;
mod unfold;

pub use error::{ErrorCategory, ManagerError};
pub use ids::Ids;
pub use instance::{InstanceManager, InstanceOverrides};
pub use model::{Instance, InstanceState, Template};
pub use source::StoreTemplateSource;
pub use template::TemplateManager;
pub use unfold::unfold_subprocesses;

/// A fresh external id: 32 lowercase hex characters.
pub(crate) fn new_id() -> String {
  uuid::Uuid::new_v4().simple().to_string()
}
