mod catalog;
mod descriptor;
mod error;
mod global;
mod registry;

pub use catalog::{CatalogOutcome, ComponentCatalog};
pub use descriptor::ComponentDescriptor;
pub use error::RegistryError;
pub use global::{global, init, reset};
pub use registry::{ComponentRegistry, Registration};
