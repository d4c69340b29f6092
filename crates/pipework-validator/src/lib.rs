//! Pipework Validator
//!
//! Structural checks that must pass before a pipeline tree is accepted:
//!
//! 1. Sub-process references must not form a cycle (a template may not,
//!    directly or through other templates, embed itself)
//! 2. Every diverging gateway must be closed by exactly one converge gateway
//!    that receives all of its branches
//!
//! Validation never writes anything; a failure leaves no trace behind.

mod converge;
mod error;
mod reference;
mod source;
mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use converge::{ConvergeMatches, validate_converge_gateways};
pub use error::{BoxError, ErrorReport, ValidateError};
pub use reference::{ReferenceGraph, check_subprocess_references};
pub use source::{NEW_TEMPLATE_ID, NEW_TEMPLATE_NAME, RootTemplate, SourceTemplate, TemplateSource};
pub use validate::{Validated, validate, validate_structure};
