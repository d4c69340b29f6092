//! Pipework Config
//!
//! This crate contains the serializable pipeline tree types for Pipework.
//! A pipeline tree is the payload a user submits when authoring a template,
//! and the payload stored (content-addressed) in every snapshot.
//!
//! Trees can be loaded from:
//! - JSON files (via CLI with `pipework template create tree.json`)
//! - Snapshot rows (as JSON blobs)
//!
//! The validator takes these types, builds the graph arena from them and
//! proves the structure before anything is persisted.

mod component;
mod enums;
mod flow;
mod node;
mod tree;

pub use component::ComponentRef;
pub use enums::GatewayKind;
pub use flow::FlowDef;
pub use node::{ActivityDef, ActivityKind, ConditionDef, EventDef, GatewayDef};
pub use tree::PipelineTree;
