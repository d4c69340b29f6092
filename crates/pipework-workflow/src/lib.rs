//! Pipework Workflow
//!
//! This crate provides the graph model for Pipework: an arena of nodes and
//! sequence flows built from a [`pipework_config::PipelineTree`].
//!
//! Key points:
//! - Nodes and flows are owned by the [`Graph`]; flows refer to their
//!   endpoints by node id, never by owning handle
//! - Every node carries ordered `incoming` and `outgoing` [`FlowCollection`]s
//! - Removing a node detaches every flow touching it, so no collection is
//!   left pointing at a node that no longer exists

mod error;
mod flow;
mod graph;
mod node;

pub use error::GraphError;
pub use flow::{Flow, FlowCollection};
pub use graph::Graph;
pub use node::{Node, NodeKind};
