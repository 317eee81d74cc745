//! Graph vertices and edges.

mod edge;
#[cfg(test)]
mod edge_test;
mod node;

pub use edge::{Edge, Transform};
pub use node::{Node, NodeKind};
pub(crate) use node::VisitEvent;
