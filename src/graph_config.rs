//! Declarative graph builder enforcing referential integrity.
//!
//! Nodes, edges and branches are registered incrementally; [crate::Graph::compile]
//! freezes the result into an executable graph.

use std::collections::HashMap;

use tracing::instrument;

use crate::error::ConfigError;
use crate::nodes::{Edge, Node, NodeKind};
use crate::types::Token;

/// A declared connection: traversing `edge` leads from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
  pub source: String,
  pub target: String,
  pub edge: String,
}

/// Owned pieces of a config handed to the compiler.
pub(crate) struct ConfigParts {
  pub(crate) id: String,
  pub(crate) nodes: Vec<Node>,
  pub(crate) edges: Vec<Edge>,
  pub(crate) branches: Vec<Branch>,
  pub(crate) source_node_id: Option<String>,
  pub(crate) target_node_id: Option<String>,
}

/// Graph declaration prior to compilation.
#[derive(Debug)]
pub struct GraphConfig {
  id: String,
  nodes: Vec<Node>,
  node_index: HashMap<String, usize>,
  edges: Vec<Edge>,
  edge_index: HashMap<String, usize>,
  branches: Vec<Branch>,
  source_node_id: Option<String>,
  target_node_id: Option<String>,
}

impl GraphConfig {
  /// Empty config with a random id.
  pub fn new() -> Self {
    Self::with_id(uuid::Uuid::new_v4().to_string())
  }

  pub fn with_id(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      nodes: Vec::new(),
      node_index: HashMap::new(),
      edges: Vec::new(),
      edge_index: HashMap::new(),
      branches: Vec::new(),
      source_node_id: None,
      target_node_id: None,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Registers `node` under `id`.
  ///
  /// A conditional node may not map `next` or `continue`: those tokens always
  /// take the node's first edge.
  #[instrument(level = "trace", skip(self, node))]
  pub fn add_node(&mut self, id: &str, mut node: Node) -> Result<(), ConfigError> {
    if self.node_index.contains_key(id) {
      return Err(ConfigError::DuplicateNode(id.to_string()));
    }
    if let NodeKind::Conditional { output_mapping } = node.kind()
      && let Some(key) = output_mapping
        .keys()
        .find(|key| Token::from(key.as_str()).is_advance())
    {
      return Err(ConfigError::ReservedId(key.clone()));
    }
    node.set_id(id);
    self.insert_node(node);
    Ok(())
  }

  /// Registers `source` and `target` as the designated endpoints of an empty config.
  pub(crate) fn with_endpoints(mut self, source: Node, target: Node) -> Self {
    debug_assert!(self.nodes.is_empty());
    self.source_node_id = Some(source.id().to_string());
    self.target_node_id = Some(target.id().to_string());
    self.insert_node(source);
    self.insert_node(target);
    self
  }

  fn insert_node(&mut self, node: Node) {
    self.node_index.insert(node.id().to_string(), self.nodes.len());
    self.nodes.push(node);
  }

  /// Registers `edge` under `id`.
  #[instrument(level = "trace", skip(self, edge))]
  pub fn add_edge(&mut self, id: &str, mut edge: Edge) -> Result<(), ConfigError> {
    if self.edge_index.contains_key(id) {
      return Err(ConfigError::DuplicateEdge(id.to_string()));
    }
    edge.set_id(id);
    self.edge_index.insert(id.to_string(), self.edges.len());
    self.edges.push(edge);
    Ok(())
  }

  /// Declares that `edge_id` leads from `source_id` to `target_id`.
  #[instrument(level = "trace", skip(self))]
  pub fn add_branch(
    &mut self,
    source_id: &str,
    target_id: &str,
    edge_id: &str,
  ) -> Result<(), ConfigError> {
    self.require_node(source_id)?;
    self.require_node(target_id)?;
    if !self.edge_index.contains_key(edge_id) {
      return Err(ConfigError::UnknownEdge(edge_id.to_string()));
    }
    if self.branch(source_id, target_id).is_some() {
      return Err(ConfigError::DuplicateBranch {
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
      });
    }
    if self.branches.iter().any(|b| b.edge == edge_id) {
      return Err(ConfigError::EdgeAlreadyBound(edge_id.to_string()));
    }
    self.branches.push(Branch {
      source: source_id.to_string(),
      target: target_id.to_string(),
      edge: edge_id.to_string(),
    });
    Ok(())
  }

  pub fn set_source_node(&mut self, id: &str) -> Result<(), ConfigError> {
    self.require_node(id)?;
    self.source_node_id = Some(id.to_string());
    Ok(())
  }

  pub fn set_target_node(&mut self, id: &str) -> Result<(), ConfigError> {
    self.require_node(id)?;
    self.target_node_id = Some(id.to_string());
    Ok(())
  }

  pub fn source_node_id(&self) -> Option<&str> {
    self.source_node_id.as_deref()
  }

  pub fn target_node_id(&self) -> Option<&str> {
    self.target_node_id.as_deref()
  }

  pub fn node(&self, id: &str) -> Option<&Node> {
    self.node_index.get(id).map(|&i| &self.nodes[i])
  }

  pub fn edge(&self, id: &str) -> Option<&Edge> {
    self.edge_index.get(id).map(|&i| &self.edges[i])
  }

  pub fn contains_node(&self, id: &str) -> bool {
    self.node_index.contains_key(id)
  }

  pub fn contains_edge(&self, id: &str) -> bool {
    self.edge_index.contains_key(id)
  }

  /// Edge id of the branch between `source_id` and `target_id`, if declared.
  pub fn branch(&self, source_id: &str, target_id: &str) -> Option<&str> {
    self
      .branches
      .iter()
      .find(|b| b.source == source_id && b.target == target_id)
      .map(|b| b.edge.as_str())
  }

  /// Declared branches in insertion order.
  pub fn branches(&self) -> &[Branch] {
    &self.branches
  }

  pub(crate) fn into_parts(self) -> ConfigParts {
    ConfigParts {
      id: self.id,
      nodes: self.nodes,
      edges: self.edges,
      branches: self.branches,
      source_node_id: self.source_node_id,
      target_node_id: self.target_node_id,
    }
  }

  fn require_node(&self, id: &str) -> Result<(), ConfigError> {
    if self.node_index.contains_key(id) {
      Ok(())
    } else {
      Err(ConfigError::UnknownNode(id.to_string()))
    }
  }
}

impl Default for GraphConfig {
  fn default() -> Self {
    Self::new()
  }
}
