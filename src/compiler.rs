//! Compile a [GraphConfig] into an executable [Graph].
//!
//! The graph is an arena: it owns every node and edge, and cross references
//! are indices. Compilation validates the designated source/target and wires
//! each node's outgoing edge set by connecting every declared branch.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};

use crate::error::ConfigError;
use crate::graph_config::GraphConfig;
use crate::nodes::{Edge, Node, NodeKind};
use crate::subscribers::Subscribers;
use crate::types::Snapshot;

/// Compiled, executable graph. Reusable across runs.
#[derive(Debug)]
pub struct Graph {
  id: String,
  pub(crate) nodes: Vec<Node>,
  node_index: HashMap<String, usize>,
  pub(crate) edges: Vec<Edge>,
  edge_index: HashMap<String, usize>,
  pub(crate) source: usize,
  pub(crate) target: usize,
  pub(crate) subscribers: Subscribers,
}

impl Graph {
  /// Validates `config` and wires every node's edges.
  #[instrument(level = "trace", skip(config), fields(graph_id = %config.id()))]
  pub fn compile(config: GraphConfig) -> Result<Graph, ConfigError> {
    info!("compiling graph");
    let parts = config.into_parts();
    let source_id = parts.source_node_id.ok_or(ConfigError::MissingSource)?;
    let target_id = parts.target_node_id.ok_or(ConfigError::MissingTarget)?;

    let node_index: HashMap<String, usize> = parts
      .nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (n.id().to_string(), i))
      .collect();
    let edge_index: HashMap<String, usize> = parts
      .edges
      .iter()
      .enumerate()
      .map(|(i, e)| (e.id().to_string(), i))
      .collect();
    let source = *node_index
      .get(&source_id)
      .ok_or_else(|| ConfigError::UnknownNode(source_id.clone()))?;
    let target = *node_index
      .get(&target_id)
      .ok_or_else(|| ConfigError::UnknownNode(target_id.clone()))?;

    let mut graph = Graph {
      id: parts.id,
      nodes: parts.nodes,
      node_index,
      edges: parts.edges,
      edge_index,
      source,
      target,
      subscribers: Subscribers::new(),
    };
    for branch in &parts.branches {
      graph.connect(&branch.source, &branch.target, &branch.edge)?;
    }
    graph.warn_unwired_mappings();

    info!(
      node_count = graph.nodes.len(),
      edge_count = graph.edges.len(),
      branch_count = parts.branches.len(),
      "compilation complete"
    );
    Ok(graph)
  }

  /// Binds `edge_id` from `source_id` to `target_id` and adds it to the source's edge set.
  #[instrument(level = "trace", skip(self))]
  pub fn connect(
    &mut self,
    source_id: &str,
    target_id: &str,
    edge_id: &str,
  ) -> Result<(), ConfigError> {
    let source = self.node_position(source_id)?;
    let target = self.node_position(target_id)?;
    let edge = *self
      .edge_index
      .get(edge_id)
      .ok_or_else(|| ConfigError::UnknownEdge(edge_id.to_string()))?;
    if source == target {
      return Err(ConfigError::SelfLoop(source_id.to_string()));
    }
    if self.edges[edge].is_bound() {
      return Err(ConfigError::EdgeAlreadyBound(edge_id.to_string()));
    }
    self.nodes[source].add_edge(edge_id, edge)?;
    self.edges[edge].bind(source, target);
    debug!(source = source_id, target = target_id, edge = edge_id, "connected");
    Ok(())
  }

  fn node_position(&self, id: &str) -> Result<usize, ConfigError> {
    self
      .node_index
      .get(id)
      .copied()
      .ok_or_else(|| ConfigError::UnknownNode(id.to_string()))
  }

  /// Conditional mappings naming edges the node does not own can only dead-end.
  fn warn_unwired_mappings(&self) {
    for node in &self.nodes {
      if let NodeKind::Conditional { output_mapping } = node.kind() {
        for (token, edge_id) in output_mapping {
          if !node.edge_ids().any(|id| id == edge_id.as_str()) {
            warn!(
              node = node.id(),
              token = %token,
              edge = %edge_id,
              "conditional mapping references an edge not wired from this node"
            );
          }
        }
      }
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn source_node(&self) -> &Node {
    &self.nodes[self.source]
  }

  pub fn target_node(&self) -> &Node {
    &self.nodes[self.target]
  }

  pub fn node(&self, id: &str) -> Option<&Node> {
    self.node_index.get(id).map(|&i| &self.nodes[i])
  }

  pub fn edge(&self, id: &str) -> Option<&Edge> {
    self.edge_index.get(id).map(|&i| &self.edges[i])
  }

  /// Nodes in registration order.
  pub fn nodes(&self) -> impl Iterator<Item = &Node> {
    self.nodes.iter()
  }

  /// Registers an observer for every accepted state of subsequent emissions.
  pub fn subscribe<F>(&self, callback: F)
  where
    F: Fn(&Snapshot<'_>) + Send + Sync + 'static,
  {
    self.subscribers.subscribe(callback);
  }

  /// Shared handle to the subscriber list.
  pub fn subscribers(&self) -> Subscribers {
    self.subscribers.clone()
  }
}
