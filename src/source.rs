//! Convenience builder over [GraphConfig] with fixed entry and exit nodes.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::instrument;

use crate::compiler::Graph;
use crate::error::ConfigError;
use crate::graph_config::GraphConfig;
use crate::nodes::{Edge, Node};
use crate::types::{Memory, Step};

/// A [GraphConfig] with no-op `start` and `end` nodes already designated as
/// source and target.
///
/// Edges created through [Source::add_step] are named `"{from}:{to}"`, which is
/// also the id [Source::add_condition] expects for each mapped target.
#[derive(Debug)]
pub struct Source {
  config: GraphConfig,
}

impl Source {
  pub const START: &'static str = "start";
  pub const END: &'static str = "end";

  pub fn new() -> Self {
    Self::from_config(GraphConfig::new())
  }

  pub fn with_id(id: impl Into<String>) -> Self {
    Self::from_config(GraphConfig::with_id(id))
  }

  fn from_config(config: GraphConfig) -> Self {
    Self {
      config: config.with_endpoints(Node::noop(Self::START), Node::noop(Self::END)),
    }
  }

  /// Adds a plain node running `step`.
  pub fn add_function(&mut self, id: &str, step: Arc<dyn Step>) -> Result<(), ConfigError> {
    self.config.add_node(id, Node::new(id, step))
  }

  pub fn add_noop(&mut self, id: &str) -> Result<(), ConfigError> {
    self.config.add_node(id, Node::noop(id))
  }

  /// Adds a conditional node routing each token to the named target node.
  ///
  /// The matching edges still have to be created with [Source::add_step].
  pub fn add_condition<K, V>(
    &mut self,
    id: &str,
    step: Arc<dyn Step>,
    targets: impl IntoIterator<Item = (K, V)>,
  ) -> Result<(), ConfigError>
  where
    K: Into<String>,
    V: AsRef<str>,
  {
    let mapping = targets
      .into_iter()
      .map(|(token, target)| (token.into(), edge_id(id, target.as_ref())))
      .collect::<Vec<_>>();
    self
      .config
      .add_node(id, Node::conditional(id, step, mapping))
  }

  /// Adds a loop node running `step` `iterations` times per visit.
  pub fn add_loop(
    &mut self,
    id: &str,
    step: Arc<dyn Step>,
    iterations: u32,
  ) -> Result<(), ConfigError> {
    self.config.add_node(id, Node::looping(id, step, iterations)?)
  }

  /// Connects `from` to `to` through a new edge `"{from}:{to}"`.
  #[instrument(level = "trace", skip(self))]
  pub fn add_step(&mut self, from: &str, to: &str) -> Result<(), ConfigError> {
    self.add_edge_between(from, to, Edge::new(edge_id(from, to)))
  }

  /// Like [Source::add_step], transforming memory on traversal.
  #[instrument(level = "trace", skip(self, transform))]
  pub fn add_step_with<F>(&mut self, from: &str, to: &str, transform: F) -> Result<(), ConfigError>
  where
    F: Fn(Memory) -> Memory + Send + Sync + 'static,
  {
    self.add_edge_between(from, to, Edge::with_transform(edge_id(from, to), transform))
  }

  fn add_edge_between(&mut self, from: &str, to: &str, edge: Edge) -> Result<(), ConfigError> {
    for node in [from, to] {
      if !self.config.contains_node(node) {
        return Err(ConfigError::UnknownNode(node.to_string()));
      }
    }
    let id = edge.id().to_string();
    self.config.add_edge(&id, edge)?;
    self.config.add_branch(from, to, &id)
  }

  pub fn compile(self) -> Result<Graph, ConfigError> {
    Graph::compile(self.config)
  }

  pub fn into_config(self) -> GraphConfig {
    self.config
  }
}

fn edge_id(from: &str, to: &str) -> String {
  format!("{from}:{to}")
}

impl Default for Source {
  fn default() -> Self {
    Self::new()
  }
}

impl Deref for Source {
  type Target = GraphConfig;

  fn deref(&self) -> &GraphConfig {
    &self.config
  }
}

impl DerefMut for Source {
  fn deref_mut(&mut self) -> &mut GraphConfig {
    &mut self.config
  }
}
