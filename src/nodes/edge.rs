//! Directed connection between two nodes, with an optional memory transform.

use std::fmt;
use std::sync::Arc;

use crate::error::RoutingError;
use crate::types::Memory;

/// Pure memory transform applied when an edge is traversed.
pub type Transform = Arc<dyn Fn(Memory) -> Memory + Send + Sync>;

/// A directed edge. Endpoints are arena indices set by [crate::Graph::connect].
#[derive(Clone)]
pub struct Edge {
  id: String,
  transform: Option<Transform>,
  source: Option<usize>,
  target: Option<usize>,
}

impl Edge {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      transform: None,
      source: None,
      target: None,
    }
  }

  pub fn with_transform<F>(id: impl Into<String>, transform: F) -> Self
  where
    F: Fn(Memory) -> Memory + Send + Sync + 'static,
  {
    Self {
      transform: Some(Arc::new(transform)),
      ..Self::new(id)
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn source(&self) -> Option<usize> {
    self.source
  }

  pub fn target(&self) -> Option<usize> {
    self.target
  }

  pub fn is_bound(&self) -> bool {
    self.source.is_some()
  }

  pub(crate) fn set_id(&mut self, id: impl Into<String>) {
    self.id = id.into();
  }

  pub(crate) fn bind(&mut self, source: usize, target: usize) {
    self.source = Some(source);
    self.target = Some(target);
  }

  /// Applies the transform and returns the target node index.
  pub fn call(&self, memory: Memory) -> Result<(Memory, usize), RoutingError> {
    let target = self
      .target
      .ok_or_else(|| RoutingError::UnboundEdge(self.id.clone()))?;
    let memory = match &self.transform {
      Some(transform) => transform(memory),
      None => memory,
    };
    Ok((memory, target))
  }
}

impl fmt::Debug for Edge {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Edge")
      .field("id", &self.id)
      .field("transform", &self.transform.is_some())
      .field("source", &self.source)
      .field("target", &self.target)
      .finish()
  }
}
