//! Graph vertices: plain, conditional, and bounded-loop nodes.
//!
//! A node owns its outgoing edge set (as arena indices wired by
//! [crate::Graph::compile]) and decides deterministically which edge to take
//! after its step runs.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::trace;

use crate::error::{ConfigError, EngineError};
use crate::types::{Delta, EMPTY_DELTA_STREAM, Memory, Step, StepOutput, Token};

/// How a node picks its outgoing edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
  /// Takes its first registered edge.
  Plain,
  /// Looks the step's token up in `output_mapping` (token -> edge id).
  Conditional {
    output_mapping: HashMap<String, String>,
  },
  /// Runs its step `iterations` times per visit, then advances like [NodeKind::Plain].
  Loop { iterations: NonZeroU32 },
}

/// Outgoing edge reference held by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EdgeRef {
  pub(crate) id: String,
  pub(crate) index: usize,
}

/// A graph vertex wrapping an optional step.
pub struct Node {
  id: String,
  step: Option<Arc<dyn Step>>,
  kind: NodeKind,
  edges: Vec<EdgeRef>,
}

/// Something a node visit produced.
#[derive(Debug)]
pub(crate) enum VisitEvent {
  /// An accepted state to publish.
  State(Memory),
  /// The visit is over.
  Done(VisitOutcome),
}

/// Final result of one node visit.
#[derive(Debug)]
pub(crate) struct VisitOutcome {
  pub(crate) memory: Memory,
  /// Arena index of the selected edge, if any.
  pub(crate) edge: Option<usize>,
  /// Last routing token seen (kept for dead-end reports).
  pub(crate) token: Option<Token>,
  /// Whether any [VisitEvent::State] was produced.
  pub(crate) emitted: bool,
}

impl Node {
  /// Node whose step returns memory unchanged.
  pub fn noop(id: impl Into<String>) -> Self {
    Self::with_kind(id, None, NodeKind::Plain)
  }

  pub fn new(id: impl Into<String>, step: Arc<dyn Step>) -> Self {
    Self::with_kind(id, Some(step), NodeKind::Plain)
  }

  /// Conditional node; `output_mapping` maps tokens to edge ids.
  pub fn conditional<K, V>(
    id: impl Into<String>,
    step: Arc<dyn Step>,
    output_mapping: impl IntoIterator<Item = (K, V)>,
  ) -> Self
  where
    K: Into<String>,
    V: Into<String>,
  {
    let output_mapping = output_mapping
      .into_iter()
      .map(|(k, v)| (k.into(), v.into()))
      .collect();
    Self::with_kind(id, Some(step), NodeKind::Conditional { output_mapping })
  }

  /// Loop node running `step` exactly `iterations` times per visit.
  pub fn looping(
    id: impl Into<String>,
    step: Arc<dyn Step>,
    iterations: u32,
  ) -> Result<Self, ConfigError> {
    let id = id.into();
    let iterations =
      NonZeroU32::new(iterations).ok_or_else(|| ConfigError::InvalidIterations(id.clone()))?;
    Ok(Self::with_kind(id, Some(step), NodeKind::Loop { iterations }))
  }

  fn with_kind(id: impl Into<String>, step: Option<Arc<dyn Step>>, kind: NodeKind) -> Self {
    Self {
      id: id.into(),
      step,
      kind,
      edges: Vec::new(),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn kind(&self) -> &NodeKind {
    &self.kind
  }

  pub fn is_noop(&self) -> bool {
    self.step.is_none()
  }

  /// Ids of the outgoing edges, in registration order.
  pub fn edge_ids(&self) -> impl Iterator<Item = &str> {
    self.edges.iter().map(|e| e.id.as_str())
  }

  pub(crate) fn set_id(&mut self, id: impl Into<String>) {
    self.id = id.into();
  }

  pub(crate) fn add_edge(&mut self, id: &str, index: usize) -> Result<(), ConfigError> {
    if self.edges.iter().any(|e| e.id == id) {
      return Err(ConfigError::EdgeAlreadyBound(id.to_string()));
    }
    self.edges.push(EdgeRef {
      id: id.to_string(),
      index,
    });
    Ok(())
  }

  fn repetitions(&self) -> u32 {
    match self.kind {
      NodeKind::Loop { iterations } => iterations.get(),
      _ => 1,
    }
  }

  /// Chooses the outgoing edge for the token the step ended with.
  ///
  /// Conditional nodes resolve explicit tokens through their mapping; a token
  /// that is unmapped, or mapped to an edge this node does not own, selects
  /// nothing. Every other case takes the first registered edge.
  pub(crate) fn select_edge(&self, token: Option<&Token>) -> Option<&EdgeRef> {
    match (&self.kind, token) {
      (NodeKind::Conditional { output_mapping }, Some(token)) if !token.is_advance() => {
        let edge_id = output_mapping.get(token.as_str())?;
        self.edges.iter().find(|e| &e.id == edge_id)
      }
      _ => self.edges.first(),
    }
  }

  /// Runs one visit, producing each accepted state and then the outcome.
  pub(crate) fn visit(
    &self,
    memory: Memory,
  ) -> impl Stream<Item = Result<VisitEvent, EngineError>> + '_ {
    try_stream! {
      let mut memory = memory;
      let mut token: Option<Token> = None;
      let mut emitted = false;
      if let Some(step) = &self.step {
        for iteration in 0..self.repetitions() {
          trace!(node = %self.id, iteration, "invoking step");
          let output = step
            .call(memory)
            .await
            .map_err(|e| EngineError::step(&self.id, e))?;
          let (next, routed) = match output {
            StepOutput::Continue(next) => {
              emitted = true;
              yield VisitEvent::State(next.clone());
              (next, None)
            }
            StepOutput::Route(next, routed) => {
              emitted = true;
              yield VisitEvent::State(next.clone());
              (next, Some(routed))
            }
            StepOutput::Stream(mut deltas) => {
              let mut last = None;
              while let Some(delta) = deltas.next().await {
                match delta.map_err(|e| EngineError::step(&self.id, e))? {
                  Delta::Replace(next) => {
                    emitted = true;
                    yield VisitEvent::State(next.clone());
                    last = Some((next, None));
                  }
                  Delta::Route(next, routed) => {
                    emitted = true;
                    yield VisitEvent::State(next.clone());
                    last = Some((next, Some(routed)));
                    break;
                  }
                }
              }
              last.ok_or_else(|| EngineError::step(&self.id, EMPTY_DELTA_STREAM.into()))?
            }
          };
          memory = next;
          token = routed;
        }
      }
      let edge = self.select_edge(token.as_ref()).map(|e| e.index);
      yield VisitEvent::Done(VisitOutcome {
        memory,
        edge,
        token,
        emitted,
      });
    }
  }

  /// Runs one visit to completion without publishing intermediate states.
  ///
  /// Returns the resulting memory and the id of the selected outgoing edge.
  pub async fn call(&self, memory: Memory) -> Result<(Memory, Option<&str>), EngineError> {
    let visit = self.visit(memory);
    futures::pin_mut!(visit);
    let mut memory = None;
    let mut edge = None;
    while let Some(event) = visit.next().await {
      if let VisitEvent::Done(outcome) = event? {
        edge = outcome
          .edge
          .and_then(|index| self.edges.iter().find(|e| e.index == index))
          .map(|e| e.id.as_str());
        memory = Some(outcome.memory);
      }
    }
    Ok((memory.unwrap_or_default(), edge))
  }
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Node")
      .field("id", &self.id)
      .field("kind", &self.kind)
      .field("noop", &self.step.is_none())
      .field("edges", &self.edges)
      .finish()
  }
}
