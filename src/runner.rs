//! Edge-routed traversal of a compiled [Graph].
//!
//! - [Graph::stream_with]: lazy stream of every accepted state.
//! - [Graph::run_with]: drains the stream and returns the terminal state.
//! - [Graph::run_blocking]: the same on the current thread.

use async_stream::try_stream;
use futures::{Stream, StreamExt, pin_mut};
use tracing::{debug, info, trace};

use crate::compiler::Graph;
use crate::error::{EngineError, RoutingError};
use crate::nodes::VisitEvent;
use crate::types::{Budget, Memory, RunOptions, Snapshot, block_on};

impl Graph {
  /// Runs from the source to the target node with no budget.
  pub async fn run(&self, memory: Memory) -> Result<Memory, EngineError> {
    self.run_with(memory, RunOptions::default()).await
  }

  /// Runs to completion, returning the state the target node produced.
  pub async fn run_with(&self, memory: Memory, options: RunOptions) -> Result<Memory, EngineError> {
    let states = self.stream_with(memory.clone(), options);
    pin_mut!(states);
    let mut last = memory;
    while let Some(state) = states.next().await {
      last = state?;
    }
    Ok(last)
  }

  /// Runs to completion on a private current-thread runtime.
  ///
  /// Must not be called from inside an async context.
  pub fn run_blocking(&self, memory: Memory, options: RunOptions) -> Result<Memory, EngineError> {
    block_on(self.run_with(memory, options))?
  }

  pub fn stream(&self, memory: Memory) -> impl Stream<Item = Result<Memory, EngineError>> + '_ {
    self.stream_with(memory, RunOptions::default())
  }

  /// Yields each accepted state in production order after notifying subscribers.
  ///
  /// The target node's final state is always yielded, even when it is a no-op.
  /// The stream ends after the target node or on the first error.
  pub fn stream_with(
    &self,
    memory: Memory,
    options: RunOptions,
  ) -> impl Stream<Item = Result<Memory, EngineError>> + '_ {
    let subscribers = self.subscribers.clone();
    try_stream! {
      let mut budget = Budget::new(options);
      let mut memory = memory;
      let mut current = self.source;
      let mut seq = 0usize;
      loop {
        budget.charge()?;
        let node = &self.nodes[current];
        debug!(graph_id = %self.id(), node = node.id(), step = budget.steps(), "executing node");

        let mut outcome = None;
        let visit = node.visit(memory);
        pin_mut!(visit);
        while let Some(event) = visit.next().await {
          match event? {
            VisitEvent::State(state) => {
              seq += 1;
              subscribers.notify(&Snapshot { seq, origin: node.id(), memory: &state });
              yield state;
            }
            VisitEvent::Done(done) => outcome = Some(done),
          }
        }
        let done = match outcome {
          Some(done) => done,
          None => Err(RoutingError::DeadEnd { node: node.id().to_string(), token: None })?,
        };
        memory = done.memory;

        if current == self.target {
          if !done.emitted {
            seq += 1;
            subscribers.notify(&Snapshot { seq, origin: node.id(), memory: &memory });
            yield memory.clone();
          }
          break;
        }

        let edge = match done.edge {
          Some(edge) => edge,
          None => Err(RoutingError::DeadEnd {
            node: node.id().to_string(),
            token: done.token.map(String::from),
          })?,
        };
        let (next_memory, next) = self.edges[edge].call(memory)?;
        trace!(edge = self.edges[edge].id(), "traversed edge");
        memory = next_memory;
        current = next;
      }
      info!(graph_id = %self.id(), steps = budget.steps(), emitted = seq, "graph run complete");
    }
  }
}
