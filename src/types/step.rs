//! Step functions: the user-supplied units of work driven by both interpreters.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::{Memory, Token};

/// Error type user steps may fail with.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

/// Step failure reported when a delta stream ends before producing any state.
pub(crate) const EMPTY_DELTA_STREAM: &str = "delta stream ended without producing a state";

/// Sequence of incremental updates produced by a streamed step.
pub type DeltaStream = BoxStream<'static, Result<Delta, StepError>>;

/// One incremental update from a streamed step.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
  /// Replace memory and keep running the same step.
  Replace(Memory),
  /// Final update: replace memory and route with `token`.
  Route(Memory, Token),
}

/// What a step produced.
pub enum StepOutput {
  /// New memory; routing follows the normal successor.
  Continue(Memory),
  /// New memory plus an explicit routing token.
  Route(Memory, Token),
  /// A lazy sequence of deltas.
  Stream(DeltaStream),
}

impl StepOutput {
  pub fn route(memory: Memory, token: impl Into<Token>) -> Self {
    StepOutput::Route(memory, token.into())
  }

  pub fn stream(deltas: impl futures::Stream<Item = Result<Delta, StepError>> + Send + 'static) -> Self {
    StepOutput::Stream(Box::pin(deltas))
  }
}

impl fmt::Debug for StepOutput {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepOutput::Continue(m) => f.debug_tuple("Continue").field(m).finish(),
      StepOutput::Route(m, t) => f.debug_tuple("Route").field(m).field(t).finish(),
      StepOutput::Stream(_) => f.write_str("Stream(..)"),
    }
  }
}

/// A unit of work: receives memory, returns a [StepOutput].
#[async_trait]
pub trait Step: Send + Sync {
  async fn call(&self, memory: Memory) -> Result<StepOutput, StepError>;
}

/// Adapter for synchronous closures.
struct SyncFn<F>(F);

#[async_trait]
impl<F> Step for SyncFn<F>
where
  F: Fn(Memory) -> Result<StepOutput, StepError> + Send + Sync,
{
  async fn call(&self, memory: Memory) -> Result<StepOutput, StepError> {
    (self.0)(memory)
  }
}

/// Adapter for closures returning a future.
struct AsyncFn<F>(F);

#[async_trait]
impl<F, Fut> Step for AsyncFn<F>
where
  F: Fn(Memory) -> Fut + Send + Sync,
  Fut: Future<Output = Result<StepOutput, StepError>> + Send + 'static,
{
  async fn call(&self, memory: Memory) -> Result<StepOutput, StepError> {
    (self.0)(memory).await
  }
}

/// Wraps a synchronous closure as a shared [Step].
pub fn from_fn<F>(f: F) -> Arc<dyn Step>
where
  F: Fn(Memory) -> Result<StepOutput, StepError> + Send + Sync + 'static,
{
  Arc::new(SyncFn(f))
}

/// Wraps an async closure as a shared [Step].
pub fn from_async<F, Fut>(f: F) -> Arc<dyn Step>
where
  F: Fn(Memory) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<StepOutput, StepError>> + Send + 'static,
{
  Arc::new(AsyncFn(f))
}
