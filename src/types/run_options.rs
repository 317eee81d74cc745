//! Caller-supplied limits for a single run.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::EngineError;

/// Default step budget for callers that want one.
pub const DEFAULT_MAX_STEPS: usize = 1000;

/// Limits applied to one run. Both default to unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
  /// Maximum node visits (graph) or function invocations (program).
  #[serde(default)]
  pub max_steps: Option<usize>,
  /// Wall-clock budget, checked before every step.
  #[serde(default)]
  pub deadline: Option<Duration>,
}

impl RunOptions {
  pub fn with_max_steps(mut self, max_steps: usize) -> Self {
    self.max_steps = Some(max_steps);
    self
  }

  pub fn with_deadline(mut self, deadline: Duration) -> Self {
    self.deadline = Some(deadline);
    self
  }
}

/// Tracks consumption of a [RunOptions] budget during one run.
#[derive(Debug)]
pub(crate) struct Budget {
  options: RunOptions,
  started: Instant,
  steps: usize,
}

impl Budget {
  pub(crate) fn new(options: RunOptions) -> Self {
    Self {
      options,
      started: Instant::now(),
      steps: 0,
    }
  }

  /// Accounts for one more step, failing if the budget is spent.
  pub(crate) fn charge(&mut self) -> Result<(), EngineError> {
    if let Some(max_steps) = self.options.max_steps
      && self.steps >= max_steps
    {
      return Err(EngineError::ResourceExhausted { max_steps });
    }
    if let Some(deadline) = self.options.deadline
      && self.started.elapsed() >= deadline
    {
      return Err(EngineError::DeadlineExceeded {
        deadline_ms: deadline.as_millis(),
      });
    }
    self.steps += 1;
    Ok(())
  }

  pub(crate) fn steps(&self) -> usize {
    self.steps
  }
}

/// Drives `future` to completion on a fresh current-thread tokio runtime.
///
/// Steps may await tokio timers, so a bare executor is not enough.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output, EngineError> {
  let runtime = tokio::runtime::Builder::new_current_thread()
    .enable_time()
    .build()
    .map_err(EngineError::Runtime)?;
  Ok(runtime.block_on(future))
}
