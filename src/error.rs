//! Errors raised while building, compiling, and running graphs and programs.
//!
//! - [ConfigError]: workflow-definition bugs, raised at build/compile time.
//! - [RoutingError]: a run reached a state it cannot route out of.
//! - [EngineError]: everything a run can fail with, including the two above.

use thiserror::Error;

use crate::types::StepError;

/// A workflow definition is malformed. Always fatal; never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("node '{0}' is already registered")]
  DuplicateNode(String),

  #[error("edge '{0}' is already registered")]
  DuplicateEdge(String),

  #[error("function '{0}' is already registered")]
  DuplicateFunction(String),

  #[error("unknown node '{0}'")]
  UnknownNode(String),

  #[error("unknown edge '{0}'")]
  UnknownEdge(String),

  #[error("unknown function '{0}'")]
  UnknownFunction(String),

  #[error("function '{id}' references unregistered function '{reference}'")]
  UnknownFunctionReference { id: String, reference: String },

  #[error("branch {source_id} -> {target_id} already exists")]
  DuplicateBranch { source_id: String, target_id: String },

  #[error("edge '{0}' is already bound to a branch")]
  EdgeAlreadyBound(String),

  #[error("no source node designated")]
  MissingSource,

  #[error("no target node designated")]
  MissingTarget,

  #[error("node '{0}' cannot connect to itself")]
  SelfLoop(String),

  #[error("'{0}' is a reserved control id")]
  ReservedId(String),

  #[error("loop node '{0}' needs at least one iteration")]
  InvalidIterations(String),

  #[error("invalid program definition: {0}")]
  InvalidDefinition(#[from] serde_json::Error),
}

/// A run reached a state it cannot route out of.
#[derive(Debug, Error)]
pub enum RoutingError {
  #[error("dead end at node '{node}' (token: {})", .token.as_deref().unwrap_or("none"))]
  DeadEnd { node: String, token: Option<String> },

  #[error("function not found: {0}")]
  FunctionNotFound(String),

  #[error("cannot route: no metadata for action '{action}' in function '{function}'")]
  NoRouteForAction { function: String, action: String },

  #[error("edge '{0}' has no target node")]
  UnboundEdge(String),
}

/// Any failure surfaced to the caller of a run or step.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Routing(#[from] RoutingError),

  #[error("step budget of {max_steps} exhausted")]
  ResourceExhausted { max_steps: usize },

  #[error("deadline of {deadline_ms}ms exceeded")]
  DeadlineExceeded { deadline_ms: u128 },

  #[error("failed to start blocking runtime: {0}")]
  Runtime(#[source] std::io::Error),

  #[error("step '{origin}' failed: {source}")]
  Step {
    origin: String,
    #[source]
    source: StepError,
  },
}

impl EngineError {
  pub(crate) fn step(origin: &str, source: StepError) -> Self {
    EngineError::Step {
      origin: origin.to_string(),
      source,
    }
  }
}
