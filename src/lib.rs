//! # exsimula
//!
//! Directed-graph execution engine for composing stateful steps over a shared
//! JSON memory. Each step decides, through the token it returns, what runs
//! next.
//!
//! ## Architecture
//!
//! Two interpreters share the same step, memory, and subscriber types:
//!
//! - [Graph]: edge-routed traversal from a source node to a target node.
//!   Built with [GraphConfig] or the [Source] convenience builder, then
//!   frozen by [Graph::compile].
//! - [Program]: a flat function table driven by an instruction pointer and
//!   the `init` / `next` / `return` / `continue` sentinels. Built with
//!   [ProgramBuilder] or loaded from a [ProgramDefinition].
//!
//! Both run in three modes: `run_blocking`, `run` / `run_with`, and
//! `stream` / `stream_with`. Every accepted state is pushed to subscribers
//! before it is yielded; [ExecutionRecorder] is a ready-made subscriber that
//! keeps a serializable [ExecutionLog].

pub mod compiler;
pub mod definition;
pub mod error;
pub mod graph_config;
pub mod nodes;
pub mod program;
#[cfg(test)]
mod program_test;
pub mod runner;
pub mod source;
#[cfg(test)]
mod source_test;
pub mod subscribers;
pub mod types;

pub use compiler::Graph;
pub use definition::{FunctionDescriptor, FunctionRegistry, ProgramDefinition};
pub use error::{ConfigError, EngineError, RoutingError};
pub use graph_config::{Branch, GraphConfig};
pub use nodes::{Edge, Node, NodeKind, Transform};
pub use program::{Program, ProgramBuilder};
pub use source::Source;
pub use subscribers::{Subscriber, Subscribers};
pub use types::{
  DEFAULT_MAX_STEPS, Delta, DeltaStream, ExecutionLog, ExecutionRecorder, LogEntry, Memory,
  RunOptions, Snapshot, Step, StepError, StepOutput, Token, from_async, from_fn,
};
