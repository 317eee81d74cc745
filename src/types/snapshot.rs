//! Immutable view of one accepted state transition.

use super::Memory;

/// What subscribers observe for each accepted state.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
  /// 1-based emission index within the run.
  pub seq: usize,
  /// Node or function id that produced the state.
  pub origin: &'a str,
  pub memory: &'a Memory,
}
