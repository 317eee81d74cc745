//! DTOs for an execution log: every snapshot emitted during a run, in order.
//!
//! [ExecutionRecorder] is a subscriber; register it with `subscribe` and read
//! the [ExecutionLog] back once the run is over.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::{Memory, Snapshot};

/// Current log format version.
pub const EXECUTION_LOG_VERSION: u32 = 1;

/// One recorded emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  /// 1-based emission index.
  pub seq: usize,
  /// Node or function that produced the state.
  pub origin: String,
  /// RFC 3339 timestamp of the emission.
  pub recorded_at: String,
  /// State after the emission.
  pub memory: Memory,
}

/// Root structure of a serialized execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
  pub version: u32,
  /// Random id distinguishing this recording.
  pub run_id: String,
  /// RFC 3339 timestamp of recorder creation.
  pub started_at: String,
  pub entries: Vec<LogEntry>,
}

impl ExecutionLog {
  pub fn new() -> Self {
    Self {
      version: EXECUTION_LOG_VERSION,
      run_id: uuid::Uuid::new_v4().to_string(),
      started_at: chrono::Utc::now().to_rfc3339(),
      entries: Vec::new(),
    }
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }
}

impl Default for ExecutionLog {
  fn default() -> Self {
    Self::new()
  }
}

/// Subscriber that appends every snapshot to an [ExecutionLog].
#[derive(Debug, Clone, Default)]
pub struct ExecutionRecorder {
  log: Arc<Mutex<ExecutionLog>>,
}

impl ExecutionRecorder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&self, snapshot: &Snapshot<'_>) {
    let entry = LogEntry {
      seq: snapshot.seq,
      origin: snapshot.origin.to_string(),
      recorded_at: chrono::Utc::now().to_rfc3339(),
      memory: snapshot.memory.clone(),
    };
    self
      .log
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .entries
      .push(entry);
  }

  /// Callback suitable for `subscribe`.
  pub fn subscriber(&self) -> impl Fn(&Snapshot<'_>) + Send + Sync + 'static {
    let recorder = self.clone();
    move |snapshot: &Snapshot<'_>| recorder.record(snapshot)
  }

  /// Copy of everything recorded so far.
  pub fn log(&self) -> ExecutionLog {
    self
      .log
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .clone()
  }
}
