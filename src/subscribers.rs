//! Observer registry shared by the graph and program interpreters.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::types::Snapshot;

/// Callback observing one accepted state transition.
pub type Subscriber = Arc<dyn Fn(&Snapshot<'_>) + Send + Sync>;

/// Ordered list of subscribers behind a shared handle.
///
/// Clones share the same list, so a handle taken before a run can register
/// observers while the run is in progress; they see only later emissions.
#[derive(Clone, Default)]
pub struct Subscribers {
  inner: Arc<Mutex<Vec<Subscriber>>>,
}

impl Subscribers {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe<F>(&self, callback: F)
  where
    F: Fn(&Snapshot<'_>) + Send + Sync + 'static,
  {
    self.lock().push(Arc::new(callback));
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  /// Invokes every subscriber in registration order.
  ///
  /// The list is copied first so callbacks may subscribe without deadlocking.
  pub(crate) fn notify(&self, snapshot: &Snapshot<'_>) {
    let current: Vec<Subscriber> = self.lock().clone();
    for subscriber in current {
      subscriber(snapshot);
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
    self
      .inner
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl fmt::Debug for Subscribers {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscribers")
      .field("len", &self.len())
      .finish()
  }
}
