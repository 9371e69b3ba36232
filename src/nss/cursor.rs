use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// Per-kind enumeration state. Closed until an open publishes a snapshot;
/// the snapshot stays stable until close replaces it.
pub(crate) struct EntCursor {
    snapshot: Option<Vec<Value>>,
    idx: usize,
}

impl EntCursor {
    pub(crate) const fn new() -> Self {
        Self {
            snapshot: None,
            idx: 0,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.snapshot.is_some()
    }

    pub(crate) fn open(&mut self, snapshot: Vec<Value>) {
        self.snapshot = Some(snapshot);
        self.idx = 0;
    }

    pub(crate) fn close(&mut self) {
        self.snapshot = None;
        self.idx = 0;
    }

    /// The entry the cursor is on, or None at the end of the snapshot.
    pub(crate) fn current(&self) -> Option<&Value> {
        self.snapshot.as_ref()?.get(self.idx)
    }

    pub(crate) fn advance(&mut self) {
        self.idx += 1;
    }
}

/// Cursor mutexes are only ever held for the extent of one call; a caller
/// that panicked mid-call left no partial state worth rejecting.
pub(crate) fn lock(m: &'static Mutex<EntCursor>) -> MutexGuard<'static, EntCursor> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
