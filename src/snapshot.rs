use std::{collections::BTreeMap, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::trace;

/// Snapshot provides a consistent point-in-time view of the database
///
/// A snapshot is a sequence number: reads through it see exactly the writes
/// with a sequence <= that number. Clones share one registration; the
/// snapshot is released from its [`SnapshotList`] when the last clone is
/// dropped, so any number of cursors can hold the same snapshot.
#[derive(Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

struct SnapshotInner {
    sequence: u64,
    list: Option<Arc<SnapshotList>>,
}

impl Snapshot {
    /// Create a snapshot at the given sequence number that is not tracked
    /// by any DB.
    pub fn new(sequence: u64) -> Self {
        Snapshot {
            inner: Arc::new(SnapshotInner {
                sequence,
                list: None,
            }),
        }
    }

    /// Get the snapshot's sequence number
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.inner.sequence
    }

    /// Number of live handles sharing this snapshot.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("sequence", &self.inner.sequence)
            .field("holders", &self.holders())
            .finish()
    }
}

impl Drop for SnapshotInner {
    fn drop(&mut self) {
        if let Some(list) = &self.list {
            list.release(self.sequence);
        }
    }
}

/// Snapshots currently held against a DB.
///
/// Versions newer than the oldest live snapshot may still be needed by a
/// reader; the list is what tells the engine how far back it must keep data.
#[derive(Default)]
pub struct SnapshotList {
    /// sequence -> number of distinct snapshots taken at it
    live: Mutex<BTreeMap<u64, usize>>,
}

impl SnapshotList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new snapshot at `sequence`.
    pub fn acquire(self: &Arc<Self>, sequence: u64) -> Snapshot {
        *self.live.lock().entry(sequence).or_insert(0) += 1;
        trace!(sequence, "snapshot acquired");
        Snapshot {
            inner: Arc::new(SnapshotInner {
                sequence,
                list: Some(Arc::clone(self)),
            }),
        }
    }

    fn release(&self, sequence: u64) {
        let mut live = self.live.lock();
        if let Some(count) = live.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                live.remove(&sequence);
            }
        }
        trace!(sequence, "snapshot released");
    }

    /// Number of live snapshots.
    pub fn len(&self) -> usize {
        self.live.lock().values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }

    /// Sequence of the oldest live snapshot.
    pub fn oldest(&self) -> Option<u64> {
        self.live.lock().keys().next().copied()
    }
}
