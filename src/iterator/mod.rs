//! Iterator module
//!
//! Two layers of iterators live here:
//!
//! - [`InternalIterator`] walks versioned entries ([`InternalKey`]) in
//!   internal key order. Implemented by [`MemTableIterator`] for a single
//!   memtable and [`MergingIterator`] for a set of them.
//! - [`Iterator`] walks user keys. [`DBIterator`] adapts an internal iterator
//!   to it by applying a snapshot sequence: newer versions, shadowed versions
//!   and deletion markers are hidden.
//!
//! ```text
//! DB::iter(&ReadOptions)
//!     ↓
//! DBIterator (sequence = snapshot)
//!     ↓
//! MergingIterator
//!     ├─→ MemTableIterator (active, newest)
//!     └─→ [MemTableIterator, ...] (immutable, newest to oldest)
//! ```
//!
//! Every iterator here is bidirectional and can switch direction at any
//! position.

use crate::{
    memtable::InternalKey,
    util::{Result, Slice, Status},
};

/// Iterator over user keys in sorted order.
///
/// # Lifecycle
///
/// An iterator starts in an invalid state. Call one of the seek methods
/// to position it:
///
/// ```ignore
/// let mut iter = db.iter(&ReadOptions::default())?;
/// iter.seek_to_first()?;
/// while iter.valid() {
///     println!("{:?}: {:?}", iter.key(), iter.value());
///     iter.next()?;
/// }
/// assert!(iter.status().is_ok());
/// ```
///
/// # Error Handling
///
/// Positioning returns `Err` when the underlying source fails. The iterator
/// then becomes invalid and keeps the failure in [`Iterator::status`] until
/// the next seek. An invalid iterator with an ok status is simply exhausted.
pub trait Iterator {
    /// Position at the first key in the source
    ///
    /// Returns Ok(true) if positioned, Ok(false) if source is empty
    fn seek_to_first(&mut self) -> Result<bool>;

    /// Position at the last key in the source
    ///
    /// Returns Ok(true) if positioned, Ok(false) if source is empty
    fn seek_to_last(&mut self) -> Result<bool>;

    /// Position at the first key >= target
    ///
    /// If no such key exists, iterator becomes invalid.
    fn seek(&mut self, target: &Slice) -> Result<bool>;

    /// Position at the last key <= target
    ///
    /// If no such key exists, iterator becomes invalid.
    fn seek_for_prev(&mut self, target: &Slice) -> Result<bool>;

    /// Move to the next entry
    ///
    /// Prerequisite: valid() == true
    /// Returns Ok(true) if moved, Ok(false) if reached end
    fn next(&mut self) -> Result<bool>;

    /// Move to the previous entry
    ///
    /// Prerequisite: valid() == true
    /// Returns Ok(true) if moved, Ok(false) if reached beginning
    fn prev(&mut self) -> Result<bool>;

    /// Current key, empty when not valid
    fn key(&self) -> Slice;

    /// Current value, empty when not valid
    fn value(&self) -> Slice;

    fn valid(&self) -> bool;

    /// Error recorded by the last operation, if any
    fn status(&self) -> Status {
        Status::ok()
    }
}

/// Iterator over versioned entries in [`InternalKey`] order.
pub trait InternalIterator: Send {
    fn seek_to_first(&mut self) -> Result<bool>;

    fn seek_to_last(&mut self) -> Result<bool>;

    /// Position at the first entry >= target
    fn seek(&mut self, target: &InternalKey) -> Result<bool>;

    fn next(&mut self) -> Result<bool>;

    fn prev(&mut self) -> Result<bool>;

    /// Entry under the iterator, `None` when not positioned
    fn current(&self) -> Option<(&InternalKey, &Slice)>;

    fn valid(&self) -> bool {
        self.current().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Reverse,
}

mod db_iterator;
mod memtable_iterator;
mod merging_iterator;

pub use db_iterator::DBIterator;
pub use memtable_iterator::MemTableIterator;
pub use merging_iterator::MergingIterator;
