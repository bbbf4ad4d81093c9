use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::iterator::MemTableIterator;
use crate::memtable::skiplist::SkipList;
use crate::util::Slice;

/// Kind of a versioned entry.
///
/// The discriminant takes part in internal key ordering: for equal user key
/// and sequence the larger type sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueType {
    Deletion = 0,
    Value = 1,
}

/// Type used when building a lookup key, so that the lookup key sorts before
/// every entry with the same user key and sequence.
pub const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::Value;

/// A versioned key: user key + sequence number + entry type.
///
/// Ordered by user key ascending, then sequence descending, so the newest
/// version of a key is met first when scanning forward.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InternalKey {
    user_key: Slice,
    sequence: u64,
    value_type: ValueType,
}

impl InternalKey {
    pub fn new(user_key: Slice, sequence: u64, value_type: ValueType) -> Self {
        InternalKey {
            user_key,
            sequence,
            value_type,
        }
    }

    /// Lookup key for `user_key` as visible at `sequence`.
    pub fn for_seek(user_key: Slice, sequence: u64) -> Self {
        InternalKey::new(user_key, sequence, VALUE_TYPE_FOR_SEEK)
    }

    pub fn user_key(&self) -> &Slice {
        &self.user_key
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_deletion(&self) -> bool {
        self.value_type == ValueType::Deletion
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.value_type.cmp(&self.value_type))
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// In-memory write buffer holding every version written to it.
///
/// Old versions are never overwritten in place; visibility is decided at
/// read time against a snapshot sequence.
pub struct MemTable {
    table: SkipList,
    approximate_memory: Arc<AtomicUsize>,
}

impl MemTable {
    pub fn new() -> Self {
        MemTable {
            table: SkipList::new(),
            approximate_memory: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn add(&self, sequence: u64, key: Slice, value: Slice) {
        let mem_usage = key.size() + value.size() + 9;
        self.approximate_memory
            .fetch_add(mem_usage, Ordering::Relaxed);

        let internal_key = InternalKey::new(key, sequence, ValueType::Value);
        self.table.insert(internal_key, value);
    }

    pub fn delete(&self, sequence: u64, key: Slice) {
        let mem_usage = key.size() + 9;
        self.approximate_memory
            .fetch_add(mem_usage, Ordering::Relaxed);

        let internal_key = InternalKey::new(key, sequence, ValueType::Deletion);
        self.table.insert(internal_key, Slice::empty());
    }

    /// Look up the newest version of `key` with sequence <= `sequence`.
    ///
    /// Returns `(found, value)`: `found` is true when this memtable decides
    /// the answer, either with a value or with a deletion marker
    /// (`value == None`). When `found` is false older sources must be
    /// consulted.
    pub fn get(&self, key: &Slice, sequence: u64) -> (bool, Option<Slice>) {
        let lookup = InternalKey::for_seek(key.clone(), sequence);
        match self.table.seek(&lookup) {
            Some((internal_key, value)) if internal_key.user_key() == key => {
                if internal_key.is_deletion() {
                    (true, None)
                } else {
                    (true, Some(value))
                }
            },
            _ => (false, None),
        }
    }

    pub fn iter(&self) -> MemTableIterator {
        MemTableIterator::new(self.table.map())
    }

    pub fn approximate_memory_usage(&self) -> usize {
        self.approximate_memory.load(Ordering::Relaxed)
    }

    /// Number of versions stored, deletion markers included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
