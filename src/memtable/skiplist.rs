use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use crate::{memtable::memtable::InternalKey, util::Slice};

/// Lock-free ordered map from internal key to value.
///
/// Readers and the single writer never block each other. The map is shared
/// through an `Arc` so iterators can outlive the memtable's slot in the DB.
pub struct SkipList {
    map: Arc<SkipMap<InternalKey, Slice>>,
}

impl SkipList {
    pub fn new() -> Self {
        SkipList {
            map: Arc::new(SkipMap::new()),
        }
    }

    pub fn insert(&self, key: InternalKey, value: Slice) {
        self.map.insert(key, value);
    }

    /// First entry whose internal key is >= `target`.
    pub fn seek(&self, target: &InternalKey) -> Option<(InternalKey, Slice)> {
        self.map
            .lower_bound(std::ops::Bound::Included(target))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
    }

    pub fn contains(&self, key: &InternalKey) -> bool {
        self.map.contains_key(key)
    }

    pub(crate) fn map(&self) -> Arc<SkipMap<InternalKey, Slice>> {
        Arc::clone(&self.map)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}
