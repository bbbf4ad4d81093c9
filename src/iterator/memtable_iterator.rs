use std::{ops::Bound, sync::Arc};

use crossbeam_skiplist::{SkipMap, map::Entry};

use crate::{
    iterator::InternalIterator,
    memtable::InternalKey,
    util::{Result, Slice},
};

/// Iterator for MemTable
///
/// Yields every version stored in the memtable, deletion markers included;
/// filtering by snapshot happens in [`crate::iterator::DBIterator`].
///
/// # Implementation Notes
///
/// The current entry is cloned out of the skip map (both halves are
/// refcounted views, so this does not copy data). Stepping re-enters the map
/// with a strict bound on the current key, which works in both directions and
/// stays correct while writers insert concurrently.
pub struct MemTableIterator {
    map: Arc<SkipMap<InternalKey, Slice>>,
    current: Option<(InternalKey, Slice)>,
}

fn to_pair(entry: Entry<'_, InternalKey, Slice>) -> (InternalKey, Slice) {
    (entry.key().clone(), entry.value().clone())
}

impl MemTableIterator {
    pub fn new(map: Arc<SkipMap<InternalKey, Slice>>) -> Self {
        MemTableIterator { map, current: None }
    }
}

impl InternalIterator for MemTableIterator {
    fn seek_to_first(&mut self) -> Result<bool> {
        self.current = self.map.front().map(to_pair);
        Ok(self.current.is_some())
    }

    fn seek_to_last(&mut self) -> Result<bool> {
        self.current = self.map.back().map(to_pair);
        Ok(self.current.is_some())
    }

    fn seek(&mut self, target: &InternalKey) -> Result<bool> {
        self.current = self.map.lower_bound(Bound::Included(target)).map(to_pair);
        Ok(self.current.is_some())
    }

    fn next(&mut self) -> Result<bool> {
        let Some((key, _)) = self.current.take() else {
            return Ok(false);
        };
        self.current = self.map.lower_bound(Bound::Excluded(&key)).map(to_pair);
        Ok(self.current.is_some())
    }

    fn prev(&mut self) -> Result<bool> {
        let Some((key, _)) = self.current.take() else {
            return Ok(false);
        };
        self.current = self.map.upper_bound(Bound::Excluded(&key)).map(to_pair);
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<(&InternalKey, &Slice)> {
        self.current.as_ref().map(|(k, v)| (k, v))
    }
}
