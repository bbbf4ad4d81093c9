use crate::{
    iterator::{Direction, InternalIterator},
    memtable::InternalKey,
    util::{Result, Slice},
};

/// Merging iterator for combining multiple sorted iterators
///
/// Presents the union of its children as one sorted stream of versioned
/// entries. Used by the DB to merge the active memtable with the immutable
/// ones.
///
/// # Priority Rules
///
/// Internal keys carry a sequence number, so two children never produce the
/// same internal key for data written through one DB. If they do, the child
/// with the lower index is yielded first.
///
/// # Direction Switching
///
/// While moving forward every child sits at its first entry > key(); while
/// moving backward every child sits at its last entry < key(). Switching
/// direction re-seeks the non-current children around the current key.
/// Picking the current child is a linear scan, which beats a heap for the
/// handful of memtables a DB holds at once.
pub struct MergingIterator {
    children: Vec<Box<dyn InternalIterator>>,
    current: Option<usize>,
    direction: Direction,
}

impl MergingIterator {
    /// Create a merging iterator; `children[0]` has the highest priority.
    pub fn new(children: Vec<Box<dyn InternalIterator>>) -> Self {
        MergingIterator {
            children,
            current: None,
            direction: Direction::Forward,
        }
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    fn find_smallest(&mut self) -> bool {
        let mut best: Option<(usize, &InternalKey)> = None;
        for (idx, child) in self.children.iter().enumerate() {
            if let Some((key, _)) = child.current()
                && best.is_none_or(|(_, best_key)| key < best_key)
            {
                best = Some((idx, key));
            }
        }
        self.current = best.map(|(idx, _)| idx);
        self.current.is_some()
    }

    fn find_largest(&mut self) -> bool {
        let mut best: Option<(usize, &InternalKey)> = None;
        for (idx, child) in self.children.iter().enumerate() {
            if let Some((key, _)) = child.current()
                && best.is_none_or(|(_, best_key)| key > best_key)
            {
                best = Some((idx, key));
            }
        }
        self.current = best.map(|(idx, _)| idx);
        self.current.is_some()
    }

    fn current_key(&self) -> Option<InternalKey> {
        self.current().map(|(key, _)| key.clone())
    }
}

impl InternalIterator for MergingIterator {
    fn seek_to_first(&mut self) -> Result<bool> {
        for child in &mut self.children {
            child.seek_to_first()?;
        }
        self.direction = Direction::Forward;
        Ok(self.find_smallest())
    }

    fn seek_to_last(&mut self) -> Result<bool> {
        for child in &mut self.children {
            child.seek_to_last()?;
        }
        self.direction = Direction::Reverse;
        Ok(self.find_largest())
    }

    fn seek(&mut self, target: &InternalKey) -> Result<bool> {
        for child in &mut self.children {
            child.seek(target)?;
        }
        self.direction = Direction::Forward;
        Ok(self.find_smallest())
    }

    fn next(&mut self) -> Result<bool> {
        let (Some(cur), Some(key)) = (self.current, self.current_key()) else {
            return Ok(false);
        };

        if self.direction == Direction::Reverse {
            for (idx, child) in self.children.iter_mut().enumerate() {
                if idx == cur {
                    continue;
                }
                child.seek(&key)?;
                if child.current().is_some_and(|(k, _)| k == &key) {
                    child.next()?;
                }
            }
            self.direction = Direction::Forward;
        }

        self.children[cur].next()?;
        Ok(self.find_smallest())
    }

    fn prev(&mut self) -> Result<bool> {
        let (Some(cur), Some(key)) = (self.current, self.current_key()) else {
            return Ok(false);
        };

        if self.direction == Direction::Forward {
            for (idx, child) in self.children.iter_mut().enumerate() {
                if idx == cur {
                    continue;
                }
                child.seek(&key)?;
                if child.valid() {
                    child.prev()?;
                } else {
                    child.seek_to_last()?;
                }
            }
            self.direction = Direction::Reverse;
        }

        self.children[cur].prev()?;
        Ok(self.find_largest())
    }

    fn current(&self) -> Option<(&InternalKey, &Slice)> {
        self.current.and_then(|idx| self.children[idx].current())
    }
}
