use tracing::warn;

use crate::{
    iterator::{Direction, InternalIterator, Iterator},
    memtable::{InternalKey, ValueType},
    util::{Result, Slice, Status},
};

/// User-facing iterator over a snapshot of the DB.
///
/// Wraps an [`InternalIterator`] and exposes, for each user key, the newest
/// version with sequence <= `sequence`. Keys whose visible version is a
/// deletion are skipped, and writes committed after the snapshot are never
/// observed, however long the iterator lives.
///
/// # Positioning
///
/// - Forward: the internal iterator sits on the entry that produced `key()`.
/// - Reverse: the internal iterator sits just before every entry of `key()`;
///   key and value are kept in `saved_key` / `saved_value`.
///
/// While moving forward `saved_key` doubles as the "skip everything up to
/// this user key" marker.
pub struct DBIterator {
    iter: Box<dyn InternalIterator>,
    sequence: u64,
    direction: Direction,
    valid: bool,
    saved_key: Slice,
    saved_value: Slice,
    status: Status,
}

impl DBIterator {
    pub fn new(iter: Box<dyn InternalIterator>, sequence: u64) -> Self {
        DBIterator {
            iter,
            sequence,
            direction: Direction::Forward,
            valid: false,
            saved_key: Slice::empty(),
            saved_value: Slice::empty(),
            status: Status::ok(),
        }
    }

    /// Snapshot sequence this iterator reads at.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn current_user_key(&self) -> Option<Slice> {
        self.iter.current().map(|(ikey, _)| ikey.user_key().clone())
    }

    fn invalidate(&mut self) {
        self.valid = false;
        self.saved_key = Slice::empty();
        self.saved_value = Slice::empty();
    }

    /// Record a failure from the internal iterator and leave the iterator
    /// invalid.
    fn track(&mut self, result: Result<bool>) -> Result<bool> {
        if let Err(status) = &result {
            warn!(sequence = self.sequence, %status, "iterator stopped on storage error");
            self.status = status.clone();
            self.invalidate();
        }
        result
    }

    fn find_next_user_entry(&mut self, mut skipping: bool) -> Result<bool> {
        while let Some((ikey, _)) = self.iter.current() {
            if ikey.sequence() <= self.sequence {
                match ikey.value_type() {
                    ValueType::Deletion => {
                        // Hide every older version of this key.
                        self.saved_key = ikey.user_key().clone();
                        skipping = true;
                    },
                    ValueType::Value => {
                        if !(skipping && ikey.user_key() <= &self.saved_key) {
                            self.valid = true;
                            self.saved_key = Slice::empty();
                            return Ok(true);
                        }
                    },
                }
            }
            self.iter.next()?;
        }
        self.invalidate();
        Ok(false)
    }

    fn find_prev_user_entry(&mut self) -> Result<bool> {
        let mut value_type = ValueType::Deletion;
        while let Some((ikey, value)) = self.iter.current() {
            if ikey.sequence() <= self.sequence {
                if value_type != ValueType::Deletion && ikey.user_key() < &self.saved_key {
                    // Crossed into an earlier user key; saved entry is final.
                    break;
                }
                value_type = ikey.value_type();
                if value_type == ValueType::Deletion {
                    self.saved_key = Slice::empty();
                    self.saved_value = Slice::empty();
                } else {
                    self.saved_key = ikey.user_key().clone();
                    self.saved_value = value.clone();
                }
            }
            self.iter.prev()?;
        }

        if value_type == ValueType::Deletion {
            self.invalidate();
            self.direction = Direction::Forward;
            Ok(false)
        } else {
            self.valid = true;
            Ok(true)
        }
    }

    fn seek_to_first_inner(&mut self) -> Result<bool> {
        self.direction = Direction::Forward;
        self.saved_value = Slice::empty();
        if self.iter.seek_to_first()? {
            self.find_next_user_entry(false)
        } else {
            self.invalidate();
            Ok(false)
        }
    }

    fn seek_to_last_inner(&mut self) -> Result<bool> {
        self.direction = Direction::Reverse;
        self.saved_value = Slice::empty();
        self.iter.seek_to_last()?;
        self.find_prev_user_entry()
    }

    fn seek_inner(&mut self, target: &Slice) -> Result<bool> {
        self.direction = Direction::Forward;
        self.saved_value = Slice::empty();
        let lookup = InternalKey::for_seek(target.clone(), self.sequence);
        if self.iter.seek(&lookup)? {
            self.find_next_user_entry(false)
        } else {
            self.invalidate();
            Ok(false)
        }
    }

    fn seek_for_prev_inner(&mut self, target: &Slice) -> Result<bool> {
        if self.seek_inner(target)? {
            if self.key() == *target {
                return Ok(true);
            }
            return self.prev_inner();
        }
        self.seek_to_last_inner()
    }

    fn next_inner(&mut self) -> Result<bool> {
        if !self.valid {
            return Ok(false);
        }

        if self.direction == Direction::Reverse {
            self.direction = Direction::Forward;
            // The internal iterator is just before the entries of saved_key.
            if self.iter.valid() {
                self.iter.next()?;
            } else {
                self.iter.seek_to_first()?;
            }
            if !self.iter.valid() {
                self.invalidate();
                return Ok(false);
            }
        } else {
            let Some(user_key) = self.current_user_key() else {
                self.invalidate();
                return Ok(false);
            };
            self.saved_key = user_key;
            if !self.iter.next()? {
                self.invalidate();
                return Ok(false);
            }
        }
        self.find_next_user_entry(true)
    }

    fn prev_inner(&mut self) -> Result<bool> {
        if !self.valid {
            return Ok(false);
        }

        if self.direction == Direction::Forward {
            let Some(user_key) = self.current_user_key() else {
                self.invalidate();
                return Ok(false);
            };
            self.saved_key = user_key;
            loop {
                self.iter.prev()?;
                let crossed = self
                    .iter
                    .current()
                    .map(|(ikey, _)| ikey.user_key() < &self.saved_key);
                match crossed {
                    None => {
                        self.invalidate();
                        return Ok(false);
                    },
                    Some(true) => break,
                    Some(false) => {},
                }
            }
            self.direction = Direction::Reverse;
        }
        self.find_prev_user_entry()
    }
}

impl Iterator for DBIterator {
    fn seek_to_first(&mut self) -> Result<bool> {
        self.status = Status::ok();
        let result = self.seek_to_first_inner();
        self.track(result)
    }

    fn seek_to_last(&mut self) -> Result<bool> {
        self.status = Status::ok();
        let result = self.seek_to_last_inner();
        self.track(result)
    }

    fn seek(&mut self, target: &Slice) -> Result<bool> {
        self.status = Status::ok();
        let result = self.seek_inner(target);
        self.track(result)
    }

    fn seek_for_prev(&mut self, target: &Slice) -> Result<bool> {
        self.status = Status::ok();
        let result = self.seek_for_prev_inner(target);
        self.track(result)
    }

    fn next(&mut self) -> Result<bool> {
        let result = self.next_inner();
        self.track(result)
    }

    fn prev(&mut self) -> Result<bool> {
        let result = self.prev_inner();
        self.track(result)
    }

    fn key(&self) -> Slice {
        if !self.valid {
            return Slice::empty();
        }
        match self.direction {
            Direction::Forward => self.current_user_key().unwrap_or_default(),
            Direction::Reverse => self.saved_key.clone(),
        }
    }

    fn value(&self) -> Slice {
        if !self.valid {
            return Slice::empty();
        }
        match self.direction {
            Direction::Forward => self
                .iter
                .current()
                .map(|(_, value)| value.clone())
                .unwrap_or_default(),
            Direction::Reverse => self.saved_value.clone(),
        }
    }

    fn valid(&self) -> bool {
        self.valid
    }

    fn status(&self) -> Status {
        self.status.clone()
    }
}
