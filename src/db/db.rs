use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use super::{DBOptions, ReadOptions, WriteBatch, WriteOp, WriteOptions};
use crate::{
    cursor::Cursor,
    iterator::{DBIterator, InternalIterator, MergingIterator},
    memtable::MemTable,
    scheduler::Scheduler,
    snapshot::{Snapshot, SnapshotList},
    statistics::Statistics,
    util::{Result, Slice, Status},
};

/// Active memtable plus the ones it replaced, newest first.
struct MemTables {
    mem: Arc<MemTable>,
    imm: Vec<Arc<MemTable>>,
}

/// In-memory ordered key-value store
///
/// Every write gets a sequence number; a write becomes visible once
/// `last_sequence` reaches it. Readers pick a sequence (a snapshot) and see
/// exactly the writes at or below it, so a cursor keeps a stable view while
/// writes continue.
pub struct DB {
    options: DBOptions,
    memtables: RwLock<MemTables>,
    /// Serializes writers; readers never take it.
    write_lock: Mutex<()>,
    /// Last published sequence number
    last_sequence: AtomicU64,
    snapshots: Arc<SnapshotList>,
    statistics: Arc<Statistics>,
    scheduler: Scheduler,
}

impl DB {
    pub fn open(options: DBOptions) -> Result<Self> {
        options.validate()?;
        let scheduler = Scheduler::new(&options.scheduler_options())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        info!(
            write_buffer_size = options.write_buffer_size,
            worker_threads = options.worker_threads,
            "opened in-memory store"
        );

        Ok(DB {
            options,
            memtables: RwLock::new(MemTables {
                mem: Arc::new(MemTable::new()),
                imm: Vec::new(),
            }),
            write_lock: Mutex::new(()),
            last_sequence: AtomicU64::new(0),
            snapshots: Arc::new(SnapshotList::new()),
            statistics: Arc::new(Statistics::new()),
            scheduler,
        })
    }

    pub fn put(&self, options: &WriteOptions, key: Slice, value: Slice) -> Result<()> {
        let mut batch = WriteBatch::with_capacity(1);
        batch.put(key, value);
        self.write(options, &batch)
    }

    pub fn delete(&self, options: &WriteOptions, key: Slice) -> Result<()> {
        let mut batch = WriteBatch::with_capacity(1);
        batch.delete(key);
        self.write(options, &batch)
    }

    /// Apply a write batch atomically
    ///
    /// Snapshots and cursors see either none or all of the batch.
    pub fn write(&self, _options: &WriteOptions, batch: &WriteBatch) -> Result<()> {
        for op in batch.ops() {
            self.check_key(op.key())?;
        }
        if batch.is_empty() {
            return Ok(());
        }

        let _writer = self.write_lock.lock();
        let mut seq = self.last_sequence.load(Ordering::Acquire);
        {
            let tables = self.memtables.read();
            for op in batch.ops() {
                seq += 1;
                match op {
                    WriteOp::Put { key, value } => {
                        tables.mem.add(seq, key.clone(), value.clone());
                        self.statistics
                            .record_write((key.size() + value.size()) as u64);
                    },
                    WriteOp::Delete { key } => {
                        tables.mem.delete(seq, key.clone());
                        self.statistics.record_delete();
                    },
                }
            }
        }
        self.last_sequence.store(seq, Ordering::Release);
        trace!(last_sequence = seq, count = batch.count(), "batch published");

        self.maybe_rotate();
        Ok(())
    }

    /// Move the active memtable to the immutable list once it is full.
    ///
    /// Called with the write lock held.
    fn maybe_rotate(&self) {
        let mut tables = self.memtables.write();
        let usage = tables.mem.approximate_memory_usage();
        if usage < self.options.write_buffer_size {
            return;
        }

        let full = std::mem::replace(&mut tables.mem, Arc::new(MemTable::new()));
        tables.imm.insert(0, full);
        self.statistics.record_memtable_rotation();
        debug!(
            usage,
            immutable = tables.imm.len(),
            "memtable rotated"
        );
    }

    fn check_key(&self, key: &Slice) -> Result<()> {
        if key.size() > self.options.max_key_size {
            return Err(Status::invalid_argument(format!(
                "key of {} bytes exceeds max key size {}",
                key.size(),
                self.options.max_key_size
            )));
        }
        Ok(())
    }

    fn read_sequence(&self, options: &ReadOptions) -> u64 {
        match &options.snapshot {
            Some(snapshot) => snapshot.sequence(),
            None => self.latest_sequence(),
        }
    }

    pub fn get(&self, options: &ReadOptions, key: &Slice) -> Result<Option<Slice>> {
        let sequence = self.read_sequence(options);
        let tables = self.memtables.read();

        for table in std::iter::once(&tables.mem).chain(tables.imm.iter()) {
            let (found, value) = table.get(key, sequence);
            if found {
                if let Some(v) = &value {
                    self.statistics.record_read(v.size() as u64);
                }
                return Ok(value);
            }
        }
        Ok(None)
    }

    /// Create an iterator over the store as of the read snapshot
    ///
    /// Merges the active memtable with the immutable ones, newest first, so
    /// that on equal internal keys the newer table wins. Without an explicit
    /// snapshot the iterator reads at the latest published sequence.
    pub fn iter(&self, options: &ReadOptions) -> Result<DBIterator> {
        let sequence = self.read_sequence(options);
        let children: Vec<Box<dyn InternalIterator>> = {
            let tables = self.memtables.read();
            std::iter::once(&tables.mem)
                .chain(tables.imm.iter())
                .map(|table| Box::new(table.iter()) as Box<dyn InternalIterator>)
                .collect()
        };
        Ok(DBIterator::new(
            Box::new(MergingIterator::new(children)),
            sequence,
        ))
    }

    /// Create a cursor over the read snapshot
    ///
    /// The cursor holds the snapshot until it is closed. With no explicit
    /// snapshot, a fresh one is taken at the latest published sequence.
    pub fn new_cursor(&self, options: &ReadOptions) -> Result<Cursor> {
        let snapshot = match &options.snapshot {
            Some(snapshot) => snapshot.clone(),
            None => self.get_snapshot(),
        };
        let iter = self.iter(&ReadOptions::with_snapshot(snapshot.clone()))?;

        Ok(Cursor::with_options(
            Box::new(iter),
            Some(snapshot),
            self.scheduler.clone(),
            Arc::clone(&self.statistics),
            self.options.max_key_size,
        ))
    }

    /// Create a snapshot at the latest published sequence number
    pub fn get_snapshot(&self) -> Snapshot {
        self.snapshots.acquire(self.latest_sequence())
    }

    /// Give up this handle on a snapshot.
    ///
    /// The snapshot is released once no cursor or other clone holds it.
    pub fn release_snapshot(&self, snapshot: Snapshot) {
        trace!(
            sequence = snapshot.sequence(),
            holders = snapshot.holders(),
            "release snapshot handle"
        );
        drop(snapshot);
    }

    pub fn num_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    pub fn oldest_snapshot_sequence(&self) -> Option<u64> {
        self.snapshots.oldest()
    }

    pub fn latest_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    pub fn num_immutable_memtables(&self) -> usize {
        self.memtables.read().imm.len()
    }

    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.statistics
    }

    /// Scheduler that runs cursor positioning; drain it to receive
    /// completions.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn options(&self) -> &DBOptions {
        &self.options
    }
}
