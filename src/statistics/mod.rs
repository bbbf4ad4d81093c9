use std::sync::atomic::{AtomicU64, Ordering};

/// Database-wide statistics
///
/// Thread-safe counters for writes, point reads, and the cursor lifecycle.
/// Uses atomic counters for lock-free updates from caller and worker threads.
#[derive(Debug, Default)]
pub struct Statistics {
    // Database operations
    pub num_keys_written: AtomicU64,
    pub num_keys_read: AtomicU64,
    pub num_keys_deleted: AtomicU64,

    // Bytes transferred
    pub bytes_written: AtomicU64,
    pub bytes_read: AtomicU64,

    // MemTable operations
    pub num_memtable_rotations: AtomicU64,

    // Cursor lifecycle and positioning
    pub num_cursors_created: AtomicU64,
    pub num_cursors_closed: AtomicU64,
    pub num_seeks: AtomicU64,
    pub num_steps: AtomicU64,

    // Error counts
    pub num_errors: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Statistics::default()
    }

    #[inline]
    pub fn record_write(&self, bytes: u64) {
        self.num_keys_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_read(&self, bytes: u64) {
        self.num_keys_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delete(&self) {
        self.num_keys_deleted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_memtable_rotation(&self) {
        self.num_memtable_rotations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cursor_created(&self) {
        self.num_cursors_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cursor_closed(&self) {
        self.num_cursors_closed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_seek(&self) {
        self.num_seeks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_step(&self) {
        self.num_steps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.num_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Getters (snapshot values)
    pub fn num_keys_written(&self) -> u64 {
        self.num_keys_written.load(Ordering::Relaxed)
    }

    pub fn num_keys_read(&self) -> u64 {
        self.num_keys_read.load(Ordering::Relaxed)
    }

    pub fn num_keys_deleted(&self) -> u64 {
        self.num_keys_deleted.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn num_memtable_rotations(&self) -> u64 {
        self.num_memtable_rotations.load(Ordering::Relaxed)
    }

    pub fn num_cursors_created(&self) -> u64 {
        self.num_cursors_created.load(Ordering::Relaxed)
    }

    pub fn num_cursors_closed(&self) -> u64 {
        self.num_cursors_closed.load(Ordering::Relaxed)
    }

    /// Cursors created and not yet torn down.
    pub fn num_open_cursors(&self) -> u64 {
        self.num_cursors_created()
            .saturating_sub(self.num_cursors_closed())
    }

    pub fn num_seeks(&self) -> u64 {
        self.num_seeks.load(Ordering::Relaxed)
    }

    pub fn num_steps(&self) -> u64 {
        self.num_steps.load(Ordering::Relaxed)
    }

    pub fn num_errors(&self) -> u64 {
        self.num_errors.load(Ordering::Relaxed)
    }

    /// Reset all statistics to zero
    pub fn reset(&self) {
        self.num_keys_written.store(0, Ordering::Relaxed);
        self.num_keys_read.store(0, Ordering::Relaxed);
        self.num_keys_deleted.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.num_memtable_rotations.store(0, Ordering::Relaxed);
        self.num_cursors_created.store(0, Ordering::Relaxed);
        self.num_cursors_closed.store(0, Ordering::Relaxed);
        self.num_seeks.store(0, Ordering::Relaxed);
        self.num_steps.store(0, Ordering::Relaxed);
        self.num_errors.store(0, Ordering::Relaxed);
    }

    /// Get a formatted statistics report
    pub fn report(&self) -> String {
        format!(
            "Database Statistics:\n\
            \n\
            Operations:\n\
            - Keys written:  {}\n\
            - Keys read:     {}\n\
            - Keys deleted:  {}\n\
            - Bytes written: {}\n\
            - Bytes read:    {}\n\
            \n\
            MemTable:\n\
            - Rotations:     {}\n\
            \n\
            Cursors:\n\
            - Created:       {}\n\
            - Closed:        {}\n\
            - Seeks:         {}\n\
            - Steps:         {}\n\
            \n\
            Errors:          {}\n",
            self.num_keys_written(),
            self.num_keys_read(),
            self.num_keys_deleted(),
            self.bytes_written(),
            self.bytes_read(),
            self.num_memtable_rotations(),
            self.num_cursors_created(),
            self.num_cursors_closed(),
            self.num_seeks(),
            self.num_steps(),
            self.num_errors(),
        )
    }
}
