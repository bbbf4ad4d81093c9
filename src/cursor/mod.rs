//! Closable cursor with asynchronous positioning.
//!
//! A [`Cursor`] owns one traversal over a snapshot of the store. Positioning
//! from scratch (`seek_to_first`, `seek_to_last`, `seek`, `seek_for_prev`)
//! may have to touch storage, so it runs on the [`Scheduler`]'s workers and
//! reports back through a completion handler. Stepping and reading
//! (`next`, `prev`, `key`, `value`, `valid`, `status`) are synchronous.
//!
//! # Usage
//!
//! ```ignore
//! let cursor = db.new_cursor(&ReadOptions::default())?;
//! cursor.seek("b", |result| result.expect("seek failed"))?;
//! db.scheduler().run_until_idle();
//! while cursor.valid()? {
//!     println!("{:?}", cursor.key()?);
//!     cursor.next()?;
//! }
//! // Exhausted or failed? Only the status can tell.
//! assert!(cursor.status()?.is_ok());
//! cursor.close();
//! ```
//!
//! # Preconditions
//!
//! One positioning call in flight per cursor. Until its handler has run,
//! every other operation on that cursor (close excepted) fails with
//! [`Error::IllegalState`], so the caller never sees a half-applied
//! position.
//!
//! # Errors
//!
//! Misuse (closed cursor, stepping while invalid, oversized target) fails
//! synchronously at the call site and the handler is not invoked. Storage
//! failures never fail `next`/`prev`; they are recorded and returned by
//! `status()`, and positioning also delivers them to its handler.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    error::{Error, Result},
    iterator::Iterator,
    scheduler::Scheduler,
    snapshot::Snapshot,
    statistics::Statistics,
    util::{self, Slice, Status},
};

pub const DEFAULT_MAX_KEY_SIZE: usize = 64 * 1024;

const CLOSED: &str = "iterator has been closed";
const IN_FLIGHT: &str = "positioning operation in flight";
const NOT_POSITIONED: &str = "iterator is not positioned on an entry";

static NEXT_CURSOR_ID: AtomicU64 = AtomicU64::new(1);

/// Traversal owned by a cursor.
pub type Traversal = Box<dyn Iterator + Send>;

pub struct Cursor {
    core: Arc<CursorCore>,
    scheduler: Scheduler,
    max_key_size: usize,
}

/// State shared between the cursor and its in-flight positioning task.
struct CursorCore {
    id: u64,
    state: Mutex<CursorState>,
    statistics: Arc<Statistics>,
}

struct CursorState {
    /// `None` while a positioning task holds the traversal, and after
    /// release.
    iter: Option<Traversal>,
    snapshot: Option<Snapshot>,
    /// Last storage error; ok when the last operation succeeded.
    status: Status,
    closed: bool,
    in_flight: bool,
    released: bool,
}

impl CursorState {
    fn ready(&mut self) -> Result<&mut Traversal> {
        if self.closed {
            return Err(Error::IllegalState(CLOSED));
        }
        self.iter.as_mut().ok_or(Error::IllegalState(IN_FLIGHT))
    }

    fn ready_ref(&self) -> Result<&Traversal> {
        if self.closed {
            return Err(Error::IllegalState(CLOSED));
        }
        self.iter.as_ref().ok_or(Error::IllegalState(IN_FLIGHT))
    }

    /// Hand out the traversal and snapshot for teardown, exactly once.
    fn release(&mut self) -> Option<(Option<Traversal>, Option<Snapshot>)> {
        if self.released {
            return None;
        }
        self.released = true;
        Some((self.iter.take(), self.snapshot.take()))
    }
}

/// Outcome of a positioning task, carried from the worker to the caller.
struct Positioned {
    iter: Traversal,
    /// `None` when the task skipped positioning.
    status: Option<Status>,
    result: Result<()>,
}

impl CursorCore {
    /// Drop released resources outside the state lock.
    fn dispose(&self, released: Option<(Option<Traversal>, Option<Snapshot>)>) {
        if let Some((iter, snapshot)) = released {
            let sequence = snapshot.as_ref().map(Snapshot::sequence);
            drop(iter);
            drop(snapshot);
            self.statistics.record_cursor_closed();
            debug!(cursor = self.id, ?sequence, "cursor released");
        }
    }

    /// Worker side of a positioning call.
    ///
    /// The traversal travels back to the caller inside the returned
    /// [`Positioned`]; nothing about the new position is visible until the
    /// completion hands it to [`CursorCore::finish`].
    fn run_positioning<F>(&self, mut iter: Traversal, op: &'static str, position: F) -> Positioned
    where
        F: FnOnce(&mut Traversal) -> util::Result<bool>,
    {
        if self.state.lock().closed {
            trace!(cursor = self.id, op, "cursor closed before task started");
            return Positioned {
                iter,
                status: None,
                result: Err(Error::IllegalState(CLOSED)),
            };
        }

        let result = position(&mut iter);
        self.statistics.record_seek();
        let status = match &result {
            Ok(valid) => {
                trace!(cursor = self.id, op, valid, "positioned");
                Status::ok()
            },
            Err(status) => {
                self.statistics.record_error();
                warn!(cursor = self.id, op, %status, "positioning failed");
                status.clone()
            },
        };

        Positioned {
            iter,
            status: Some(status),
            result: result.map(|_| ()).map_err(Error::from),
        }
    }

    /// Caller side of a positioning call: publish the new position, or tear
    /// down if the cursor was closed meanwhile.
    fn finish(&self, positioned: Positioned) -> Result<()> {
        let Positioned {
            iter,
            status,
            result,
        } = positioned;

        let mut state = self.state.lock();
        state.in_flight = false;
        if let Some(status) = status {
            state.status = status;
        }
        if state.closed {
            let released = state.release();
            drop(state);
            drop(iter);
            self.dispose(released);
        } else {
            state.iter = Some(iter);
        }
        result
    }

    /// The worker panicked and the traversal is gone with it.
    fn abort(&self) {
        let mut state = self.state.lock();
        state.in_flight = false;
        state.closed = true;
        let released = state.release();
        drop(state);
        self.dispose(released);
    }
}

impl Cursor {
    /// Wrap `iter` into a cursor that keeps `snapshot` pinned until it is
    /// closed.
    pub fn new(iter: Traversal, snapshot: Option<Snapshot>, scheduler: Scheduler) -> Self {
        Self::with_options(
            iter,
            snapshot,
            scheduler,
            Arc::new(Statistics::new()),
            DEFAULT_MAX_KEY_SIZE,
        )
    }

    pub(crate) fn with_options(
        iter: Traversal,
        snapshot: Option<Snapshot>,
        scheduler: Scheduler,
        statistics: Arc<Statistics>,
        max_key_size: usize,
    ) -> Self {
        let id = NEXT_CURSOR_ID.fetch_add(1, Ordering::Relaxed);
        statistics.record_cursor_created();
        debug!(
            cursor = id,
            sequence = ?snapshot.as_ref().map(Snapshot::sequence),
            "cursor created"
        );

        Cursor {
            core: Arc::new(CursorCore {
                id,
                state: Mutex::new(CursorState {
                    iter: Some(iter),
                    snapshot,
                    status: Status::ok(),
                    closed: false,
                    in_flight: false,
                    released: false,
                }),
                statistics,
            }),
            scheduler,
            max_key_size,
        }
    }

    /// Process-unique id, used in log output.
    pub fn id(&self) -> u64 {
        self.core.id
    }

    /// Snapshot this cursor reads from.
    pub fn snapshot(&self) -> Result<Option<Snapshot>> {
        let state = self.core.state.lock();
        state.ready_ref()?;
        Ok(state.snapshot.clone())
    }

    /// True if the cursor denotes an entry.
    pub fn valid(&self) -> Result<bool> {
        let state = self.core.state.lock();
        Ok(state.ready_ref()?.valid())
    }

    /// Position at the smallest key.
    pub fn seek_to_first<C>(&self, callback: C) -> Result<()>
    where
        C: FnOnce(Result<()>) + Send + 'static,
    {
        self.schedule("seek_to_first", |iter| iter.seek_to_first(), callback)
    }

    /// Position at the largest key.
    pub fn seek_to_last<C>(&self, callback: C) -> Result<()>
    where
        C: FnOnce(Result<()>) + Send + 'static,
    {
        self.schedule("seek_to_last", |iter| iter.seek_to_last(), callback)
    }

    /// Position at the smallest key >= `target`.
    ///
    /// `target` is captured as an owned, immutable slice, so the caller's
    /// buffer does not need to outlive the call.
    pub fn seek<C>(&self, target: impl Into<Slice>, callback: C) -> Result<()>
    where
        C: FnOnce(Result<()>) + Send + 'static,
    {
        let target = self.check_target(target.into())?;
        self.schedule("seek", move |iter| iter.seek(&target), callback)
    }

    /// Position at the largest key <= `target`.
    pub fn seek_for_prev<C>(&self, target: impl Into<Slice>, callback: C) -> Result<()>
    where
        C: FnOnce(Result<()>) + Send + 'static,
    {
        let target = self.check_target(target.into())?;
        self.schedule(
            "seek_for_prev",
            move |iter| iter.seek_for_prev(&target),
            callback,
        )
    }

    /// Advance to the next larger key. The cursor must be valid.
    pub fn next(&self) -> Result<()> {
        self.step(|iter| iter.next())
    }

    /// Move to the next smaller key. The cursor must be valid.
    pub fn prev(&self) -> Result<()> {
        self.step(|iter| iter.prev())
    }

    /// Current key, `None` when the cursor is not valid.
    pub fn key(&self) -> Result<Option<Slice>> {
        let state = self.core.state.lock();
        let iter = state.ready_ref()?;
        Ok(iter.valid().then(|| iter.key()))
    }

    /// Current value, `None` when the cursor is not valid.
    pub fn value(&self) -> Result<Option<Slice>> {
        let state = self.core.state.lock();
        let iter = state.ready_ref()?;
        Ok(iter.valid().then(|| iter.value()))
    }

    /// Storage error recorded by the last positioning or step.
    ///
    /// An invalid cursor with an ok status is exhausted; with a non-ok
    /// status it stopped on a failure.
    pub fn status(&self) -> Result<Status> {
        let state = self.core.state.lock();
        let iter = state.ready_ref()?;
        if !state.status.is_ok() {
            return Ok(state.status.clone());
        }
        Ok(iter.status())
    }

    /// Release the traversal and the snapshot reference.
    ///
    /// Closing twice is harmless. If a positioning task is in flight the
    /// release happens when its completion is delivered, right before its
    /// handler runs.
    pub fn close(&self) {
        let mut state = self.core.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        if state.in_flight {
            debug!(cursor = self.core.id, "close deferred until positioning completion");
            return;
        }
        let released = state.release();
        drop(state);
        self.core.dispose(released);
    }

    pub fn is_closed(&self) -> bool {
        self.core.state.lock().closed
    }

    fn check_target(&self, target: Slice) -> Result<Slice> {
        if target.size() > self.max_key_size {
            return Err(Error::InvalidArgument(format!(
                "seek target of {} bytes exceeds max key size {}",
                target.size(),
                self.max_key_size
            )));
        }
        Ok(target)
    }

    fn step<F>(&self, step: F) -> Result<()>
    where
        F: FnOnce(&mut Traversal) -> util::Result<bool>,
    {
        let mut state = self.core.state.lock();
        let iter = state.ready()?;
        if !iter.valid() {
            return Err(Error::IllegalState(NOT_POSITIONED));
        }

        let result = step(iter);
        self.core.statistics.record_step();
        match result {
            Ok(_) => state.status = Status::ok(),
            Err(status) => {
                self.core.statistics.record_error();
                warn!(cursor = self.core.id, %status, "step failed");
                state.status = status;
            },
        }
        Ok(())
    }

    fn schedule<F, C>(&self, op: &'static str, position: F, callback: C) -> Result<()>
    where
        F: FnOnce(&mut Traversal) -> util::Result<bool> + Send + 'static,
        C: FnOnce(Result<()>) + Send + 'static,
    {
        let iter = {
            let mut state = self.core.state.lock();
            state.ready()?;
            state.in_flight = true;
            state.iter.take().ok_or(Error::IllegalState(IN_FLIGHT))?
        };
        trace!(cursor = self.core.id, op, "positioning scheduled");

        let worker_core = Arc::clone(&self.core);
        let caller_core = Arc::clone(&self.core);
        self.scheduler.submit(
            move || worker_core.run_positioning(iter, op, position),
            move |outcome| {
                let result = match outcome {
                    Ok(positioned) => caller_core.finish(positioned),
                    Err(err) => {
                        caller_core.abort();
                        Err(err)
                    },
                };
                callback(result)
            },
        );
        Ok(())
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.close();
    }
}
