//! Off-thread execution of positioning operations.
//!
//! Work submitted to a [`Scheduler`] runs on a rayon worker pool. When it
//! finishes, its completion is queued back to the caller, and runs only when
//! the caller drains the queue with [`Scheduler::poll`] or
//! [`Scheduler::run_until_idle`]. Completion handlers therefore always run on
//! the draining thread, one at a time, after the work's effects are in
//! place.
//!
//! ```ignore
//! scheduler.submit(|| expensive(), |outcome| println!("{outcome:?}"));
//! // ... keep doing caller-side work ...
//! scheduler.run_until_idle();
//! ```
//!
//! Dropping the last handle drains the queue: it waits for tasks still on
//! the workers and runs every pending completion on the dropping thread, so
//! each submitted handler still runs exactly once.

mod completion;

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant},
};

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use completion::CompletionQueue;

pub const DEFAULT_WORKER_THREADS: usize = 4;
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "cursor-worker";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    pub worker_threads: usize,
    pub thread_name_prefix: String,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        SchedulerOptions {
            worker_threads: DEFAULT_WORKER_THREADS,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

/// Worker pool plus the caller-side completion queue.
///
/// Cheap to clone; clones share the pool and the queue.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

struct Shared {
    pool: ThreadPool,
    completions: Arc<CompletionQueue>,
}

impl Scheduler {
    pub fn new(options: &SchedulerOptions) -> Result<Self> {
        if options.worker_threads == 0 {
            return Err(Error::InvalidArgument(
                "worker_threads must be at least 1".to_string(),
            ));
        }

        let prefix = options.thread_name_prefix.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.worker_threads)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("failed to build worker pool: {e}")))?;

        debug!(
            worker_threads = options.worker_threads,
            "scheduler started"
        );

        Ok(Scheduler {
            shared: Arc::new(Shared {
                pool,
                completions: Arc::new(CompletionQueue::new()),
            }),
        })
    }

    /// Run `work` on a worker, then queue `deliver(outcome)` for the caller.
    ///
    /// `deliver` is invoked exactly once, from [`Scheduler::poll`],
    /// [`Scheduler::run_until_idle`], or when the last handle is dropped. If
    /// `work` panics the outcome is `Err(Error::Aborted)`.
    pub fn submit<T, W, D>(&self, work: W, deliver: D)
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        D: FnOnce(Result<T>) + Send + 'static,
    {
        let completions = Arc::clone(&self.shared.completions);
        completions.begin();

        self.shared.pool.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work)).map_err(|_| {
                error!("scheduled task panicked");
                Error::Aborted
            });
            trace!("task finished, queueing completion");
            completions.push(Box::new(move || deliver(outcome)));
        });
    }

    /// Run every completion that is ready now, without blocking.
    ///
    /// Returns the number of handlers invoked.
    pub fn poll(&self) -> usize {
        let completions = &self.shared.completions;
        let mut ran = 0;
        while let Some(completion) = completions.try_pop() {
            completions.run(completion);
            ran += 1;
        }
        ran
    }

    /// Block, running completions as they arrive, until no submitted task is
    /// left, including tasks submitted by the handlers themselves.
    pub fn run_until_idle(&self) -> usize {
        let completions = &self.shared.completions;
        let mut ran = 0;
        while let Some(completion) = completions.wait_pop(None) {
            completions.run(completion);
            ran += 1;
        }
        ran
    }

    /// Like [`Scheduler::run_until_idle`] but gives up at `timeout`.
    ///
    /// Returns true if the scheduler became idle.
    pub fn run_until_idle_timeout(&self, timeout: Duration) -> bool {
        let completions = &self.shared.completions;
        let deadline = Instant::now() + timeout;
        while let Some(completion) = completions.wait_pop(Some(deadline)) {
            completions.run(completion);
        }
        completions.outstanding() == 0
    }

    /// Tasks submitted whose completion has not run yet.
    pub fn outstanding(&self) -> usize {
        self.shared.completions.outstanding()
    }

    pub fn worker_threads(&self) -> usize {
        self.shared.pool.current_num_threads()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let completions = &self.completions;
        let pending = completions.outstanding();
        if pending == 0 {
            return;
        }
        debug!(pending, "scheduler dropped, draining completions");

        // On a worker the task that dropped us cannot finish before we do;
        // run what is ready and leave the rest.
        if self.pool.current_thread_index().is_some() {
            while let Some(completion) = completions.try_pop() {
                completions.run(completion);
            }
            return;
        }
        while let Some(completion) = completions.wait_pop(None) {
            completions.run(completion);
        }
    }
}
