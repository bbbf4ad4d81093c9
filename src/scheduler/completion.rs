use std::{collections::VecDeque, time::Instant};

use parking_lot::{Condvar, Mutex};

/// Completion notification ready to run on the caller's thread.
pub(crate) type Completion = Box<dyn FnOnce() + Send>;

/// Single-consumer queue of finished tasks.
///
/// Workers push, the caller's thread pops and runs. `outstanding` counts
/// tasks from submission until their completion has been run, so an empty
/// queue with `outstanding == 0` means nothing more will ever arrive.
#[derive(Default)]
pub(crate) struct CompletionQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Completion>,
    outstanding: usize,
}

impl CompletionQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A task was submitted; its completion is now owed.
    pub(crate) fn begin(&self) {
        self.state.lock().outstanding += 1;
    }

    pub(crate) fn push(&self, completion: Completion) {
        self.state.lock().ready.push_back(completion);
        self.ready.notify_all();
    }

    pub(crate) fn try_pop(&self) -> Option<Completion> {
        self.state.lock().ready.pop_front()
    }

    /// Block until a completion is ready, nothing is outstanding, or the
    /// deadline passes.
    pub(crate) fn wait_pop(&self, deadline: Option<Instant>) -> Option<Completion> {
        let mut state = self.state.lock();
        loop {
            if let Some(completion) = state.ready.pop_front() {
                return Some(completion);
            }
            if state.outstanding == 0 {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out() {
                        return state.ready.pop_front();
                    }
                },
                None => self.ready.wait(&mut state),
            }
        }
    }

    /// Run one completion and settle its debt, even if it panics.
    pub(crate) fn run(&self, completion: Completion) {
        struct Settle<'a>(&'a CompletionQueue);

        impl Drop for Settle<'_> {
            fn drop(&mut self) {
                let mut state = self.0.state.lock();
                state.outstanding -= 1;
                if state.outstanding == 0 {
                    self.0.ready.notify_all();
                }
            }
        }

        let _settle = Settle(self);
        completion();
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }
}
