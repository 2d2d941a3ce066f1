//! Deferred-dispatch work queue.
//!
//! A single queue is created at boot and shared (by cheap `Clone`) with
//! every observable that runs in deferred mode.  The idle loop drains it
//! one job per call, **most recently queued first**.  The LIFO order is
//! global across all observables sharing the queue, not per observable.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::Rc;

type Job = Box<dyn FnOnce()>;

#[derive(Default)]
struct Jobs {
    stack: RefCell<Vec<Job>>,
    peak: Cell<usize>,
}

/// Process-wide LIFO queue of pending subscriber invocations.
#[derive(Clone, Default)]
pub struct DeferredQueue {
    jobs: Rc<Jobs>,
}

impl DeferredQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, job: impl FnOnce() + 'static) {
        let mut stack = self.jobs.stack.borrow_mut();
        stack.push(Box::new(job));
        if stack.len() > self.jobs.peak.get() {
            self.jobs.peak.set(stack.len());
        }
    }

    /// Run the most recently queued job.  Returns `false` when the queue
    /// was empty.
    ///
    /// The job runs after the queue borrow is released, so it may queue
    /// further work.
    pub fn drain_one(&self) -> bool {
        let job = self.jobs.stack.borrow_mut().pop();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until the queue is empty, including jobs queued while
    /// draining.  Returns the number of jobs run.
    pub fn drain_all(&self) -> usize {
        let mut ran = 0;
        while self.drain_one() {
            ran += 1;
        }
        ran
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.jobs.stack.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest number of jobs ever pending at once.
    pub fn peak_len(&self) -> usize {
        self.jobs.peak.get()
    }

    /// Drop every pending job without running it.
    pub fn clear(&self) {
        self.jobs.stack.borrow_mut().clear();
    }
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("len", &self.len())
            .field("peak", &self.peak_len())
            .finish()
    }
}
