//! Bounded-concurrency task group.
//!
//! # Usage
//!
//! ```
//! use cmdutil::WorkerGroup;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let group = WorkerGroup::new(4);
//! let done = Arc::new(AtomicUsize::new(0));
//! for _ in 0..10 {
//!     let done = Arc::clone(&done);
//!     group.run(move || {
//!         done.fetch_add(1, Ordering::SeqCst);
//!     });
//! }
//! group.wait();
//! assert_eq!(done.load(Ordering::SeqCst), 10);
//! ```
//!
//! `run` blocks the caller only until one of the `max` slots is free; the
//! task itself runs on its own thread. Tasks report their own errors, the
//! group collects nothing.

use once_cell::sync::OnceCell;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

/// Counting admission gate.
#[derive(Debug)]
struct Gate {
    slots: usize,
    avail: Mutex<usize>,
    cv: Condvar,
}

impl Gate {
    fn new(slots: usize) -> Arc<Self> {
        Arc::new(Self {
            slots,
            avail: Mutex::new(slots),
            cv: Condvar::new(),
        })
    }

    fn acquire(self: &Arc<Self>) -> Permit {
        let mut avail = lock(&self.avail);
        while *avail == 0 {
            avail = self.cv.wait(avail).unwrap_or_else(|e| e.into_inner());
        }
        *avail -= 1;
        Permit { gate: Arc::clone(self) }
    }
}

/// One admission slot; released on drop, also when the task panics.
struct Permit {
    gate: Arc<Gate>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        *lock(&self.gate.avail) += 1;
        self.gate.cv.notify_one();
    }
}

/// Number of submitted tasks that have not finished.
#[derive(Debug, Default)]
struct Pending {
    count: Mutex<usize>,
    cv: Condvar,
}

struct Done(Arc<Pending>);

impl Drop for Done {
    fn drop(&mut self) {
        let mut count = lock(&self.0.count);
        *count -= 1;
        if *count == 0 {
            self.0.cv.notify_all();
        }
    }
}

/// Runs closures on threads, at most `max` at a time.
#[derive(Debug)]
pub struct WorkerGroup {
    /// Maximum number of concurrently running tasks; zero means one
    pub max: usize,

    gate: OnceCell<Arc<Gate>>,
    pending: Arc<Pending>,
}

impl Default for WorkerGroup {
    fn default() -> Self {
        Self::new(1)
    }
}

impl WorkerGroup {
    /// Creates a group running at most `max` tasks at once.
    pub fn new(max: usize) -> Self {
        Self {
            max,
            gate: OnceCell::new(),
            pending: Arc::new(Pending::default()),
        }
    }

    /// Concurrency limit in effect.
    ///
    /// Fixed by the first call to [`run`](Self::run); changing `max` after
    /// that has no effect.
    pub fn limit(&self) -> usize {
        self.gate.get().map_or_else(|| self.slots(), |gate| gate.slots)
    }

    fn slots(&self) -> usize {
        self.max.max(1)
    }

    /// Waits for a free slot, then runs `task` on a new thread.
    pub fn run<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let gate = self.gate.get_or_init(|| Gate::new(self.slots()));
        let permit = gate.acquire();

        *lock(&self.pending.count) += 1;
        let done = Done(Arc::clone(&self.pending));

        thread::spawn(move || {
            let _done = done;
            let _permit = permit;
            task();
        });
    }

    /// Blocks until every submitted task has finished.
    pub fn wait(&self) {
        let mut count = lock(&self.pending.count);
        while *count > 0 {
            count = self.pending.cv.wait(count).unwrap_or_else(|e| e.into_inner());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_max_means_one() {
        let group = WorkerGroup::new(0);
        assert_eq!(group.limit(), 1);
        assert_eq!(WorkerGroup::default().limit(), 1);
    }

    #[test]
    fn test_wait_without_tasks_returns() {
        WorkerGroup::new(3).wait();
    }

    #[test]
    fn test_panicking_task_releases_slot() {
        let group = WorkerGroup::new(1);
        group.run(|| panic!("task failed"));
        group.wait();

        let (tx, rx) = std::sync::mpsc::channel();
        group.run(move || tx.send(7).unwrap());
        group.wait();
        assert_eq!(rx.recv().unwrap(), 7);
    }
}
