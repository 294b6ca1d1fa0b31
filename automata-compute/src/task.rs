//! # Task Handles
//!
//! A partition's work is a unit submitted to the worker pool. Whoever
//! needs its result blocks on the returned [`TaskHandle`]; nobody polls.
//!
//! A handle can also be created before its work is known
//! ([`TaskHandle::pending`]), so the cascade can hand out every partition's
//! handle when a step starts and dispatch the work later from the worker
//! that finished the previous partition.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rayon::ThreadPool;

use automata_core::{AutomataError, AutomataResult};

#[derive(Debug, Default)]
struct Latch {
    done: Mutex<bool>,
    signal: Condvar,
}

impl Latch {
    fn set(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.signal.notify_all();
    }
}

/// Blocking handle on a unit of work
#[derive(Clone, Debug)]
pub struct TaskHandle {
    latch: Arc<Latch>,
}

/// The producing side of a [`TaskHandle`]; completes it when dropped
#[derive(Debug)]
pub struct Completion {
    latch: Arc<Latch>,
}

impl Completion {
    /// Mark the task finished
    pub fn complete(self) {}
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.latch.set();
    }
}

impl TaskHandle {
    /// A handle plus the completion that will release it
    pub fn pending() -> (TaskHandle, Completion) {
        let latch = Arc::new(Latch::default());
        (
            TaskHandle {
                latch: latch.clone(),
            },
            Completion { latch },
        )
    }

    /// A handle that is already finished
    pub fn finished() -> Self {
        let (handle, completion) = Self::pending();
        completion.complete();
        handle
    }

    /// Run `work` on the pool, completing the handle afterwards
    pub fn spawn<F>(pool: &ThreadPool, work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (handle, completion) = Self::pending();
        spawn_with(pool, completion, work);
        handle
    }

    pub fn is_finished(&self) -> bool {
        *self.latch.done.lock()
    }

    /// Block until the work has finished
    pub fn join(&self) {
        let mut done = self.latch.done.lock();
        while !*done {
            self.latch.signal.wait(&mut done);
        }
    }
}

/// Run `work` on the pool and release `completion` once it returns
pub fn spawn_with<F>(pool: &ThreadPool, completion: Completion, work: F)
where
    F: FnOnce() + Send + 'static,
{
    pool.spawn(move || {
        work();
        completion.complete();
    });
}

/// Worker pool for partition tasks and their data-parallel cells
///
/// `threads == 0` lets rayon pick one thread per core.
pub fn build_pool(threads: usize) -> AutomataResult<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("automata-worker-{}", i))
        .build()
        .map_err(|e| AutomataError::scheduler(format!("failed to build worker pool: {}", e)))
}
