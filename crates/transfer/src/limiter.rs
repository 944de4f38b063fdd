//! Counting admission gate for in-flight transfer tasks.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Bounds how many asynchronous tasks may run at once.
///
/// [`admit_and_run`](Self::admit_and_run) resolves as soon as a slot is
/// granted and hands back a [`JoinHandle`] to the task's eventual output,
/// so a caller can record admission order synchronously and await the
/// results later. Waiters are admitted strictly in arrival order; a freed
/// slot wakes exactly one queued waiter.
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter with the given capacity (clamped to at least 1).
    ///
    /// Capacity is fixed for the limiter's lifetime.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot, then starts `task` on the runtime.
    ///
    /// The returned handle carries the task's output; a failing or
    /// panicking task still releases its slot.
    pub async fn admit_and_run<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore closed");
        tokio::spawn(async move {
            let output = task.await;
            drop(permit);
            output
        })
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
