//! Enqueue-order execution of asynchronous side effects.

use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;

use tokio::sync::mpsc;

type SerialTask = Pin<Box<dyn Future<Output = ControlFlow<()>> + Send>>;

/// Runs queued futures one at a time, in enqueue order.
///
/// [`enqueue`](Self::enqueue) returns immediately; each task starts only
/// after the previous one has completed, so side effects are observed in
/// enqueue order no matter when the data they wait on becomes ready. This
/// is what lets the receiver fetch chunks concurrently while still
/// delivering them to the consumer in chunk-number order.
///
/// A task decides whether the queue proceeds: [`ControlFlow::Continue`]
/// runs the next task (a task that handled its own failure does not block
/// its successors), [`ControlFlow::Break`] stops the executor and drops
/// everything still queued.
pub struct SerialExecutor {
    tx: mpsc::UnboundedSender<SerialTask>,
}

impl SerialExecutor {
    /// Creates the executor and spawns its worker on the runtime.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SerialTask>();
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                if task.await.is_break() {
                    break;
                }
            }
        });
        Self { tx }
    }

    /// Appends `task` to the queue and returns without waiting for it.
    ///
    /// After the executor has stopped (a task returned `Break`), further
    /// enqueued tasks are dropped unrun.
    pub fn enqueue<F>(&self, task: F)
    where
        F: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let _ = self.tx.send(Box::pin(task));
    }
}

impl Default for SerialExecutor {
    fn default() -> Self {
        Self::new()
    }
}
