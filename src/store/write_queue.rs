//! Serial write queue: runs submitted write tasks one at a time, in order.
//!
//! A single worker task drains an unbounded channel. Each submission carries
//! a oneshot sender so its originator gets exactly its own result back. The
//! worker awaits every task to completion before taking the next one, so a
//! task always observes the full effects of the task submitted before it.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::WriteQueueError;

/// A type-erased write task. Resolves to a failure description, if any, so
/// the worker can log it without knowing the task's result type.
type WriteTask = Box<dyn FnOnce() -> BoxFuture<'static, Option<String>> + Send>;

/// Handle to the serial write lane. Cheap to clone; all clones feed the same
/// worker.
///
/// The queue is unbounded. Callers that submit faster than the worker drains
/// grow memory without limit.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<WriteTask>,
    pending: Arc<AtomicUsize>,
}

impl WriteQueue {
    /// Create a queue and spawn its worker. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        tokio::spawn(run_worker(rx, Arc::clone(&pending)));
        Self { tx, pending }
    }

    /// Number of submitted tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Enqueue a write task.
    ///
    /// The task is placed in the queue before this returns, so submission
    /// order is call order. The returned future resolves once the task has
    /// run; dropping it does not withdraw the task.
    pub fn submit<F, Fut, T, E>(
        &self,
        task: F,
    ) -> impl Future<Output = Result<T, E>> + Send + use<F, Fut, T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<WriteQueueError> + std::fmt::Display + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel::<Result<T, E>>();

        let erased: WriteTask = Box::new(move || {
            async move {
                match AssertUnwindSafe(async move { task().await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => {
                        let failure = result.as_ref().err().map(|e| e.to_string());
                        // Originator may have stopped listening; the write still happened.
                        let _ = result_tx.send(result);
                        failure
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        let _ = result_tx.send(Err(WriteQueueError::Panicked(message.clone()).into()));
                        Some(format!("panicked: {message}"))
                    }
                }
            }
            .boxed()
        });

        self.pending.fetch_add(1, Ordering::AcqRel);
        let enqueued = self.tx.send(erased).is_ok();
        if !enqueued {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }

        async move {
            if !enqueued {
                return Err(WriteQueueError::Closed.into());
            }
            match result_rx.await {
                Ok(result) => result,
                Err(_) => Err(WriteQueueError::Closed.into()),
            }
        }
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<WriteTask>, pending: Arc<AtomicUsize>) {
    debug!("Write queue worker started");

    while let Some(task) = rx.recv().await {
        if let Some(reason) = task().await {
            warn!(error = %reason, "Write task failed");
        }
        pending.fetch_sub(1, Ordering::AcqRel);
    }

    debug!("Write queue worker stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::*;
    use crate::error::StorageError;

    #[tokio::test]
    async fn returns_task_result() {
        let queue = WriteQueue::new();
        let value = queue.submit(|| async { Ok::<u32, StorageError>(7) }).await;
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test]
    async fn runs_tasks_in_submission_order() {
        let queue = WriteQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..50u64)
            .map(|i| {
                let seen = Arc::clone(&seen);
                // Uneven sleeps; completion order must still match submission.
                queue.submit(move || async move {
                    tokio::time::sleep(Duration::from_millis((50 - i) % 5)).await;
                    seen.lock().await.push(i);
                    Ok::<_, StorageError>(())
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        let seen = seen.lock().await;
        assert_eq!(*seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn never_runs_two_tasks_at_once() {
        let queue = WriteQueue::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                queue.submit(move || async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, StorageError>(())
                })
            })
            .collect();

        futures::future::join_all(handles).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_only_rejects_its_own_originator() {
        let queue = WriteQueue::new();

        let first = queue.submit(|| async { Ok::<_, StorageError>(1) });
        let failing = queue.submit(|| async {
            Err::<u32, _>(StorageError::DuplicateId { id: "x".into() })
        });
        let last = queue.submit(|| async { Ok::<_, StorageError>(3) });

        assert_eq!(first.await.unwrap(), 1);
        assert!(matches!(
            failing.await,
            Err(StorageError::DuplicateId { .. })
        ));
        assert_eq!(last.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn panicking_task_does_not_stall_the_queue() {
        let queue = WriteQueue::new();

        let boom = queue.submit(|| async {
            if true {
                panic!("boom");
            }
            Ok::<u32, StorageError>(0)
        });
        let after = queue.submit(|| async { Ok::<_, StorageError>(42) });

        match boom.await {
            Err(StorageError::Queue(WriteQueueError::Panicked(msg))) => assert_eq!(msg, "boom"),
            other => panic!("expected panic error, got {other:?}"),
        }
        assert_eq!(after.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn dropped_handle_still_runs_task() {
        let queue = WriteQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        drop(queue.submit(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, StorageError>(())
        }));

        // A later task completing proves the earlier one already ran.
        queue
            .submit(|| async { Ok::<_, StorageError>(()) })
            .await
            .unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
