//! Fixed-size worker pool with a bounded task queue.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::trace;

type Task = BoxFuture<'static, ()>;

/// Error returned when submitting to a stopped pool.
#[derive(Debug, thiserror::Error)]
#[error("worker pool is stopped")]
pub struct PoolClosed;

/// A fixed number of concurrent executors fed from a bounded queue.
///
/// [`WorkerPool::submit`] applies backpressure: when all executors are busy
/// and the queue is full, it waits for a slot instead of dropping the task
/// or growing an unbounded backlog.
#[derive(Debug)]
pub struct WorkerPool {
    tx: Mutex<Option<mpsc::Sender<Task>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `workers` executors over a queue of `queue_capacity` slots.
    #[must_use]
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Task>(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let task = rx.lock().await.recv().await;
                        match task {
                            Some(task) => task.await,
                            None => break,
                        }
                    }
                    trace!(worker, "executor exiting");
                })
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
        }
    }

    /// Queue a task, waiting for a slot while the pool is saturated.
    ///
    /// # Errors
    ///
    /// Returns [`PoolClosed`] if the pool has been stopped.
    pub async fn submit<F>(&self, task: F) -> Result<(), PoolClosed>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tx = self.tx.lock().await.clone();
        match tx {
            Some(tx) => tx.send(Box::pin(task)).await.map_err(|_| PoolClosed),
            None => Err(PoolClosed),
        }
    }

    /// Stop accepting tasks, drain the queue and in-flight work, and join
    /// the executors. Safe to call more than once.
    pub async fn stop(&self) {
        drop(self.tx.lock().await.take());

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "executor panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn saturation_blocks_submission_without_dropping() {
        let pool = WorkerPool::new(2, 2);
        let gate = Arc::new(Semaphore::new(0));
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let blocking_task = || {
            let gate = Arc::clone(&gate);
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                let _permit = gate.acquire().await.unwrap();
                finished.fetch_add(1, Ordering::SeqCst);
            }
        };

        // Fill both executors and wait until they hold their tasks.
        pool.submit(blocking_task()).await.unwrap();
        pool.submit(blocking_task()).await.unwrap();
        while started.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Fill the queue.
        pool.submit(blocking_task()).await.unwrap();
        pool.submit(blocking_task()).await.unwrap();

        // workers + queue_capacity tasks admitted; the next submission must
        // wait for a slot instead of being accepted or dropped.
        let overflow = pool.submit(blocking_task());
        assert!(
            tokio::time::timeout(Duration::from_millis(100), overflow)
                .await
                .is_err()
        );

        // Opening the gate frees slots and the pool drains everything.
        gate.add_permits(64);
        pool.submit(blocking_task()).await.unwrap();
        pool.stop().await;
        assert_eq!(finished.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_waits_for_queued_and_inflight_tasks() {
        let pool = WorkerPool::new(2, 8);
        let finished = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let finished = Arc::clone(&finished);
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }

        pool.stop().await;
        assert_eq!(finished.load(Ordering::SeqCst), 6);

        // Stopped pool rejects further work, and stopping again is safe.
        assert!(pool.submit(async {}).await.is_err());
        pool.stop().await;
    }
}
