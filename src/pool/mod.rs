//! Fixed-size worker pool executing submitted futures
//!
//! A single FIFO feeds a fixed number of worker tasks. Connection handlers run here
//! rather than as unbounded `tokio::spawn` calls, so the number of concurrently
//! executing handlers is capped by configuration. Shutdown completes in-flight work,
//! discards the backlog, and joins every worker.

use crate::{LogCasterError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

/// Default worker count
pub const DEFAULT_WORKERS: usize = 4;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fixed-size pool draining one FIFO of submitted futures
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<Job>,
    shutdown_tx: broadcast::Sender<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
    pending: Arc<AtomicUsize>,
    idle_notify: Arc<Notify>,
}

impl WorkerPool {
    /// Spawn a pool of `workers` tasks (clamped to [1, 32])
    pub fn new(workers: usize) -> Self {
        let workers = workers.clamp(1, 32);
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let (shutdown_tx, _) = broadcast::channel(1);
        let rx = Arc::new(Mutex::new(rx));
        let pending = Arc::new(AtomicUsize::new(0));
        let idle_notify = Arc::new(Notify::new());

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let rx = Arc::clone(&rx);
            let pending = Arc::clone(&pending);
            let idle_notify = Arc::clone(&idle_notify);
            let mut shutdown_rx = shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = shutdown_rx.recv() => break,
                            job = rx.recv() => job,
                        }
                    };
                    match job {
                        Some(job) => {
                            job.await;
                            pending.fetch_sub(1, Ordering::SeqCst);
                            idle_notify.notify_waiters();
                        }
                        None => break,
                    }
                }
                debug!("worker {} exiting", id);
            }));
        }

        Self {
            tx,
            shutdown_tx,
            workers: Mutex::new(handles),
            closed: AtomicBool::new(false),
            pending,
            idle_notify,
        }
    }

    /// Submit a future for execution.
    ///
    /// Non-blocking; fails once shutdown has begun.
    pub fn submit<F>(&self, future: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LogCasterError::Server(
                "Worker pool is shut down".to_string(),
            ));
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(Box::pin(future)).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            LogCasterError::Server("Worker pool is shut down".to_string())
        })
    }

    /// Block until the queue is empty and no worker is executing
    pub async fn wait(&self) {
        loop {
            let notified = self.idle_notify.notified();
            tokio::pin!(notified);
            // Register before re-checking the counter so a completion between the
            // check and the await cannot be missed
            notified.as_mut().enable();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Signal all workers, let in-flight tasks finish, discard queued-but-unstarted
    /// tasks, and join every worker
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_executes_submitted_tasks() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let counter = counter.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait().await;
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_wait_returns_when_idle() {
        let pool = WorkerPool::new(1);
        pool.submit(async {
            sleep(Duration::from_millis(50)).await;
        })
        .unwrap();

        timeout(Duration::from_secs(2), pool.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_on_empty_pool_is_immediate() {
        let pool = WorkerPool::new(4);
        timeout(Duration::from_millis(100), pool.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(1);
        pool.shutdown().await;
        assert!(pool.submit(async {}).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_completes_in_flight_task() {
        let pool = WorkerPool::new(1);
        let done = Arc::new(AtomicBool::new(false));

        let flag = done.clone();
        pool.submit(async move {
            sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        // Give the worker a beat to pick the task up, then shut down
        sleep(Duration::from_millis(10)).await;
        timeout(Duration::from_secs(2), pool.shutdown()).await.unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_shutdown_discards_backlog() {
        let pool = WorkerPool::new(1);
        let executed = Arc::new(AtomicUsize::new(0));

        // First task blocks the sole worker long enough for shutdown to land
        let counter = executed.clone();
        pool.submit(async move {
            sleep(Duration::from_millis(100)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        for _ in 0..5 {
            let counter = executed.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        sleep(Duration::from_millis(10)).await;
        pool.shutdown().await;

        // Only the in-flight task ran; the backlog was discarded
        assert_eq!(executed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_workers_share_the_queue() {
        let pool = WorkerPool::new(4);
        let peak = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let peak = peak.clone();
            let live = live.clone();
            pool.submit(async move {
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(30)).await;
                live.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait().await;
        assert!(peak.load(Ordering::SeqCst) > 1, "expected parallel execution");
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }
}
