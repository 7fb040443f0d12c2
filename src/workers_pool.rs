//! # Workers Pool
//!
//! Bounded concurrent executor for a task set whose size is known up front.
//!
//! ## Overview
//!
//! - [`WorkersPool::new`] sizes the task queue to the declared task count, so every task
//!   can be enqueued with [`WorkersPool::add_task`] before the pool starts.
//! - [`WorkersPool::run`] starts the workers and waits until exactly that many tasks
//!   reported [`TaskOutcome::Done`].
//! - A task returning [`TaskOutcome::Retry`] is put back on the queue unchanged. Nothing
//!   bounds the number of retries; callers wrap `run` in a timeout if they need one.
//! - The first [`TaskOutcome::Fatal`] ends `run` with that error. Workers stop pulling new
//!   tasks; tasks already running finish on their own.
//! - Shutdown of the caller's signal ends `run` with [`PoolError::Cancelled`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pool = WorkersPool::new(8, addresses.len());
//! for address in addresses {
//!     pool.add_task(move |_shutdown| async move { fetch(address).await })?;
//! }
//! pool.run(shutdown).await?;
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::shutdown::{self, Shutdown};

/// Result of one task execution.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Counted towards completion.
    Done,
    /// Transient failure (rate limiting); the same task is queued again.
    Retry,
    /// Terminal failure for the whole run.
    Fatal(anyhow::Error),
}

impl<E: Into<anyhow::Error>> From<Result<(), E>> for TaskOutcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => TaskOutcome::Done,
            Err(e) => TaskOutcome::Fatal(e.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("workers pool cancelled")]
    Cancelled,
    #[error("task failed: {0:#}")]
    Task(anyhow::Error),
    #[error("more tasks added than the {0} declared")]
    TooManyTasks(usize),
    #[error("all workers exited with {completed} of {total} tasks completed")]
    WorkersExited { completed: usize, total: usize },
}

/// A re-runnable unit of work. Retries call the same closure again.
pub type Task = Arc<dyn Fn(Shutdown) -> BoxFuture<'static, TaskOutcome> + Send + Sync>;

pub struct WorkersPool {
    workers: usize,
    total: usize,
    queue_tx: mpsc::Sender<Task>,
    queue_rx: Arc<Mutex<mpsc::Receiver<Task>>>,
}

impl WorkersPool {
    /// `workers` concurrent workers over exactly `total` tasks.
    pub fn new(workers: usize, total: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(total.max(1));
        Self {
            workers: workers.max(1),
            total,
            queue_tx,
            queue_rx: Arc::new(Mutex::new(queue_rx)),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Enqueue one task. Never blocks: the queue holds every declared task.
    pub fn add_task<F, Fut>(&self, task: F) -> Result<(), PoolError>
    where
        F: Fn(Shutdown) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        let task: Task = Arc::new(move |shutdown| -> BoxFuture<'static, TaskOutcome> {
            Box::pin(task(shutdown))
        });
        self.queue_tx
            .try_send(task)
            .map_err(|_| PoolError::TooManyTasks(self.total))
    }

    /// Run all queued tasks to completion.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), PoolError> {
        if self.total == 0 {
            return Ok(());
        }

        let started = Instant::now();
        // Stops the workers once `run` returns, whatever the reason.
        let (stop_handle, stop) = shutdown::channel();
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<(Task, TaskOutcome)>();

        for id in 0..self.workers {
            tokio::spawn(worker(
                id,
                self.queue_rx.clone(),
                results_tx.clone(),
                shutdown.clone(),
                stop.clone(),
            ));
        }
        drop(results_tx);

        let mut parent = shutdown;
        let mut completed = 0usize;
        let mut retries = 0usize;

        let result = loop {
            tokio::select! {
                biased;
                _ = parent.recv() => break Err(PoolError::Cancelled),
                next = results_rx.recv() => {
                    let Some((task, outcome)) = next else {
                        break Err(PoolError::WorkersExited { completed, total: self.total });
                    };
                    match outcome {
                        TaskOutcome::Done => {
                            completed += 1;
                            if completed == self.total {
                                break Ok(());
                            }
                        }
                        TaskOutcome::Retry => {
                            retries += 1;
                            debug!("🔁 [WorkersPool] Requeueing task ({} retries so far)", retries);
                            // Queue capacity covers every task not yet completed.
                            if self.queue_tx.try_send(task).is_err() {
                                break Err(PoolError::TooManyTasks(self.total));
                            }
                        }
                        TaskOutcome::Fatal(e) => break Err(PoolError::Task(e)),
                    }
                }
            }
        };

        stop_handle.shutdown();

        match &result {
            Ok(()) => info!(
                "✅ [WorkersPool] {} tasks done with {} workers in {:?} ({} retries)",
                self.total,
                self.workers,
                started.elapsed(),
                retries
            ),
            Err(PoolError::Cancelled) => debug!(
                "🛑 [WorkersPool] Cancelled after {}/{} tasks",
                completed, self.total
            ),
            Err(e) => warn!(
                "❌ [WorkersPool] Stopped after {}/{} tasks: {}",
                completed, self.total, e
            ),
        }
        result
    }
}

async fn worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Task>>>,
    results: mpsc::UnboundedSender<(Task, TaskOutcome)>,
    mut shutdown: Shutdown,
    mut stop: Shutdown,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.recv() => None,
            _ = stop.recv() => None,
            task = async { queue.lock().await.recv().await } => task,
        };
        let Some(task) = next else {
            break;
        };

        let outcome = task(shutdown.clone()).await;
        if results.send((task, outcome)).is_err() {
            break;
        }
    }
    debug!("[WorkersPool] Worker {} exited", id);
}
