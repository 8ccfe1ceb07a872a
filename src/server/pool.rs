//! Bounded worker pool for the blocking request pipeline.
//!
//! Two semaphores bound the work in flight:
//!
//! - `workers`: jobs running on blocking threads at once
//! - `admission`: jobs running plus jobs waiting for a worker
//!
//! A job that cannot be admitted is rejected immediately with
//! [`PoolError::Busy`] instead of joining an unbounded queue.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 50;

/// Default number of requests allowed to wait for a worker.
pub const DEFAULT_QUEUE_DEPTH: usize = 200;

#[derive(Debug, Error)]
pub enum PoolError {
    /// All workers are busy and the queue is full.
    #[error("server too busy")]
    Busy,

    /// The job panicked or was cancelled.
    #[error("worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    worker_count: usize,
    queue_depth: usize,
}

impl WorkerPool {
    /// A zero worker count is treated as one.
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers: Arc::new(Semaphore::new(workers)),
            admission: Arc::new(Semaphore::new(workers + queue_depth)),
            worker_count: workers,
            queue_depth,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    /// Admission slots currently free.
    pub fn available(&self) -> usize {
        self.admission.available_permits()
    }

    /// Run `job` on a blocking thread once a worker is free.
    pub async fn run<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let admitted = Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|_| PoolError::Busy)?;
        let worker = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| PoolError::Worker(e.to_string()))?;

        task::spawn_blocking(move || {
            let _admitted = admitted;
            let _worker = worker;
            job()
        })
        .await
        .map_err(|e| PoolError::Worker(e.to_string()))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_QUEUE_DEPTH)
    }
}
