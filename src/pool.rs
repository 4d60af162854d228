//! Bounded concurrent executor for live-mode dispatch.
//!
//! Width defaults to a bounded `max(1, cores - 2)`. Jobs here are
//! `Fn() + Send + Sync` closures rather than child processes, so a
//! `tokio::sync::Semaphore` gating `tokio::spawn` is a better fit than a
//! dedicated thread-pool crate.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::job::JobResult;

/// Default width: one worker per core, minus two, with a floor of one.
/// Leaves headroom for the driver thread and the async runtime itself.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(2)
        .max(1)
}

/// A bounded pool of concurrent job slots. Submission never blocks the
/// caller (it spawns a task that first acquires a permit), so the driver
/// loop can keep computing the next fire instant while a batch drains.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(width: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(width.max(1))),
        }
    }

    /// Submits a job for execution. Returns a handle whose result is
    /// `Ok(JobResult)` on normal completion, or the join error if the task
    /// panicked.
    pub fn submit(
        &self,
        func: crate::job::JobFn,
    ) -> JoinHandle<Result<JobResult, tokio::task::JoinError>> {
        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            let permit = semaphore
                .acquire_owned()
                .await
                .expect("worker pool semaphore closed");
            let result = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                func()
            })
            .await;
            Ok(result.unwrap_or_else(|e| Err(Box::new(e) as _)))
        })
    }

    /// Waits, up to `timeout`, for all currently-outstanding permits to be
    /// released (i.e. for in-flight jobs to finish). Used by `stop(wait)`.
    pub async fn drain(&self, width: usize, timeout: std::time::Duration) -> bool {
        tokio::time::timeout(timeout, async {
            let _ = self.semaphore.acquire_many(width as u32).await;
        })
        .await
        .is_ok()
    }
}
