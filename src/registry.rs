//! Owns jobs, assigns ids, and hands drivers point-in-time snapshots.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Notify;

use crate::error::RegistryError;
use crate::job::{Job, JobId};

/// Shared, thread-safe job store. Cheap to clone: clones share the same
/// underlying map via `Arc<RwLock<..>>`. Keeps no state across process
/// restarts.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<Inner>>,
    notify: Arc<Notify>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            notify: Arc::new(Notify::new()),
        }
    }
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    names: HashMap<String, JobId>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a job, assigning it a fresh monotonic id. Fails if a job
    /// with the same name is already registered.
    pub fn insert(
        &self,
        name: String,
        build: impl FnOnce(JobId) -> Job,
    ) -> Result<JobId, RegistryError> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.names.contains_key(&name) {
            tracing::warn!("rejected duplicate job name `{}`", name);
            return Err(RegistryError::DuplicateJobName(name));
        }
        let id = JobId::from_raw(inner.next_id);
        inner.next_id += 1;
        let job = build(id);
        inner.names.insert(name, id);
        inner.jobs.insert(id, job);
        drop(inner);
        self.notify.notify_waiters();
        Ok(id)
    }

    pub fn remove(&self, id: JobId) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        match inner.jobs.remove(&id) {
            Some(job) => {
                inner.names.remove(&job.name);
                drop(inner);
                self.notify.notify_waiters();
                Ok(())
            }
            None => Err(RegistryError::UnknownId(id)),
        }
    }

    pub fn remove_all(&self) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.jobs.clear();
        inner.names.clear();
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Resolves once the registry has changed (a job added or removed).
    /// Used by the Live Driver to wake up early when it has nothing to
    /// wait for.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }

    /// A point-in-time snapshot of all jobs, ordered by insertion (id
    /// order), so a driver tick is unaffected by concurrent mutation.
    pub fn snapshot(&self) -> Vec<Job> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut jobs: Vec<Job> = inner.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies the mutations a driver tick produced: updated cursors for
    /// jobs that fired, and removal of jobs that are exhausted.
    pub fn apply_tick(&self, updated_cursors: &[(JobId, chrono::DateTime<chrono::Utc>)], removed: &[JobId]) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        for (id, cursor) in updated_cursors {
            if let Some(job) = inner.jobs.get_mut(id) {
                job.cursor = Some(*cursor);
            }
        }
        for id in removed {
            if let Some(job) = inner.jobs.remove(id) {
                inner.names.remove(&job.name);
            }
        }
    }
}
