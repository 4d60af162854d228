//! Job: binds a trigger to a callable, with lifecycle flags.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::trigger::Trigger;

/// Opaque job identifier. Assigned by the Registry on insert; a plain
/// monotonic counter is sufficient since jobs are never persisted across
/// process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        JobId(raw)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A callable a job dispatches. Plain `Fn`, not `FnMut`: shared state, if
/// any, is the caller's responsibility (jobs may run concurrently in live
/// mode, and may overlap with a still-running prior invocation).
pub type JobFn = Arc<dyn Fn() -> JobResult + Send + Sync>;

/// The result of one job invocation. `Err` is a `UserError` per the error
/// taxonomy: it aborts a backtest run, and is caught-and-logged in live mode.
pub type JobResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct JobFlags {
    /// Self-removes after first satisfied dispatch.
    pub once: bool,
    /// Emit a timing/outcome log line around each invocation.
    pub log: bool,
}

#[derive(Clone)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub trigger: Trigger,
    pub func: JobFn,
    pub cursor: Option<DateTime<Utc>>,
    pub flags: JobFlags,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cursor", &self.cursor)
            .field("flags", &self.flags)
            .finish()
    }
}

impl Job {
    pub fn new(id: JobId, name: String, trigger: Trigger, func: JobFn, flags: JobFlags) -> Self {
        Self {
            id,
            name,
            trigger,
            func,
            cursor: None,
            flags,
        }
    }

    /// Computes this job's next fire instant without mutating it.
    pub fn peek_next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.trigger.next_fire(self.cursor, now)
    }

    /// Evaluates any `Conditional` predicates attached to this job's
    /// trigger. Non-conditional triggers always pass. Called at dispatch
    /// time, never during `next_fire`, so that predicates observe the
    /// already-advanced clock.
    pub fn predicates_satisfied(&self) -> bool {
        match self.trigger.as_conditional() {
            Some((_, predicates, _)) => predicates.iter().all(|p| p()),
            None => true,
        }
    }

    /// Whether this job should self-remove after a satisfied dispatch.
    pub fn is_once(&self) -> bool {
        matches!(self.trigger.as_conditional(), Some((_, _, true))) || self.flags.once
    }
}
