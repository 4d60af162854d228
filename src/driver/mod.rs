//! Shared dispatch-planning logic used by both the Simulation and Live
//! drivers: given a registry snapshot and an instant, decide what fires
//! next and which jobs are exhausted.

pub mod live;
pub mod simulation;

use chrono::{DateTime, Utc};

use crate::job::{Job, JobId};

/// What a single driver tick should do: advance to `next_t` (if any) and
/// dispatch `due` jobs, in reverse insertion order, while `expired` jobs
/// are pruned regardless of whether anything fires this tick.
pub struct TickPlan {
    pub next_t: Option<DateTime<Utc>>,
    /// Job ids due at `next_t`, already in reverse insertion order.
    pub due: Vec<JobId>,
    /// Jobs whose trigger returned `Never`; removed within this tick.
    pub expired: Vec<JobId>,
}

/// Computes the next fire instant across `jobs`, the batch due at that
/// instant (reverse insertion order, per the deterministic tie-break), and
/// any jobs that should be pruned because their trigger will never fire
/// again.
pub fn plan_tick(jobs: &[Job], now: DateTime<Utc>) -> TickPlan {
    let mut expired = Vec::new();
    let mut fires: Vec<(JobId, DateTime<Utc>)> = Vec::new();
    for job in jobs {
        match job.peek_next_fire(now) {
            Some(t) => fires.push((job.id, t)),
            None => expired.push(job.id),
        }
    }
    let next_t = fires.iter().map(|(_, t)| *t).min();
    let due = match next_t {
        Some(t) => {
            let mut ids: Vec<JobId> = fires
                .iter()
                .filter(|(_, fire)| *fire == t)
                .map(|(id, _)| *id)
                .collect();
            ids.reverse();
            ids
        }
        None => Vec::new(),
    };
    TickPlan {
        next_t,
        due,
        expired,
    }
}
