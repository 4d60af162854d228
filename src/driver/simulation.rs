//! The Deterministic Simulation Driver.
//!
//! Single-threaded by design (§5): no suspension points between computing
//! the next fire instant and completing every job due at it, which is what
//! makes backtest runs reproducible even when user callables share mutable
//! state without locks.

use chrono::{DateTime, Utc};

use crate::clock::VirtualClock;
use crate::driver::plan_tick;
use crate::error::SchedulerError;
use crate::kickstart::{KickstartRegistry, Phase};
use crate::registry::Registry;

/// Runs a backtest over `[start, end]`. `on_start`/`on_stop` are invoked
/// exactly once, bracketing every dispatch. On the first job error the run
/// aborts, thaws the clock, and the error propagates to the caller
/// (`on_stop` still runs, mirroring `stop()` being invoked internally).
pub fn run_backtest(
    registry: &Registry,
    clock: &VirtualClock,
    kickstarts: &KickstartRegistry,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    on_start: &(dyn Fn() + Send + Sync),
    on_stop: &(dyn Fn() + Send + Sync),
) -> Result<(), SchedulerError> {
    tracing::info!("backtest starting: {} .. {}", start, end);
    on_start();
    clock.freeze(start)?;
    kickstarts.call_all(Phase::Backtest);

    let result = drive(registry, clock, end);
    if let Err(ref e) = result {
        tracing::error!("backtest aborted: {}", e);
    } else {
        tracing::info!("backtest finished at {}", end);
    }

    on_stop();
    clock.thaw();
    result
}

fn drive(registry: &Registry, clock: &VirtualClock, end: DateTime<Utc>) -> Result<(), SchedulerError> {
    loop {
        let snapshot = registry.snapshot();
        let now = clock.now();
        let plan = plan_tick(&snapshot, now);
        registry.apply_tick(&[], &plan.expired);

        let Some(next_t) = plan.next_t else {
            return Ok(());
        };
        if next_t > end {
            return Ok(());
        }
        clock.move_to(next_t)?;

        let mut fired_cursors = Vec::with_capacity(plan.due.len());
        let mut once_removals = Vec::new();
        for job_id in &plan.due {
            let Some(job) = snapshot.iter().find(|j| j.id == *job_id) else {
                continue;
            };
            fired_cursors.push((job.id, next_t));
            if job.predicates_satisfied() {
                if job.flags.log {
                    tracing::debug!("dispatching job `{}` at {}", job.name, next_t);
                }
                if let Err(source) = (job.func)() {
                    registry.apply_tick(&fired_cursors, &once_removals);
                    return Err(SchedulerError::JobFailed {
                        job_name: job.name.clone(),
                        source,
                    });
                }
                if job.is_once() {
                    once_removals.push(job.id);
                }
            }
        }
        registry.apply_tick(&fired_cursors, &once_removals);
    }
}
