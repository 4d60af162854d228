//! The Live Driver: wall-clock dispatch into a bounded Worker Pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::VirtualClock;
use crate::driver::plan_tick;
use crate::kickstart::{KickstartRegistry, Phase};
use crate::pool::WorkerPool;
use crate::registry::Registry;

/// Shared control surface for a running live driver loop: cheap to clone,
/// so the facade can hand out `pause`/`resume`/`stop` access while holding
/// the loop's `JoinHandle` privately.
#[derive(Clone)]
pub struct LiveControl {
    stop_tx: watch::Sender<bool>,
    paused: Arc<AtomicBool>,
    pool: WorkerPool,
    pool_width: usize,
}

impl LiveControl {
    /// Suspends dispatch; the loop keeps recomputing next-fires so that a
    /// subsequent `resume` sees an up-to-date schedule rather than a stale
    /// one computed before the pause.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Signals the loop to stop submitting new work, then waits up to
    /// `wait` for in-flight jobs to finish; anything still outstanding
    /// afterwards is abandoned, not killed.
    pub async fn stop(&self, wait: StdDuration) {
        let _ = self.stop_tx.send(true);
        self.pool.drain(self.pool_width, wait).await;
    }
}

/// Spawns the live driver loop as a background task, returning a control
/// handle and the task's `JoinHandle` (which resolves once the loop exits,
/// either because `end` was reached or `stop` was called).
pub fn spawn(
    registry: Registry,
    clock: VirtualClock,
    kickstarts: KickstartRegistry,
    pool: WorkerPool,
    pool_width: usize,
    end: Option<DateTime<Utc>>,
    on_start: Arc<dyn Fn() + Send + Sync>,
    on_stop: Arc<dyn Fn() + Send + Sync>,
) -> (LiveControl, JoinHandle<()>) {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let paused = Arc::new(AtomicBool::new(false));
    let paused_loop = Arc::clone(&paused);
    let pool_loop = pool.clone();

    let join = tokio::spawn(async move {
        tracing::info!("live driver starting");
        on_start();
        kickstarts.call_all(Phase::Live);

        loop {
            if *stop_rx.borrow() {
                tracing::info!("live driver stopping: stop requested");
                break;
            }
            if paused_loop.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = tokio::time::sleep(StdDuration::from_millis(50)) => continue,
                    _ = stop_rx.changed() => break,
                }
                continue;
            }

            let snapshot = registry.snapshot();
            let now = clock.now();
            let plan = plan_tick(&snapshot, now);
            registry.apply_tick(&[], &plan.expired);

            let Some(next_t) = plan.next_t else {
                match end {
                    Some(end) => {
                        let idle_for = (end - now).to_std().unwrap_or(StdDuration::ZERO);
                        tokio::select! {
                            _ = tokio::time::sleep(idle_for) => {
                                tracing::info!("live driver stopping: reached end {}", end);
                                break;
                            }
                            _ = registry.changed() => continue,
                            _ = stop_rx.changed() => break,
                        }
                    }
                    None => {
                        tokio::select! {
                            _ = registry.changed() => continue,
                            _ = stop_rx.changed() => break,
                        }
                    }
                }
            };
            if let Some(end) = end {
                if next_t > end {
                    tracing::info!("live driver stopping: reached end {}", end);
                    break;
                }
            }

            let sleep_for = (next_t - now).to_std().unwrap_or(StdDuration::ZERO);
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = registry.changed() => continue,
                _ = stop_rx.changed() => break,
            }

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
                    let handle = pool_loop.submit(Arc::clone(&job.func));
                    let job_name = job.name.clone();
                    tokio::spawn(async move {
                        match handle.await {
                            Ok(Err(e)) => tracing::error!("job `{}` failed: {}", job_name, e),
                            Err(e) => tracing::error!("job `{}` panicked: {}", job_name, e),
                            Ok(Ok(())) => {}
                        }
                    });
                    if job.is_once() {
                        once_removals.push(job.id);
                    }
                }
            }
            registry.apply_tick(&fired_cursors, &once_removals);
        }

        on_stop();
        tracing::info!("live driver stopped");
    });

    let control = LiveControl {
        stop_tx,
        paused,
        pool,
        pool_width,
    };
    (control, join)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobFlags};
    use crate::trigger::cron::CronFields;
    use crate::trigger::field::FieldExpr;
    use crate::trigger::Trigger;
    use chrono::Duration;
    use chrono_tz::UTC;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[tokio::test]
    async fn live_driver_dispatches_a_due_job_and_can_be_stopped() {
        let registry = Registry::new();
        let clock = VirtualClock::new();
        let kickstarts = KickstartRegistry::new();
        let pool = WorkerPool::new(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let mut every_second = CronFields::default();
        every_second.second = FieldExpr::Step(1);
        registry
            .insert("tick".to_string(), move |id| {
                Job::new(
                    id,
                    "tick".to_string(),
                    Trigger::Cron(every_second, UTC),
                    Arc::new(move || {
                        calls_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        Ok(())
                    }),
                    JobFlags::default(),
                )
            })
            .unwrap();

        let (control, join) = spawn(
            registry,
            clock,
            kickstarts,
            pool,
            2,
            None,
            Arc::new(|| {}),
            Arc::new(|| {}),
        );

        tokio::time::sleep(StdDuration::from_millis(1200)).await;
        control.stop(StdDuration::from_millis(200)).await;
        let _ = join.await;

        assert!(calls.load(std::sync::atomic::Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn kickstart_functions_flagged_for_live_run_at_start() {
        let registry = Registry::new();
        let clock = VirtualClock::new();
        let kickstarts = KickstartRegistry::new();
        let calls = Arc::new(Mutex::new(0));
        let c = Arc::clone(&calls);
        kickstarts
            .register(
                "kick".to_string(),
                crate::kickstart::KickstartEntry {
                    func: Arc::new(move || {
                        *c.lock().unwrap() += 1;
                    }),
                    backtest: false,
                    live: true,
                },
            )
            .unwrap();
        let pool = WorkerPool::new(1);

        let (control, join) = spawn(
            registry,
            clock,
            kickstarts,
            pool,
            1,
            Some(Utc::now() + Duration::milliseconds(50)),
            Arc::new(|| {}),
            Arc::new(|| {}),
        );
        tokio::time::sleep(StdDuration::from_millis(150)).await;
        control.stop(StdDuration::from_millis(50)).await;
        let _ = join.await;
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn an_idle_registry_still_honors_the_end_deadline() {
        // No jobs registered: `plan.next_t` is always `None`, so the loop
        // has nothing to sleep toward except `end` itself.
        let registry = Registry::new();
        let clock = VirtualClock::new();
        let kickstarts = KickstartRegistry::new();
        let pool = WorkerPool::new(1);

        let (_control, join) = spawn(
            registry,
            clock,
            kickstarts,
            pool,
            1,
            Some(Utc::now() + Duration::milliseconds(100)),
            Arc::new(|| {}),
            Arc::new(|| {}),
        );

        tokio::time::timeout(StdDuration::from_secs(2), join)
            .await
            .expect("live driver should stop on its own once `end` is reached")
            .unwrap();
    }
}
