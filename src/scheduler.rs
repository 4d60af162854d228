//! The public facade: `Scheduler`. Owns a Registry, a VirtualClock, a zone,
//! a Worker Pool, lifecycle hooks, and the kickstart registry; dispatches
//! `run(start, end)` to the Simulation and/or Live driver per §4.7's table.
//!
//! Grounded on `anterior/warp/backtester.py`'s `BackTester` class for the
//! surface shape (constructor options, `do`/`after`/`between`/`cron`/`on`/
//! `every`/`when`/`once`, `run`/`pause`/`resume`/`stop`).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex as AsyncMutex;

use crate::clock::VirtualClock;
use crate::driver::live::{self, LiveControl};
use crate::driver::simulation;
use crate::error::{ConfigError, RuntimeError, SchedulerError};
use crate::job::JobId;
use crate::kickstart::{KickstartEntry, KickstartRegistry};
use crate::pool::{self, WorkerPool};
use crate::registry::Registry;
use crate::schedule::{self, Delta, EveryUnit, FieldSpec, Schedule};
use crate::trigger::Predicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Idle = 0,
    Running = 1,
    Paused = 2,
    Stopped = 3,
}

impl State {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => State::Running,
            2 => State::Paused,
            3 => State::Stopped,
            _ => State::Idle,
        }
    }
}

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct Scheduler {
    registry: Registry,
    clock: VirtualClock,
    zone: Tz,
    kickstarts: KickstartRegistry,
    pool: WorkerPool,
    pool_width: usize,
    state: Arc<AtomicU8>,
    on_start: Hook,
    on_stop: Hook,
    live_handle: Arc<AsyncMutex<Option<LiveControl>>>,
}

impl Scheduler {
    /// Creates a scheduler in the given zone. `workers` defaults to
    /// `max(1, cores - 2)` when `None`.
    pub fn new(zone: Tz, workers: Option<usize>) -> Self {
        let pool_width = workers.unwrap_or_else(pool::default_worker_count);
        Self {
            registry: Registry::new(),
            clock: VirtualClock::new(),
            zone,
            kickstarts: KickstartRegistry::new(),
            pool: WorkerPool::new(pool_width),
            pool_width,
            state: Arc::new(AtomicU8::new(State::Idle as u8)),
            on_start: Arc::new(|| {}),
            on_stop: Arc::new(|| {}),
            live_handle: Arc::new(AsyncMutex::new(None)),
        }
    }

    pub fn with_zone_str(zone: &str, workers: Option<usize>) -> Result<Self, ConfigError> {
        let tz: Tz = zone
            .parse()
            .map_err(|_| ConfigError::InvalidZone(zone.to_string()))?;
        Ok(Self::new(tz, workers))
    }

    pub fn on_start(&mut self, hook: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.on_start = Arc::new(hook);
        self
    }

    pub fn on_stop(&mut self, hook: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.on_stop = Arc::new(hook);
        self
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// The current instant, in this scheduler's configured zone. Reads
    /// through the shared Virtual Clock, so it reflects simulated time
    /// during a backtest.
    pub fn now(&self) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.zone)
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    // -- builders -----------------------------------------------------

    pub fn after(&self, delta: Delta) -> Schedule {
        let trigger = schedule::build_after(self.clock.now(), delta);
        Schedule::new(self.clone(), trigger)
    }

    pub fn on_date(&self, at: DateTime<Utc>) -> Schedule {
        Schedule::new(self.clone(), schedule::build_on_date(at))
    }

    pub fn on_components(&self, spec: FieldSpec) -> Schedule {
        Schedule::new(self.clone(), schedule::build_on_components(spec, self.zone))
    }

    pub fn between(&self, spec: FieldSpec) -> Schedule {
        Schedule::new(self.clone(), schedule::build_between(spec, self.zone))
    }

    pub fn every(&self, unit: EveryUnit) -> Result<Schedule, SchedulerError> {
        let trigger = schedule::build_every(unit, self.zone)?;
        Ok(Schedule::new(self.clone(), trigger))
    }

    pub fn cron(&self, expr: &str) -> Result<Schedule, SchedulerError> {
        let trigger = schedule::build_cron(expr, self.zone)?;
        Ok(Schedule::new(self.clone(), trigger))
    }

    pub fn when(&self, predicate: Predicate) -> Schedule {
        Schedule::new(self.clone(), schedule::build_when(self.zone, predicate))
    }

    pub fn once(&self, predicate: Predicate) -> Schedule {
        Schedule::new(self.clone(), schedule::build_once(self.zone, predicate))
    }

    /// Registers a kickstart function, invoked once at driver start.
    pub fn kickstart(
        &self,
        name: impl Into<String>,
        backtest: bool,
        live: bool,
        func: impl Fn() + Send + Sync + 'static,
    ) -> Result<(), SchedulerError> {
        self.kickstarts
            .register(
                name.into(),
                KickstartEntry {
                    func: Arc::new(func),
                    backtest,
                    live,
                },
            )
            .map_err(SchedulerError::from)
    }

    // -- lifecycle ------------------------------------------------------

    /// Combined live/backtest orchestration per the 5-case dispatch table:
    /// both `start`/`end` absent runs live indefinitely; `start` absent
    /// with `end` present runs live until `end`; `start` present with `end`
    /// absent or in the past backtests and returns; `start` present with
    /// `end` in the future backtests up to now, then continues live.
    pub async fn run(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<(), SchedulerError> {
        if self.state() == State::Running {
            return Err(RuntimeError::AlreadyRunning.into());
        }
        self.state.store(State::Running as u8, Ordering::SeqCst);

        let w = Utc::now();
        let result = match (start, end) {
            (None, None) => self.run_live(None).await,
            (None, Some(e)) => self.run_live(Some(e)).await,
            (Some(s), None) => self.run_backtest(s, w),
            (Some(s), Some(e)) if e <= w => self.run_backtest(s, e),
            (Some(s), Some(e)) => {
                self.run_backtest(s, w)?;
                self.run_live(Some(e)).await
            }
        };

        if !matches!(self.state(), State::Stopped) {
            self.state.store(State::Idle as u8, Ordering::SeqCst);
        }
        result
    }

    fn run_backtest(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulerError> {
        let on_start = Arc::clone(&self.on_start);
        let on_stop = Arc::clone(&self.on_stop);
        simulation::run_backtest(
            &self.registry,
            &self.clock,
            &self.kickstarts,
            start,
            end,
            &*on_start,
            &*on_stop,
        )
    }

    async fn run_live(&self, end: Option<DateTime<Utc>>) -> Result<(), SchedulerError> {
        let (control, join) = live::spawn(
            self.registry.clone(),
            self.clock.clone(),
            self.kickstarts.clone(),
            self.pool.clone(),
            self.pool_width,
            end,
            Arc::clone(&self.on_start),
            Arc::clone(&self.on_stop),
        );
        *self.live_handle.lock().await = Some(control);
        // The loop runs until `end` is reached or `stop` is requested
        // out-of-band via `self.live_handle`; `run` blocks here until then.
        let _ = join.await;
        *self.live_handle.lock().await = None;
        Ok(())
    }

    pub async fn pause(&self) {
        if let Some(control) = self.live_handle.lock().await.as_ref() {
            control.pause();
            self.state.store(State::Paused as u8, Ordering::SeqCst);
        }
    }

    pub async fn resume(&self) {
        if let Some(control) = self.live_handle.lock().await.as_ref() {
            control.resume();
            self.state.store(State::Running as u8, Ordering::SeqCst);
        }
    }

    pub async fn stop(&self, wait: std::time::Duration) {
        if let Some(control) = self.live_handle.lock().await.as_ref() {
            control.stop(wait).await;
        }
        self.state.store(State::Stopped as u8, Ordering::SeqCst);
    }

    pub fn job_count(&self) -> usize {
        self.registry.len()
    }

    pub fn remove_job(&self, id: JobId) -> Result<(), SchedulerError> {
        self.registry.remove(id).map_err(SchedulerError::from)
    }

    pub fn remove_all(&self) {
        self.registry.remove_all();
    }
}
