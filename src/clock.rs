//! The process-wide virtual clock.
//!
//! Grounded on the `Clock` trait / `SystemClock` / `FakeClock` pair in the
//! teacher crate's daemon scheduler, generalized into a single type that
//! toggles between wall and frozen mode at runtime instead of being chosen
//! once at construction.

use std::sync::{Arc, RwLock};
use std::time::Instant as WallInstant;

use chrono::{DateTime, Utc};

use crate::error::ClockError;

#[derive(Debug, Clone, Copy)]
enum Mode {
    Wall,
    Frozen(DateTime<Utc>),
}

/// A switchable source of "now".
///
/// Every scheduled function and every trigger reads through this single
/// handle, so that a frozen/simulated clock is visible everywhere at once.
/// Cloning a `VirtualClock` shares the same underlying state.
#[derive(Clone)]
pub struct VirtualClock {
    mode: Arc<RwLock<Mode>>,
    wall_origin: WallInstant,
}

impl VirtualClock {
    /// Creates a new clock in wall-clock mode.
    pub fn new() -> Self {
        Self {
            mode: Arc::new(RwLock::new(Mode::Wall)),
            wall_origin: WallInstant::now(),
        }
    }

    /// Returns the current instant, in UTC. Callers wanting a particular
    /// zone should convert via `DateTime::with_timezone`.
    pub fn now(&self) -> DateTime<Utc> {
        match *self.mode.read().expect("clock lock poisoned") {
            Mode::Wall => Utc::now(),
            Mode::Frozen(at) => at,
        }
    }

    /// True while the clock is in frozen/simulated mode.
    pub fn is_frozen(&self) -> bool {
        matches!(*self.mode.read().expect("clock lock poisoned"), Mode::Frozen(_))
    }

    /// Freezes the clock at `at`. Fails if already frozen; recursive
    /// freezing is not supported.
    pub fn freeze(&self, at: DateTime<Utc>) -> Result<(), ClockError> {
        let mut mode = self.mode.write().expect("clock lock poisoned");
        if matches!(*mode, Mode::Frozen(_)) {
            return Err(ClockError::AlreadyFrozen);
        }
        *mode = Mode::Frozen(at);
        Ok(())
    }

    /// Moves a frozen clock forward. Fails if not frozen, or if `at` is
    /// strictly before the current frozen instant.
    pub fn move_to(&self, at: DateTime<Utc>) -> Result<(), ClockError> {
        let mut mode = self.mode.write().expect("clock lock poisoned");
        match *mode {
            Mode::Wall => Err(ClockError::NotFrozen),
            Mode::Frozen(current) => {
                if at < current {
                    return Err(ClockError::Regression);
                }
                *mode = Mode::Frozen(at);
                Ok(())
            }
        }
    }

    /// Returns the clock to wall-clock mode.
    pub fn thaw(&self) {
        let mut mode = self.mode.write().expect("clock lock poisoned");
        *mode = Mode::Wall;
    }

    /// Real wall-clock elapsed time since this clock was constructed,
    /// available even while the user-visible clock is frozen. Used by the
    /// driver for progress reporting and watchdog timers, never by user code.
    pub fn wall_elapsed(&self) -> std::time::Duration {
        self.wall_origin.elapsed()
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}
