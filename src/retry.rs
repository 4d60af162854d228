//! Retry policy combinator: wraps a job closure so transient `JobResult`
//! errors are retried with backoff and jitter before giving up.
//!
//! Grounded on `anterior/warp/schedule.py::retry`: same `tries`/`delay`/
//! `backoff`/`jitter`/`max_delay` parameters, same "run again after the
//! delay, doubling per `backoff`" shape, re-expressed for a closure that
//! already runs inside a `spawn_blocking` worker slot: a retry just sleeps
//! in place and calls the wrapped closure again, rather than re-scheduling
//! itself as a new one-shot job.

use std::time::Duration;

use rand::Rng;

use crate::job::{JobFn, JobResult};

/// Jitter added to each retry's delay, on top of the backoff-multiplied
/// base delay.
#[derive(Debug, Clone, Copy)]
pub enum Jitter {
    Fixed(Duration),
    Uniform(Duration, Duration),
}

impl Jitter {
    fn sample(self) -> Duration {
        match self {
            Jitter::Fixed(d) => d,
            Jitter::Uniform(lo, hi) => {
                if hi <= lo {
                    return lo;
                }
                let lo_s = lo.as_secs_f64();
                let hi_s = hi.as_secs_f64();
                let sampled = rand::thread_rng().gen_range(lo_s..hi_s);
                Duration::from_secs_f64(sampled)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub tries: u32,
    pub delay: Duration,
    pub backoff: u32,
    pub jitter: Option<Jitter>,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tries: 0,
            delay: Duration::from_secs(0),
            backoff: 1,
            jitter: None,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(tries: u32, delay: Duration) -> Self {
        Self {
            tries,
            delay,
            ..Default::default()
        }
    }

    pub fn backoff(mut self, factor: u32) -> Self {
        self.backoff = factor.max(1);
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    /// Wraps `func` so that a returned `Err` is retried up to `tries` times
    /// before propagating. Each retry waits `delay`, multiplied by
    /// `backoff` every subsequent attempt, plus `jitter`, capped at
    /// `max_delay`. `tries == 0` passes `func` through unchanged.
    pub fn wrap(self, func: impl Fn() -> JobResult + Send + Sync + 'static) -> JobFn {
        if self.tries == 0 {
            return std::sync::Arc::new(func);
        }
        std::sync::Arc::new(move || {
            let mut remaining = self.tries;
            let mut wait = self.delay;
            loop {
                match func() {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        remaining -= 1;
                        if remaining == 0 {
                            return Err(e);
                        }
                        let mut next_wait = wait.mul_f64(self.backoff as f64);
                        if let Some(j) = self.jitter {
                            next_wait += j.sample();
                        }
                        if let Some(max) = self.max_delay {
                            next_wait = next_wait.min(max);
                        }
                        std::thread::sleep(wait);
                        wait = next_wait;
                    }
                }
            }
        })
    }
}
