use thiserror::Error;

/// Errors raised by builders and facade methods (zone/cron/spec validation).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid timezone: {0}")]
    InvalidZone(String),
    #[error("malformed cron expression: {0}")]
    MalformedCron(String),
    #[error("ambiguous specification: both a bundled value and individual components were given")]
    AmbiguousSpec,
    #[error("`every` requires an integer step, got {0}")]
    NonIntegerEvery(String),
    #[error("zone mismatch in combinator: {0} vs {1}")]
    ZoneMismatch(String, String),
}

/// Errors raised by Registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a job named `{0}` is already registered")]
    DuplicateJobName(String),
    #[error("no job with id {0:?} exists")]
    UnknownId(crate::job::JobId),
}

/// Errors raised by the VirtualClock.
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("clock is already frozen")]
    AlreadyFrozen,
    #[error("clock is not frozen")]
    NotFrozen,
    #[error("move_to target is before the current frozen instant")]
    Regression,
}

/// Errors raised by the Trigger algebra.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("cannot combine triggers with `and`: {0}")]
    IncompatibleAnd(String),
    #[error("zone mismatch between combined triggers: {0} vs {1}")]
    ZoneMismatch(String, String),
}

/// Errors raised by driver/runtime operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("driver is already running")]
    AlreadyRunning,
    #[error("decorated function `{0}` must take no parameters")]
    DecoratedFnHasParams(String),
}

/// Top-level error type returned by fallible public operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// A job callable returned an error during a backtest run; the driver
    /// aborts and re-raises per the propagation policy.
    #[error("job `{job_name}` failed: {source}")]
    JobFailed {
        job_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
