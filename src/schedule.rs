//! Trigger builders (the "Schedule" handle): `after`, `on`, `between`,
//! `every`, `cron`, `when`, `once`, and the `.and`/`.or`/`.do_` combinators.
//!
//! Grounded on `anterior/warp/backtester.py`'s `after`/`between`/`cron`/
//! `on`/`every`/`when`/`once` methods and `Schedule.__and__`/`__or__`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::error::{ConfigError, SchedulerError};
use crate::job::{Job, JobFlags, JobFn, JobId, JobResult};
use crate::scheduler::Scheduler;
use crate::trigger::cron::CronFields;
use crate::trigger::date::DateTrigger;
use crate::trigger::field::FieldExpr;
use crate::trigger::{self, Predicate, Trigger};

/// One field of a `between(...)` specification: either unset (no
/// constraint contributed) or an explicit range/value.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldSpec {
    pub year: Option<FieldExpr>,
    pub month: Option<FieldExpr>,
    pub day: Option<FieldExpr>,
    pub week: Option<FieldExpr>,
    pub day_of_week: Option<FieldExpr>,
    pub hour: Option<FieldExpr>,
    pub minute: Option<FieldExpr>,
    pub second: Option<FieldExpr>,
}

/// Carries a `FieldSpec` into a `CronFields` with no filling: unset fields
/// are plain `Wildcard`. Building with this (rather than `finalize_fields`)
/// lets `.and`/`.or` combine a builder's *actual* constraints against a
/// sibling's. Finalization happens once, after any combination, in
/// `Schedule::do_with_flags`.
fn spec_to_raw_fields(spec: FieldSpec) -> CronFields {
    CronFields {
        year: spec.year.unwrap_or(FieldExpr::Wildcard),
        month: spec.month.unwrap_or(FieldExpr::Wildcard),
        day: spec.day.unwrap_or(FieldExpr::Wildcard),
        week: spec.week.unwrap_or(FieldExpr::Wildcard),
        day_of_week: spec.day_of_week.unwrap_or(FieldExpr::Wildcard),
        hour: spec.hour.unwrap_or(FieldExpr::Wildcard),
        minute: spec.minute.unwrap_or(FieldExpr::Wildcard),
        second: spec.second.unwrap_or(FieldExpr::Wildcard),
    }
}

/// Fills still-wildcard fields per the "least specific matches all" rule:
/// fields finer than the most specific non-wildcard field default to their
/// minimum value; fields coarser than it stay wildcard. Run once, on the
/// fully combined trigger, so a builder's own unset fields never shadow a
/// sibling's real constraint on the same field (see `spec_to_raw_fields`).
fn finalize_fields(fields: CronFields) -> CronFields {
    let is_set = |e: FieldExpr| !matches!(e, FieldExpr::Wildcard);

    if is_set(fields.week) {
        // An ISO-week constraint takes the "day" slot in the chain in place
        // of day-of-month: ANDing a week number with a day-of-month would
        // rarely agree on any date, so `day` is left untouched and
        // `day_of_week` is pinned instead (Monday, the first day of the
        // week) when the caller didn't set it.
        let chain = [
            fields.year,
            fields.month,
            fields.week,
            fields.day_of_week,
            fields.hour,
            fields.minute,
        ];
        let finest_specified = chain.iter().rposition(|e| is_set(*e)).expect("week is set");
        let mins = [0u32, 1, 1, 0, 0, 0];
        let fill = |idx: usize, value: FieldExpr| -> FieldExpr {
            if is_set(value) {
                value
            } else if idx > finest_specified {
                FieldExpr::Literal(mins[idx])
            } else {
                FieldExpr::Wildcard
            }
        };
        return CronFields {
            year: fields.year,
            month: fill(1, fields.month),
            week: fields.week,
            day: fields.day,
            day_of_week: fill(3, fields.day_of_week),
            hour: fill(4, fields.hour),
            minute: fill(5, fields.minute),
            second: if is_set(fields.second) {
                fields.second
            } else {
                FieldExpr::Literal(0)
            },
        };
    }

    // Coarse-to-fine order; day_of_week is an independent filter, not part
    // of this chain.
    let chain = [fields.year, fields.month, fields.day, fields.hour, fields.minute];
    let finest_specified = chain.iter().rposition(|e| is_set(*e));
    // Minimum value to fill in at each chain position (year is never
    // filled to a minimum).
    let mins = [0u32, 1, 1, 0, 0];
    let fill = |idx: usize, value: FieldExpr| -> FieldExpr {
        if is_set(value) {
            return value;
        }
        match finest_specified {
            Some(m) if idx > m => FieldExpr::Literal(mins[idx]),
            _ => FieldExpr::Wildcard,
        }
    };
    CronFields {
        year: fields.year,
        month: fill(1, fields.month),
        day: fill(2, fields.day),
        week: fields.week,
        day_of_week: fields.day_of_week,
        hour: fill(3, fields.hour),
        minute: fill(4, fields.minute),
        second: {
            // second has no "finer" field below it; it is filled whenever
            // *anything* coarser than it was specified.
            if is_set(fields.second) {
                fields.second
            } else if finest_specified.is_some() {
                FieldExpr::Literal(0)
            } else {
                FieldExpr::Wildcard
            }
        },
    }
}

/// Walks a trigger tree applying `finalize_fields` to every field-builder
/// Cron leaf. Run once, at `do_with_flags` time, after any `.and`/`.or`
/// combination has already happened.
fn finalize_trigger(t: Trigger) -> Trigger {
    match t {
        Trigger::Cron(fields, zone) => Trigger::Cron(finalize_fields(fields), zone),
        Trigger::And(a, b) => Trigger::And(Box::new(finalize_trigger(*a)), Box::new(finalize_trigger(*b))),
        Trigger::Or(a, b) => Trigger::Or(Box::new(finalize_trigger(*a)), Box::new(finalize_trigger(*b))),
        Trigger::Conditional { inner, predicates, once } => Trigger::Conditional {
            inner: Box::new(finalize_trigger(*inner)),
            predicates,
            once,
        },
        other => other,
    }
}

/// A relative offset for `after(...)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delta {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Delta {
    pub fn to_duration(self) -> Duration {
        Duration::days(self.days)
            + Duration::hours(self.hours)
            + Duration::minutes(self.minutes)
            + Duration::seconds(self.seconds)
    }
}

/// The unit and step for `every(...)`.
#[derive(Debug, Clone, Copy)]
pub enum EveryUnit {
    Years(u32),
    Months(u32),
    Weeks(u32),
    Days(u32),
    Hours(u32),
    Minutes(u32),
    Seconds(u32),
}

pub(crate) fn build_after(now: DateTime<Utc>, delta: Delta) -> Trigger {
    Trigger::Date(DateTrigger::new(now + delta.to_duration()))
}

pub(crate) fn build_on_date(at: DateTime<Utc>) -> Trigger {
    Trigger::Date(DateTrigger::new(at))
}

pub(crate) fn build_on_components(spec: FieldSpec, zone: Tz) -> Trigger {
    Trigger::Cron(spec_to_raw_fields(spec), zone)
}

pub(crate) fn build_between(spec: FieldSpec, zone: Tz) -> Trigger {
    Trigger::Cron(spec_to_raw_fields(spec), zone)
}

pub(crate) fn build_every(unit: EveryUnit, zone: Tz) -> Result<Trigger, ConfigError> {
    let mut spec = FieldSpec::default();
    match unit {
        EveryUnit::Years(n) => spec.year = Some(step_field(n)?),
        EveryUnit::Months(n) => spec.month = Some(step_field(n)?),
        EveryUnit::Weeks(n) => spec.week = Some(step_field(n)?),
        EveryUnit::Days(n) => spec.day = Some(step_field(n)?),
        EveryUnit::Hours(n) => spec.hour = Some(step_field(n)?),
        EveryUnit::Minutes(n) => spec.minute = Some(step_field(n)?),
        EveryUnit::Seconds(n) => spec.second = Some(step_field(n)?),
    }
    Ok(Trigger::Cron(spec_to_raw_fields(spec), zone))
}

fn step_field(n: u32) -> Result<FieldExpr, ConfigError> {
    if n == 0 {
        return Err(ConfigError::NonIntegerEvery(n.to_string()));
    }
    Ok(FieldExpr::Step(n))
}

pub(crate) fn build_cron(expr: &str, zone: Tz) -> Result<Trigger, ConfigError> {
    Ok(Trigger::Cron(CronFields::parse_expression(expr)?, zone))
}

fn every_second(zone: Tz) -> Trigger {
    Trigger::Cron(CronFields::default(), zone)
}

pub(crate) fn build_when(zone: Tz, predicate: Predicate) -> Trigger {
    Trigger::Conditional {
        inner: Box::new(every_second(zone)),
        predicates: vec![predicate],
        once: false,
    }
}

pub(crate) fn build_once(zone: Tz, predicate: Predicate) -> Trigger {
    Trigger::Conditional {
        inner: Box::new(every_second(zone)),
        predicates: vec![predicate],
        once: true,
    }
}

/// A trigger in the process of being attached to a callable. Combine with
/// `.and`/`.or` before calling `.do_`.
pub struct Schedule {
    scheduler: Scheduler,
    trigger: Trigger,
}

impl Schedule {
    pub(crate) fn new(scheduler: Scheduler, trigger: Trigger) -> Self {
        Self { scheduler, trigger }
    }

    pub fn and(self, other: Schedule) -> Result<Schedule, SchedulerError> {
        let trigger = trigger::and(self.trigger, other.trigger)?;
        Ok(Schedule {
            scheduler: self.scheduler,
            trigger,
        })
    }

    pub fn or(self, other: Schedule) -> Result<Schedule, SchedulerError> {
        let trigger = trigger::or(self.trigger, other.trigger)?;
        Ok(Schedule {
            scheduler: self.scheduler,
            trigger,
        })
    }

    /// Attaches `func` as the job's callable and registers it. `name` must
    /// be unique within the scheduler.
    pub fn do_(
        self,
        name: impl Into<String>,
        func: impl Fn() -> JobResult + Send + Sync + 'static,
    ) -> Result<JobId, SchedulerError> {
        self.do_with_flags(name, JobFlags::default(), func)
    }

    pub fn do_with_flags(
        self,
        name: impl Into<String>,
        flags: JobFlags,
        func: impl Fn() -> JobResult + Send + Sync + 'static,
    ) -> Result<JobId, SchedulerError> {
        let name = name.into();
        let trigger = finalize_trigger(self.trigger);
        let job_fn: JobFn = Arc::new(func);
        let id = self
            .scheduler
            .registry()
            .insert(name.clone(), move |id| {
                Job::new(id, name, trigger, job_fn, flags)
            })
            .map_err(SchedulerError::from)?;
        Ok(id)
    }
}
