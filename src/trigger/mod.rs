//! The trigger algebra: Date, Cron, Interval, And, Or, Conditional.
//!
//! Grounded on `anterior/warp/schedule.py`'s `Schedule.__and__`/`__or__` for
//! the combination rules; the calendar search itself is a from-scratch
//! field-by-field cron evaluator (see `trigger::cron`).

pub mod cron;
pub mod date;
pub mod field;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::error::TriggerError;
use cron::CronFields;
use date::DateTrigger;
use field::FieldExpr;

/// Bound on convergence iterations for generic (non-cron) `And` trigger
/// pairs before giving up and reporting `Never`.
const MAX_AND_CONVERGENCE_ITERATIONS: usize = 10_000;

pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Trigger {
    Date(DateTrigger),
    Cron(CronFields, Tz),
    Interval {
        every: Duration,
        anchor: DateTime<Utc>,
    },
    And(Box<Trigger>, Box<Trigger>),
    Or(Box<Trigger>, Box<Trigger>),
    Conditional {
        inner: Box<Trigger>,
        predicates: Vec<Predicate>,
        once: bool,
    },
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Date(d) => f.debug_tuple("Date").field(d).finish(),
            Trigger::Cron(fields, zone) => f.debug_tuple("Cron").field(fields).field(zone).finish(),
            Trigger::Interval { every, anchor } => f
                .debug_struct("Interval")
                .field("every", every)
                .field("anchor", anchor)
                .finish(),
            Trigger::And(a, b) => f.debug_tuple("And").field(a).field(b).finish(),
            Trigger::Or(a, b) => f.debug_tuple("Or").field(a).field(b).finish(),
            Trigger::Conditional { inner, once, .. } => f
                .debug_struct("Conditional")
                .field("inner", inner)
                .field("once", once)
                .finish(),
        }
    }
}

impl Trigger {
    /// Computes the next fire instant strictly after `cursor` (or, absent a
    /// cursor, strictly after `now`). Pure: safe to call repeatedly.
    pub fn next_fire(&self, cursor: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Date(d) => d.next_fire(cursor, now),
            Trigger::Cron(fields, zone) => fields.next_fire(cursor, now, *zone),
            Trigger::Interval { every, anchor } => interval_next_fire(*every, *anchor, cursor, now),
            Trigger::And(a, b) => and_generic_next_fire(a, b, cursor, now),
            Trigger::Or(a, b) => {
                match (a.next_fire(cursor, now), b.next_fire(cursor, now)) {
                    (Some(x), Some(y)) => Some(x.min(y)),
                    (Some(x), None) => Some(x),
                    (None, Some(y)) => Some(y),
                    (None, None) => None,
                }
            }
            Trigger::Conditional { inner, .. } => inner.next_fire(cursor, now),
        }
    }

    /// The inner trigger a `Conditional` wraps, for drivers that need to
    /// evaluate predicates at dispatch time.
    pub fn as_conditional(&self) -> Option<(&Trigger, &[Predicate], bool)> {
        match self {
            Trigger::Conditional {
                inner,
                predicates,
                once,
            } => Some((inner, predicates.as_slice(), *once)),
            _ => None,
        }
    }

    fn zone(&self) -> Option<Tz> {
        match self {
            Trigger::Cron(_, zone) => Some(*zone),
            Trigger::Conditional { inner, .. } => inner.zone(),
            _ => None,
        }
    }
}

fn interval_next_fire(
    every: Duration,
    anchor: DateTime<Utc>,
    cursor: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let every_secs = every.num_seconds();
    if every_secs <= 0 {
        return None;
    }
    let floor = cursor.unwrap_or(now);
    let diff_secs = (floor - anchor).num_seconds().max(0);
    let k = diff_secs / every_secs + 1;
    Some(anchor + every * k as i32)
}

fn and_generic_next_fire(
    a: &Trigger,
    b: &Trigger,
    cursor: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let mut a_cursor = cursor;
    let mut b_cursor = cursor;
    for _ in 0..MAX_AND_CONVERGENCE_ITERATIONS {
        let fa = a.next_fire(a_cursor, now)?;
        let fb = b.next_fire(b_cursor, now)?;
        if fa == fb {
            return Some(fa);
        }
        if fa < fb {
            a_cursor = Some(fa);
        } else {
            b_cursor = Some(fb);
        }
    }
    None
}

/// Combines two triggers such that the result fires only at instants that
/// are a fire of both. Cron+Cron pairs are combined field-by-field (the
/// fast path users reach for with `between(...) & every(...)`); any other
/// pair falls back to iterative convergence at evaluation time.
pub fn and(a: Trigger, b: Trigger) -> Result<Trigger, TriggerError> {
    if let (Trigger::Cron(fa, za), Trigger::Cron(fb, zb)) = (&a, &b) {
        if za != zb {
            return Err(TriggerError::ZoneMismatch(za.to_string(), zb.to_string()));
        }
        let combined = combine_cron_fields(fa, fb)?;
        return Ok(Trigger::Cron(combined, *za));
    }
    if let (Some(za), Some(zb)) = (a.zone(), b.zone()) {
        if za != zb {
            return Err(TriggerError::ZoneMismatch(za.to_string(), zb.to_string()));
        }
    }
    Ok(Trigger::And(Box::new(a), Box::new(b)))
}

/// Combines two triggers such that the result fires whenever either does.
pub fn or(a: Trigger, b: Trigger) -> Result<Trigger, TriggerError> {
    if let (Some(za), Some(zb)) = (a.zone(), b.zone()) {
        if za != zb {
            return Err(TriggerError::ZoneMismatch(za.to_string(), zb.to_string()));
        }
    }
    Ok(Trigger::Or(Box::new(a), Box::new(b)))
}

fn combine_cron_fields(a: &CronFields, b: &CronFields) -> Result<CronFields, TriggerError> {
    let combine = |name: &str, x: FieldExpr, y: FieldExpr| -> Result<FieldExpr, TriggerError> {
        x.combine_and(&y)
            .map_err(|_| TriggerError::IncompatibleAnd(name.to_string()))
    };
    Ok(CronFields {
        year: combine("year", a.year, b.year)?,
        month: combine("month", a.month, b.month)?,
        day: combine("day", a.day, b.day)?,
        week: combine("week", a.week, b.week)?,
        day_of_week: combine("day_of_week", a.day_of_week, b.day_of_week)?,
        hour: combine("hour", a.hour, b.hour)?,
        minute: combine("minute", a.minute, b.minute)?,
        second: combine("second", a.second, b.second)?,
    })
}
