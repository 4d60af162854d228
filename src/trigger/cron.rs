//! Calendar (cron) triggers: field matching and next-fire search.
//!
//! The search strategy walks forward day by day looking for a date that
//! matches the calendar fields (year/month/day/week/day-of-week), then
//! searches that day's hour/minute/second fields for the earliest matching
//! time. DST is resolved by preferring the earliest local interpretation on
//! a fall-back overlap, and by skipping local times that fall in a
//! spring-forward gap (`from_local_datetime` returns no result for those).

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ConfigError;
use crate::trigger::field::FieldExpr;

/// Bound on how many calendar days to search before giving up and
/// returning `Never`. About eight years; generous for any realistic
/// schedule while keeping a pathological expression (e.g. Feb 30) from
/// looping forever.
const MAX_DAYS_SEARCHED: i64 = 366 * 8;

#[derive(Debug, Clone)]
pub struct CronFields {
    pub year: FieldExpr,
    pub month: FieldExpr,
    pub day: FieldExpr,
    pub week: FieldExpr,
    pub day_of_week: FieldExpr,
    pub hour: FieldExpr,
    pub minute: FieldExpr,
    pub second: FieldExpr,
}

impl Default for CronFields {
    fn default() -> Self {
        Self {
            year: FieldExpr::Wildcard,
            month: FieldExpr::Wildcard,
            day: FieldExpr::Wildcard,
            week: FieldExpr::Wildcard,
            day_of_week: FieldExpr::Wildcard,
            hour: FieldExpr::Wildcard,
            minute: FieldExpr::Wildcard,
            second: FieldExpr::Wildcard,
        }
    }
}

fn day_of_week_alias(token: &str) -> Option<u32> {
    match token.to_ascii_lowercase().as_str() {
        "mon" => Some(0),
        "tue" => Some(1),
        "wed" => Some(2),
        "thu" => Some(3),
        "fri" => Some(4),
        "sat" => Some(5),
        "sun" => Some(6),
        _ => None,
    }
}

fn no_alias(_: &str) -> Option<u32> {
    None
}

impl CronFields {
    /// Parses the standard 6-field form `second minute hour day month
    /// day_of_week`. Year and week are left as wildcards; use the facade
    /// builders for field-by-field construction with least-specific-fill
    /// semantics.
    pub fn parse_expression(expr: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 6 {
            return Err(ConfigError::MalformedCron(format!(
                "expected 6 fields (second minute hour day month day_of_week), got {}: `{expr}`",
                parts.len()
            )));
        }
        Ok(Self {
            year: FieldExpr::Wildcard,
            week: FieldExpr::Wildcard,
            second: FieldExpr::parse(parts[0], &no_alias)?,
            minute: FieldExpr::parse(parts[1], &no_alias)?,
            hour: FieldExpr::parse(parts[2], &no_alias)?,
            day: FieldExpr::parse(parts[3], &no_alias)?,
            month: FieldExpr::parse(parts[4], &no_alias)?,
            day_of_week: FieldExpr::parse(parts[5], &day_of_week_alias)?,
        })
    }

    fn date_matches(&self, date: NaiveDate) -> bool {
        self.year.matches(date.year() as u32, 0)
            && self.month.matches(date.month(), 1)
            && self.day.matches(date.day(), 1)
            && self.week.matches(date.iso_week().week(), 1)
            && self
                .day_of_week
                .matches(date.weekday().num_days_from_monday(), 0)
    }

    /// Earliest local time on `date`, at or after `(from_h, from_m, from_s)`,
    /// matching the time fields and resolvable to a real local instant.
    fn first_valid_time_in_day(
        &self,
        zone: Tz,
        date: NaiveDate,
        from_h: u32,
        from_m: u32,
        from_s: u32,
    ) -> Option<DateTime<Tz>> {
        for h in from_h..=23 {
            if !self.hour.matches(h, 0) {
                continue;
            }
            let m_floor = if h == from_h { from_m } else { 0 };
            for m in m_floor..=59 {
                if !self.minute.matches(m, 0) {
                    continue;
                }
                let s_floor = if h == from_h && m == from_m { from_s } else { 0 };
                for s in s_floor..=59 {
                    if !self.second.matches(s, 0) {
                        continue;
                    }
                    let Some(naive) = date.and_hms_opt(h, m, s) else {
                        continue;
                    };
                    if let Some(dt) = zone.from_local_datetime(&naive).earliest() {
                        return Some(dt);
                    }
                }
            }
        }
        None
    }

    /// Strictly-after-cursor search, per the Trigger contract.
    pub fn next_fire(
        &self,
        cursor: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        zone: Tz,
    ) -> Option<DateTime<Utc>> {
        // Always search strictly after the effective cursor. When no job
        // has fired yet, the effective cursor is `now` itself: a calendar
        // trigger whose fields happen to match the driver's start instant
        // exactly does not fire at start (the driver's own kickstart call
        // covers "schedule is now active"; see the half-yearly backtest
        // scenario, which begins its first fire six months after start).
        let start_utc = cursor.unwrap_or(now) + Duration::seconds(1);
        let start_local = start_utc.with_timezone(&zone);
        let mut date = start_local.date_naive();
        let mut first_day = true;

        for _ in 0..MAX_DAYS_SEARCHED {
            if self.date_matches(date) {
                let (fh, fm, fs) = if first_day {
                    (
                        start_local.time().hour(),
                        start_local.time().minute(),
                        start_local.time().second(),
                    )
                } else {
                    (0, 0, 0)
                };
                if let Some(dt) = self.first_valid_time_in_day(zone, date, fh, fm, fs) {
                    return Some(dt.with_timezone(&Utc));
                }
            }
            first_day = false;
            date = date.succ_opt()?;
        }
        None
    }
}
