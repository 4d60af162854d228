//! Property-style checks against the `Trigger` algebra directly: no driver
//! involved, since `next_fire` is pure.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::UTC;
use timewarp::trigger::cron::CronFields;
use timewarp::trigger::field::FieldExpr;
use timewarp::trigger::{self, Trigger};

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

fn hourly() -> Trigger {
    let mut f = CronFields::default();
    f.minute = FieldExpr::Literal(0);
    f.second = FieldExpr::Literal(0);
    Trigger::Cron(f, UTC)
}

/// Property 1: for consecutive fires t1 < t2, next_fire(t1) == t2.
#[test]
fn monotonic_fires_are_reproducible_from_either_endpoint() {
    let trigger = hourly();
    let start = utc(2024, 1, 1, 0, 30, 0);
    let t1 = trigger.next_fire(None, start).unwrap();
    let t2 = trigger.next_fire(Some(t1), start).unwrap();
    assert!(t1 < t2);
    assert_eq!(trigger.next_fire(Some(t1), start), Some(t2));
}

/// Property 2: next_fire(t, now) is always strictly after t.
#[test]
fn strict_advancement_holds_across_many_steps() {
    let trigger = hourly();
    let now = utc(2024, 1, 1, 0, 0, 0);
    let mut cursor = None;
    for _ in 0..50 {
        let next = trigger.next_fire(cursor, now).unwrap();
        if let Some(prev) = cursor {
            assert!(next > prev);
        }
        cursor = Some(next);
    }
}

/// Property 6: (A & B) fires at instants that are fires of both component
/// triggers; (A | B) fires at the min of the two.
#[test]
fn and_combinator_fires_satisfy_both_components() {
    let mut business_hours = CronFields::default();
    business_hours.hour = FieldExpr::Range(9, 17);
    let quarter_hours = {
        let mut f = CronFields::default();
        f.minute = FieldExpr::Step(15);
        f.second = FieldExpr::Literal(0);
        f
    };
    let combined = trigger::and(
        Trigger::Cron(business_hours.clone(), UTC),
        Trigger::Cron(quarter_hours.clone(), UTC),
    )
    .unwrap();

    let a = Trigger::Cron(business_hours, UTC);
    let b = Trigger::Cron(quarter_hours, UTC);

    let start = utc(2023, 6, 1, 8, 50, 0);
    let mut cursor = None;
    for _ in 0..5 {
        let fire = combined.next_fire(cursor, start).unwrap();
        assert_eq!(a.next_fire(cursor, start), Some(fire));
        assert_eq!(b.next_fire(cursor, start), Some(fire));
        cursor = Some(fire);
    }
}

#[test]
fn or_combinator_fires_at_the_min_of_its_components() {
    let morning = {
        let mut f = CronFields::default();
        f.hour = FieldExpr::Range(9, 12);
        f.minute = FieldExpr::Literal(0);
        f.second = FieldExpr::Literal(0);
        Trigger::Cron(f, UTC)
    };
    let afternoon = {
        let mut f = CronFields::default();
        f.hour = FieldExpr::Range(13, 16);
        f.minute = FieldExpr::Literal(0);
        f.second = FieldExpr::Literal(0);
        Trigger::Cron(f, UTC)
    };
    let either = trigger::or(morning.clone(), afternoon.clone()).unwrap();

    let now = utc(2023, 6, 1, 0, 0, 0);
    let expected = match (morning.next_fire(None, now), afternoon.next_fire(None, now)) {
        (Some(x), Some(y)) => x.min(y),
        _ => panic!("both components should fire"),
    };
    assert_eq!(either.next_fire(None, now), Some(expected));
}

/// Property 7: a once() job fires at most once. Modeled here as the
/// predicate gate flipping permanently false after its first true result.
#[test]
fn once_semantics_cap_dispatch_at_a_single_satisfied_predicate_check() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let fired = Arc::new(AtomicBool::new(false));
    let fired_check = Arc::clone(&fired);
    let cond = Trigger::Conditional {
        inner: Box::new(hourly()),
        predicates: vec![Arc::new(move || !fired_check.load(Ordering::SeqCst))],
        once: true,
    };
    let (_inner, predicates, once) = cond.as_conditional().unwrap();
    assert!(once);
    assert!(predicates[0]());
    fired.store(true, Ordering::SeqCst);
    assert!(!predicates[0]());
}

/// Property 8: a trigger whose next fire is exhausted returns None (Never),
/// which is what the driver's expiry check keys off of.
#[test]
fn never_firing_trigger_reports_none() {
    let t = timewarp::trigger::date::DateTrigger::new(utc(2020, 1, 1, 0, 0, 0));
    let t = Trigger::Date(t);
    assert_eq!(t.next_fire(Some(utc(2020, 1, 1, 0, 0, 0)), utc(2020, 1, 1, 0, 0, 0)), None);
}

#[test]
fn date_trigger_past_target_is_immediately_never() {
    let t = Trigger::Date(timewarp::trigger::date::DateTrigger::new(utc(2010, 1, 1, 0, 0, 0)));
    assert_eq!(t.next_fire(None, utc(2024, 1, 1, 0, 0, 0)), None);
}
