//! Cron field expressions: wildcard, literal, range, step, ranged-step.
//!
//! Grounded on the field model implied by `anterior/warp/schedule.py`'s
//! `_is_range` / `_is_recurrent` helpers, which inspect exactly this shape of
//! string before combining two cron fields in `Schedule.__and__`. Kept as an
//! explicit, introspectable type (rather than reusing an opaque cron-parsing
//! crate) because the And-combinator in `trigger::combinator` needs to tell
//! a range from a step from a literal.

use crate::error::ConfigError;

/// One field of a cron expression (e.g. "the hour field").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldExpr {
    /// `*`, matches any value in range.
    Wildcard,
    /// A single value, e.g. `5`.
    Literal(u32),
    /// `a-b` inclusive.
    Range(u32, u32),
    /// `*/n`, every nth value starting at the field's minimum.
    Step(u32),
    /// `a-b/n`, every nth value within `a..=b`, starting at `a`.
    RangedStep(u32, u32, u32),
}

impl FieldExpr {
    /// Parses a single cron field token. `aliases` resolves named tokens
    /// (e.g. day-of-week names) to their integer value before parsing.
    pub fn parse(token: &str, aliases: &dyn Fn(&str) -> Option<u32>) -> Result<Self, ConfigError> {
        let token = token.trim();
        if token == "*" {
            return Ok(FieldExpr::Wildcard);
        }
        if let Some(rest) = token.strip_prefix("*/") {
            let n = parse_u32(rest, aliases, token)?;
            return Ok(FieldExpr::Step(n));
        }
        if let Some((range_part, step_part)) = token.split_once('/') {
            let (a, b) = split_range(range_part, aliases, token)?;
            let n = parse_u32(step_part, aliases, token)?;
            return Ok(FieldExpr::RangedStep(a, b, n));
        }
        if token.contains('-') {
            let (a, b) = split_range(token, aliases, token)?;
            return Ok(FieldExpr::Range(a, b));
        }
        let v = parse_u32(token, aliases, token)?;
        Ok(FieldExpr::Literal(v))
    }

    /// Whether `value` satisfies this field expression, given the field's
    /// natural minimum (used as the step anchor for `Step`).
    pub fn matches(&self, value: u32, field_min: u32) -> bool {
        match *self {
            FieldExpr::Wildcard => true,
            FieldExpr::Literal(v) => value == v,
            FieldExpr::Range(a, b) => value >= a && value <= b,
            FieldExpr::Step(n) => n != 0 && (value.saturating_sub(field_min)) % n == 0,
            FieldExpr::RangedStep(a, b, n) => {
                value >= a && value <= b && n != 0 && (value - a) % n == 0
            }
        }
    }

    /// The smallest value in `field_min..=field_max` that matches, if any.
    pub fn smallest_match(&self, field_min: u32, field_max: u32) -> Option<u32> {
        (field_min..=field_max).find(|&v| self.matches(v, field_min))
    }

    /// The smallest matching value strictly greater than `after`, if any,
    /// within `field_min..=field_max`.
    pub fn next_match_after(&self, after: u32, field_min: u32, field_max: u32) -> Option<u32> {
        if after >= field_max {
            return None;
        }
        ((after + 1)..=field_max).find(|&v| self.matches(v, field_min))
    }

    /// Combines this field with `other` per the And-combinator rules: a
    /// range paired with a step becomes a ranged-step; a field only one
    /// side constrains keeps that constraint; two differing non-step
    /// ranges are incompatible.
    pub fn combine_and(&self, other: &FieldExpr) -> Result<FieldExpr, ConfigError> {
        use FieldExpr::*;
        match (*self, *other) {
            (Wildcard, other) => Ok(other),
            (me, Wildcard) => Ok(me),
            (a, b) if a == b => Ok(a),
            (Range(a, b), Step(n)) | (Step(n), Range(a, b)) => Ok(RangedStep(a, b, n)),
            (RangedStep(a, b, n), Literal(_)) | (Literal(_), RangedStep(a, b, n)) => {
                Ok(RangedStep(a, b, n))
            }
            (a, b) => Err(ConfigError::MalformedCron(format!(
                "incompatible field combination: {a:?} and {b:?}"
            ))),
        }
    }
}

fn split_range(
    s: &str,
    aliases: &dyn Fn(&str) -> Option<u32>,
    original: &str,
) -> Result<(u32, u32), ConfigError> {
    let (a, b) = s
        .split_once('-')
        .ok_or_else(|| ConfigError::MalformedCron(original.to_string()))?;
    Ok((
        parse_u32(a, aliases, original)?,
        parse_u32(b, aliases, original)?,
    ))
}

fn parse_u32(
    s: &str,
    aliases: &dyn Fn(&str) -> Option<u32>,
    original: &str,
) -> Result<u32, ConfigError> {
    let s = s.trim();
    if let Some(v) = aliases(s) {
        return Ok(v);
    }
    s.parse::<u32>()
        .map_err(|_| ConfigError::MalformedCron(original.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_aliases(_: &str) -> Option<u32> {
        None
    }

    #[test]
    fn parses_wildcard() {
        assert_eq!(FieldExpr::parse("*", &no_aliases).unwrap(), FieldExpr::Wildcard);
    }

    #[test]
    fn parses_literal() {
        assert_eq!(FieldExpr::parse("5", &no_aliases).unwrap(), FieldExpr::Literal(5));
    }

    #[test]
    fn parses_range() {
        assert_eq!(FieldExpr::parse("9-17", &no_aliases).unwrap(), FieldExpr::Range(9, 17));
    }

    #[test]
    fn parses_step() {
        assert_eq!(FieldExpr::parse("*/15", &no_aliases).unwrap(), FieldExpr::Step(15));
    }

    #[test]
    fn parses_ranged_step() {
        assert_eq!(
            FieldExpr::parse("9-17/2", &no_aliases).unwrap(),
            FieldExpr::RangedStep(9, 17, 2)
        );
    }

    #[test]
    fn parses_day_of_week_alias() {
        let alias = |s: &str| match s {
            "mon" => Some(0),
            "sun" => Some(6),
            _ => None,
        };
        assert_eq!(FieldExpr::parse("mon", &alias).unwrap(), FieldExpr::Literal(0));
    }

    #[test]
    fn rejects_malformed_token() {
        assert!(FieldExpr::parse("abc", &no_aliases).is_err());
    }

    #[test]
    fn step_matches_multiples_of_n_from_field_min() {
        let f = FieldExpr::Step(15);
        assert!(f.matches(0, 0));
        assert!(f.matches(15, 0));
        assert!(f.matches(45, 0));
        assert!(!f.matches(20, 0));
    }

    #[test]
    fn ranged_step_respects_bounds_and_stride() {
        let f = FieldExpr::RangedStep(9, 17, 2);
        assert!(f.matches(9, 0));
        assert!(f.matches(11, 0));
        assert!(!f.matches(10, 0));
        assert!(!f.matches(19, 0));
    }

    #[test]
    fn next_match_after_skips_to_next_valid_value() {
        let f = FieldExpr::Step(15);
        assert_eq!(f.next_match_after(0, 0, 59), Some(15));
        assert_eq!(f.next_match_after(50, 0, 59), None);
    }

    #[test]
    fn combine_range_and_step_yields_ranged_step() {
        let a = FieldExpr::Range(9, 17);
        let b = FieldExpr::Step(15);
        assert_eq!(a.combine_and(&b).unwrap(), FieldExpr::RangedStep(9, 17, 15));
    }

    #[test]
    fn combine_wildcard_with_anything_keeps_the_constraint() {
        let a = FieldExpr::Wildcard;
        let b = FieldExpr::Range(9, 17);
        assert_eq!(a.combine_and(&b).unwrap(), FieldExpr::Range(9, 17));
    }

    #[test]
    fn combine_two_differing_ranges_is_incompatible() {
        let a = FieldExpr::Range(9, 17);
        let b = FieldExpr::Range(8, 12);
        assert!(a.combine_and(&b).is_err());
    }
}
