//! A narrow, date-filtered view over a caller's own data, keyed against the
//! scheduler's virtualized clock.
//!
//! Grounded on `anterior/source/frame.py`'s `OracleDataFrame`: a wrapper that
//! only exposes rows before (or after) the current simulated date. Rather
//! than forwarding arbitrary DataFrame-style methods dynamically, this
//! exposes a narrow contract. `filtered_snapshot` takes a fresh read of
//! `now()` on every call and returns an owned `Snapshot`, never a cached
//! view, so a snapshot taken before the clock advances and one taken after
//! can differ even if the caller didn't touch anything in between.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Only rows strictly before `now`.
    Past,
    /// Only rows at or after `now`.
    Future,
}

/// Implemented by a caller's own row collection to opt into date-filtered
/// snapshots. `Row` must be cheap to clone since a snapshot owns copies.
pub trait FilteredView {
    type Row: Clone;

    fn rows(&self) -> &[Self::Row];
    fn date_of(&self, row: &Self::Row) -> DateTime<Utc>;

    /// Takes a fresh filtered copy of `rows()` as of `now`. Never caches:
    /// call again after the clock moves to see a different view.
    fn filtered_snapshot(&self, now: DateTime<Utc>, mode: ViewMode) -> Snapshot<Self::Row> {
        let rows = self
            .rows()
            .iter()
            .filter(|row| match mode {
                ViewMode::Past => self.date_of(row) < now,
                ViewMode::Future => self.date_of(row) >= now,
            })
            .cloned()
            .collect();
        Snapshot { rows }
    }
}

/// An owned, point-in-time filtered copy of a `FilteredView`'s rows.
#[derive(Debug, Clone)]
pub struct Snapshot<Row> {
    rows: Vec<Row>,
}

impl<Row> Snapshot<Row> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use chrono::TimeZone;

    #[derive(Clone)]
    struct Tick {
        at: DateTime<Utc>,
        price: f64,
    }

    struct Ticks(Vec<Tick>);

    impl FilteredView for Ticks {
        type Row = Tick;

        fn rows(&self) -> &[Tick] {
            &self.0
        }

        fn date_of(&self, row: &Tick) -> DateTime<Utc> {
            row.at
        }
    }

    fn utc(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn past_mode_excludes_rows_at_or_after_now() {
        let ticks = Ticks(vec![
            Tick { at: utc(2020, 1, 1), price: 1.0 },
            Tick { at: utc(2020, 6, 1), price: 2.0 },
            Tick { at: utc(2020, 12, 1), price: 3.0 },
        ]);
        let snap = ticks.filtered_snapshot(utc(2020, 6, 1), ViewMode::Past);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get(0).unwrap().price, 1.0);
    }

    #[test]
    fn future_mode_includes_the_boundary_row() {
        let ticks = Ticks(vec![
            Tick { at: utc(2020, 1, 1), price: 1.0 },
            Tick { at: utc(2020, 6, 1), price: 2.0 },
        ]);
        let snap = ticks.filtered_snapshot(utc(2020, 6, 1), ViewMode::Future);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get(0).unwrap().price, 2.0);
    }

    #[test]
    fn snapshots_taken_before_and_after_the_clock_moves_differ() {
        let ticks = Ticks(vec![
            Tick { at: utc(2020, 1, 1), price: 1.0 },
            Tick { at: utc(2020, 6, 1), price: 2.0 },
        ]);
        let clock = VirtualClock::new();
        clock.freeze(utc(2020, 1, 1)).unwrap();

        let before = ticks.filtered_snapshot(clock.now(), ViewMode::Past);
        clock.move_to(utc(2020, 12, 1)).unwrap();
        let after = ticks.filtered_snapshot(clock.now(), ViewMode::Past);

        assert_eq!(before.len(), 0);
        assert_eq!(after.len(), 2);
    }
}
