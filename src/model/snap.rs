use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// How dragged dates are rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapMode {
    /// Whole days only.
    Day,
    /// Month boundaries when zoomed out, whole days when zoomed in.
    #[default]
    Adaptive,
}

/// Which boundary a dragged date is heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapEdge {
    /// A span's first day: snaps to a 1st of month.
    Start,
    /// A span's last day: snaps to a last of month.
    End,
    /// A single-day marker: nearest month start or month end.
    Closest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub mode: SnapMode,
    /// Visible span (in days) from which adaptive snapping uses months.
    pub month_threshold_days: i64,
}

impl SnapConfig {
    pub const DEFAULT_MONTH_THRESHOLD_DAYS: i64 = 90;

    pub fn new(mode: SnapMode, month_threshold_days: i64) -> Self {
        Self {
            mode,
            month_threshold_days,
        }
    }

    /// True if dates snap to month boundaries at this zoom.
    pub fn uses_months(&self, total_visible_days: i64) -> bool {
        self.mode == SnapMode::Adaptive && total_visible_days >= self.month_threshold_days
    }

    pub fn snap(&self, date: NaiveDate, edge: SnapEdge, total_visible_days: i64) -> NaiveDate {
        if self.uses_months(total_visible_days) {
            snap_to_month(date, edge)
        } else {
            date
        }
    }
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self::new(SnapMode::Adaptive, Self::DEFAULT_MONTH_THRESHOLD_DAYS)
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(date + Duration::days(31))
}

pub fn month_end(date: NaiveDate) -> NaiveDate {
    next_month_start(date) - Duration::days(1)
}

fn previous_month_end(date: NaiveDate) -> NaiveDate {
    month_start(date) - Duration::days(1)
}

/// Round to the nearest month boundary for `edge`. Ties go to the earlier date.
pub fn snap_to_month(date: NaiveDate, edge: SnapEdge) -> NaiveDate {
    let candidates = match edge {
        SnapEdge::Start => [month_start(date), next_month_start(date), next_month_start(date)],
        SnapEdge::End => [previous_month_end(date), month_end(date), month_end(date)],
        SnapEdge::Closest => [month_start(date), month_end(date), next_month_start(date)],
    };
    candidates
        .into_iter()
        .min_by_key(|c| ((*c - date).num_days().abs(), *c))
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn start_edge_snaps_to_nearest_first() {
        assert_eq!(snap_to_month(d(2026, 1, 25), SnapEdge::Start), d(2026, 2, 1));
        assert_eq!(snap_to_month(d(2026, 1, 10), SnapEdge::Start), d(2026, 1, 1));
        assert_eq!(snap_to_month(d(2026, 12, 20), SnapEdge::Start), d(2027, 1, 1));
    }

    #[test]
    fn end_edge_snaps_to_nearest_last_day() {
        assert_eq!(snap_to_month(d(2026, 3, 4), SnapEdge::End), d(2026, 2, 28));
        assert_eq!(snap_to_month(d(2026, 3, 20), SnapEdge::End), d(2026, 3, 31));
        assert_eq!(snap_to_month(d(2024, 3, 2), SnapEdge::End), d(2024, 2, 29));
    }

    #[test]
    fn closest_edge_considers_both_boundaries() {
        assert_eq!(snap_to_month(d(2026, 3, 29), SnapEdge::Closest), d(2026, 3, 31));
        assert_eq!(snap_to_month(d(2026, 3, 3), SnapEdge::Closest), d(2026, 3, 1));
        // equidistant from Mar 1 and Mar 31: the earlier one wins
        assert_eq!(snap_to_month(d(2026, 3, 16), SnapEdge::Closest), d(2026, 3, 1));
    }

    #[test]
    fn adaptive_degrades_to_days_when_zoomed_in() {
        let cfg = SnapConfig::default();
        assert_eq!(cfg.snap(d(2026, 1, 25), SnapEdge::Start, 30), d(2026, 1, 25));
        assert_eq!(cfg.snap(d(2026, 1, 25), SnapEdge::Start, 365), d(2026, 2, 1));
        let day = SnapConfig::new(SnapMode::Day, 90);
        assert_eq!(day.snap(d(2026, 1, 25), SnapEdge::Start, 365), d(2026, 1, 25));
    }

    fn arb_edge() -> impl Strategy<Value = SnapEdge> {
        prop_oneof![Just(SnapEdge::Start), Just(SnapEdge::End), Just(SnapEdge::Closest)]
    }

    proptest! {
        #[test]
        fn prop_snap_is_idempotent(
            offset in 0i64..40_000,
            edge in arb_edge(),
            visible in 1i64..800,
            adaptive in any::<bool>(),
        ) {
            let date = d(1970, 1, 1) + Duration::days(offset);
            let mode = if adaptive { SnapMode::Adaptive } else { SnapMode::Day };
            let cfg = SnapConfig::new(mode, 90);
            let once = cfg.snap(date, edge, visible);
            prop_assert_eq!(cfg.snap(once, edge, visible), once);
        }
    }
}
