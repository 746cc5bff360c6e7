//! Date ↔ pixel geometry of the timeline.
//!
//! All dates are calendar days (`NaiveDate`), so day arithmetic never sees a
//! daylight-saving shift.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Whole days from `a` to `b` (negative if `b` is earlier).
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Inclusive day count of `a..=b`, floored at zero.
pub fn duration(a: NaiveDate, b: NaiveDate) -> i64 {
    (days_between(a, b) + 1).max(0)
}

/// Left edge of `date`'s day cell in a window `view_start..=view_end`
/// rendered `width` pixels wide.
pub fn pixel_offset_for_date(
    date: NaiveDate,
    view_start: NaiveDate,
    view_end: NaiveDate,
    width: f32,
) -> f32 {
    let total = duration(view_start, view_end);
    if total == 0 {
        return 0.0;
    }
    days_between(view_start, date) as f32 / total as f32 * width
}

/// Right edge of `date`'s day cell. `view_end` maps to exactly `width`.
pub fn pixel_offset_for_day_end(
    date: NaiveDate,
    view_start: NaiveDate,
    view_end: NaiveDate,
    width: f32,
) -> f32 {
    pixel_offset_for_date(date + Duration::days(1), view_start, view_end, width)
}

/// Day cell under pixel `x` (inverse of `pixel_offset_for_date`).
pub fn date_for_pixel_offset(
    x: f32,
    view_start: NaiveDate,
    view_end: NaiveDate,
    width: f32,
) -> NaiveDate {
    let total = duration(view_start, view_end);
    if width <= 0.0 || total == 0 {
        return view_start;
    }
    let days = (x / width * total as f32).floor() as i64;
    view_start + Duration::days(days)
}

/// Days represented by a horizontal pointer movement.
pub fn drag_delta_days(pixel_delta_x: f32, container_width: f32, total_visible_days: i64) -> i64 {
    if container_width <= 0.0 {
        return 0;
    }
    (pixel_delta_x / container_width * total_visible_days as f32).round() as i64
}

/// Controls what scale the timeline header displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineScale {
    Days,
    #[default]
    Weeks,
    Months,
}

/// Manages the visible window of the timeline.
#[derive(Debug, Clone)]
pub struct TimelineViewport {
    /// First day of the window.
    pub start: NaiveDate,
    /// Last day of the window (inclusive).
    pub end: NaiveDate,
    /// Current display scale.
    pub scale: TimelineScale,
    /// Pixels per day (controls zoom level).
    pub pixels_per_day: f32,
}

impl TimelineViewport {
    pub const MIN_PIXELS_PER_DAY: f32 = 1.0;
    pub const MAX_PIXELS_PER_DAY: f32 = 80.0;

    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end: end.max(start),
            scale: TimelineScale::Weeks,
            pixels_per_day: 18.0,
        }
    }

    /// Window padded around `start..=end`, or around `today` when empty.
    pub fn fit(span: Option<(NaiveDate, NaiveDate)>, today: NaiveDate) -> Self {
        let (start, end) = span.unwrap_or((today, today));
        Self::new(start - Duration::days(7), end + Duration::days(30))
    }

    pub fn total_days(&self) -> i64 {
        duration(self.start, self.end)
    }

    /// Total width in pixels for the window.
    pub fn total_width(&self) -> f32 {
        self.total_days() as f32 * self.pixels_per_day
    }

    /// Convert a date to the x-offset of its left edge.
    pub fn date_to_x(&self, date: NaiveDate) -> f32 {
        pixel_offset_for_date(date, self.start, self.end, self.total_width())
    }

    /// Convert a date to the x-offset of its right edge.
    pub fn day_end_to_x(&self, date: NaiveDate) -> f32 {
        pixel_offset_for_day_end(date, self.start, self.end, self.total_width())
    }

    /// Convert an x-offset back to a date.
    pub fn x_to_date(&self, x: f32) -> NaiveDate {
        date_for_pixel_offset(x, self.start, self.end, self.total_width())
    }

    /// Days that fit in `container_width` pixels at the current zoom.
    pub fn visible_days(&self, container_width: f32) -> i64 {
        ((container_width / self.pixels_per_day).round() as i64).max(1)
    }

    /// Zoom in (increase pixels per day).
    pub fn zoom_in(&mut self) {
        self.pixels_per_day = (self.pixels_per_day * 1.2).min(Self::MAX_PIXELS_PER_DAY);
    }

    /// Zoom out (decrease pixels per day).
    pub fn zoom_out(&mut self) {
        self.pixels_per_day = (self.pixels_per_day / 1.2).max(Self::MIN_PIXELS_PER_DAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_counts() {
        assert_eq!(days_between(d(2026, 3, 1), d(2026, 3, 31)), 30);
        assert_eq!(days_between(d(2026, 3, 31), d(2026, 3, 1)), -30);
        assert_eq!(duration(d(2026, 3, 1), d(2026, 3, 1)), 1);
        assert_eq!(duration(d(2026, 3, 5), d(2026, 3, 1)), 0);
        // spans a DST change in most northern time zones
        assert_eq!(days_between(d(2026, 3, 28), d(2026, 3, 30)), 2);
    }

    #[test]
    fn drag_delta_rounds_to_whole_days() {
        assert_eq!(drag_delta_days(60.0, 1460.0, 365), 15);
        assert_eq!(drag_delta_days(-61.0, 1460.0, 365), -15);
        assert_eq!(drag_delta_days(1.0, 1460.0, 365), 0);
        assert_eq!(drag_delta_days(10.0, 0.0, 365), 0);
    }

    #[test]
    fn viewport_maps_dates_both_ways() {
        let vp = TimelineViewport::new(d(2026, 1, 1), d(2026, 1, 10));
        assert_eq!(vp.total_days(), 10);
        assert!((vp.date_to_x(d(2026, 1, 3)) - 2.0 * vp.pixels_per_day).abs() < 1e-3);
        assert_eq!(vp.x_to_date(vp.date_to_x(d(2026, 1, 7)) + 1.0), d(2026, 1, 7));
        assert_eq!(vp.day_end_to_x(d(2026, 1, 10)), vp.total_width());
    }

    proptest! {
        #[test]
        fn prop_window_edges_map_to_zero_and_width(
            start_offset in 0i64..20_000,
            span in 1i64..2_000,
            width in 1.0f32..10_000.0,
        ) {
            let view_start = d(1990, 1, 1) + Duration::days(start_offset);
            let view_end = view_start + Duration::days(span);
            prop_assert_eq!(pixel_offset_for_date(view_start, view_start, view_end, width), 0.0);
            let right = pixel_offset_for_day_end(view_end, view_start, view_end, width);
            prop_assert!((right - width).abs() <= width * 1e-5);
        }
    }
}
