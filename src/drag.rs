//! Pointer drag state machine for bars and milestones.
//!
//! The controller never touches the forest. It turns a stream of pointer
//! events into preview dates and, on release, exactly one `DragSignal` for
//! the caller to apply.

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::model::snap::{SnapConfig, SnapEdge};
use crate::model::timeline::drag_delta_days;
use crate::model::{EntityId, TimelineViewport};

/// What part of a bar is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    ResizeStart,
    ResizeEnd,
}

/// Screen geometry captured when a drag starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragGeometry {
    /// Width in pixels of the visible chart area.
    pub container_width: f32,
    /// Days shown across `container_width`.
    pub visible_days: i64,
    /// Height of one task row, used to turn vertical movement into rows.
    pub row_height: f32,
}

impl DragGeometry {
    pub fn from_viewport(viewport: &TimelineViewport, container_width: f32, row_height: f32) -> Self {
        Self {
            container_width,
            visible_days: viewport.visible_days(container_width),
            row_height,
        }
    }

    fn days_for(&self, dx: f32) -> i64 {
        drag_delta_days(dx, self.container_width, self.visible_days)
    }

    fn pixels_for(&self, days: i64) -> f32 {
        if self.visible_days <= 0 {
            return 0.0;
        }
        days as f32 * self.container_width / self.visible_days as f32
    }

    fn rows_for(&self, dy: f32) -> i32 {
        if self.row_height <= 0.0 {
            return 0;
        }
        (dy / self.row_height).round() as i32
    }
}

/// The bar (or one time range of it) under the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarTarget {
    pub task_id: EntityId,
    /// `None` for a legacy single-span task.
    pub range_id: Option<EntityId>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneTarget {
    pub task_id: EntityId,
    pub milestone_id: EntityId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarSession {
    pub target: BarTarget,
    pub kind: DragKind,
    anchor: (f32, f32),
    geometry: DragGeometry,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub row_delta: i32,
    pub copy_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MilestoneSession {
    pub target: MilestoneTarget,
    anchor: (f32, f32),
    geometry: DragGeometry,
    pub date: NaiveDate,
    pub copy_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Bar(BarSession),
    Milestone(MilestoneSession),
}

/// Which pointer button started the gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Input fed to the controller while a drag may be in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragEvent {
    PointerMove { x: f32, y: f32, copy_modifier: bool },
    PointerUp { copy_modifier: bool },
    Escape,
}

/// Final outcome of a drag session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragSignal {
    CommitBar {
        target: BarTarget,
        kind: DragKind,
        start: NaiveDate,
        end: NaiveDate,
        /// Rows moved vertically (positive is down). Always 0 for resizes.
        row_delta: i32,
        copy: bool,
    },
    CommitMilestone {
        target: MilestoneTarget,
        date: NaiveDate,
        copy: bool,
    },
    Cancel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragResponse {
    /// True if the event belonged to an active drag and should not reach
    /// other widgets.
    pub consumed: bool,
    pub signal: Option<DragSignal>,
}

impl DragResponse {
    fn ignored() -> Self {
        Self::default()
    }

    fn consumed() -> Self {
        Self {
            consumed: true,
            signal: None,
        }
    }

    fn signal(signal: DragSignal) -> Self {
        Self {
            consumed: true,
            signal: Some(signal),
        }
    }
}

/// What the chart should draw for the item being dragged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragPreview {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Horizontal shift of the start edge, in pixels.
    pub start_offset_px: f32,
    /// Horizontal shift of the end edge, in pixels.
    pub end_offset_px: f32,
    pub row_delta: i32,
    pub copy_mode: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DragController {
    state: DragState,
    snap: SnapConfig,
}

impl DragController {
    pub fn new(snap: SnapConfig) -> Self {
        Self {
            state: DragState::Idle,
            snap,
        }
    }

    pub fn set_snap(&mut self, snap: SnapConfig) {
        self.snap = snap;
    }

    pub fn snap(&self) -> SnapConfig {
        self.snap
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// True if `id` is the task, range or milestone being dragged.
    pub fn is_dragging(&self, id: &str) -> bool {
        match &self.state {
            DragState::Idle => false,
            DragState::Bar(s) => s.target.task_id == id || s.target.range_id.as_deref() == Some(id),
            DragState::Milestone(s) => s.target.milestone_id == id,
        }
    }

    /// Start dragging a bar. Ignored unless the primary button is down and
    /// no other drag is running.
    pub fn begin_bar(
        &mut self,
        button: PointerButton,
        target: BarTarget,
        kind: DragKind,
        pointer: (f32, f32),
        geometry: DragGeometry,
    ) -> bool {
        if button != PointerButton::Primary || self.is_active() {
            return false;
        }
        debug!(task_id = %target.task_id, ?kind, "bar drag started");
        self.state = DragState::Bar(BarSession {
            kind,
            anchor: pointer,
            geometry,
            start: target.start,
            end: target.end,
            row_delta: 0,
            copy_mode: false,
            target,
        });
        true
    }

    pub fn begin_milestone(
        &mut self,
        button: PointerButton,
        target: MilestoneTarget,
        pointer: (f32, f32),
        geometry: DragGeometry,
    ) -> bool {
        if button != PointerButton::Primary || self.is_active() {
            return false;
        }
        debug!(milestone_id = %target.milestone_id, "milestone drag started");
        self.state = DragState::Milestone(MilestoneSession {
            anchor: pointer,
            geometry,
            date: target.date,
            copy_mode: false,
            target,
        });
        true
    }

    pub fn handle(&mut self, event: DragEvent) -> DragResponse {
        if !self.is_active() {
            return DragResponse::ignored();
        }
        match event {
            DragEvent::PointerMove {
                x,
                y,
                copy_modifier,
            } => {
                let snap = self.snap;
                match &mut self.state {
                    DragState::Bar(session) => session.update(snap, x, y, copy_modifier),
                    DragState::Milestone(session) => session.update(snap, x, copy_modifier),
                    DragState::Idle => {}
                }
                DragResponse::consumed()
            }
            DragEvent::PointerUp { copy_modifier } => {
                let signal = match std::mem::take(&mut self.state) {
                    DragState::Bar(session) => DragSignal::CommitBar {
                        row_delta: if session.kind == DragKind::Move {
                            session.row_delta
                        } else {
                            0
                        },
                        target: session.target,
                        kind: session.kind,
                        start: session.start,
                        end: session.end,
                        copy: copy_modifier,
                    },
                    DragState::Milestone(session) => DragSignal::CommitMilestone {
                        target: session.target,
                        date: session.date,
                        copy: copy_modifier,
                    },
                    DragState::Idle => return DragResponse::ignored(),
                };
                debug!(?signal, "drag committed");
                DragResponse::signal(signal)
            }
            DragEvent::Escape => {
                self.state = DragState::Idle;
                debug!("drag cancelled");
                DragResponse::signal(DragSignal::Cancel)
            }
        }
    }

    pub fn preview(&self) -> Option<DragPreview> {
        match &self.state {
            DragState::Idle => None,
            DragState::Bar(s) => Some(DragPreview {
                start: s.start,
                end: s.end,
                start_offset_px: s.geometry.pixels_for((s.start - s.target.start).num_days()),
                end_offset_px: s.geometry.pixels_for((s.end - s.target.end).num_days()),
                row_delta: s.row_delta,
                copy_mode: s.copy_mode,
            }),
            DragState::Milestone(s) => {
                let offset = s.geometry.pixels_for((s.date - s.target.date).num_days());
                Some(DragPreview {
                    start: s.date,
                    end: s.date,
                    start_offset_px: offset,
                    end_offset_px: offset,
                    row_delta: 0,
                    copy_mode: s.copy_mode,
                })
            }
        }
    }
}

impl BarSession {
    fn update(&mut self, snap: SnapConfig, x: f32, y: f32, copy_modifier: bool) {
        self.copy_mode = copy_modifier;
        let days = self.geometry.days_for(x - self.anchor.0);
        let visible = self.geometry.visible_days;
        let original = &self.target;
        match self.kind {
            DragKind::Move => {
                let length = original.end - original.start;
                let start = snap.snap(original.start + Duration::days(days), SnapEdge::Start, visible);
                self.start = start;
                self.end = start + length;
                self.row_delta = self.geometry.rows_for(y - self.anchor.1);
            }
            DragKind::ResizeStart => {
                let start = snap.snap(original.start + Duration::days(days), SnapEdge::Start, visible);
                if start < self.end {
                    self.start = start;
                }
            }
            DragKind::ResizeEnd => {
                let end = snap.snap(original.end + Duration::days(days), SnapEdge::End, visible);
                if end > self.start {
                    self.end = end;
                }
            }
        }
    }
}

impl MilestoneSession {
    fn update(&mut self, snap: SnapConfig, x: f32, copy_modifier: bool) {
        self.copy_mode = copy_modifier;
        let days = self.geometry.days_for(x - self.anchor.0);
        self.date = snap.snap(
            self.target.date + Duration::days(days),
            SnapEdge::Closest,
            self.geometry.visible_days,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::snap::SnapMode;
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn year_view() -> DragGeometry {
        DragGeometry {
            container_width: 1460.0,
            visible_days: 365,
            row_height: 28.0,
        }
    }

    fn month_view() -> DragGeometry {
        DragGeometry {
            container_width: 600.0,
            visible_days: 30,
            row_height: 28.0,
        }
    }

    fn bar(start: NaiveDate, end: NaiveDate) -> BarTarget {
        BarTarget {
            task_id: "t".into(),
            range_id: None,
            start,
            end,
        }
    }

    fn moved(x: f32) -> DragEvent {
        DragEvent::PointerMove {
            x,
            y: 0.0,
            copy_modifier: false,
        }
    }

    fn release() -> DragEvent {
        DragEvent::PointerUp {
            copy_modifier: false,
        }
    }

    #[test]
    fn idle_controller_swallows_nothing() {
        let mut drag = DragController::default();
        assert_eq!(drag.handle(moved(10.0)), DragResponse::ignored());
        assert_eq!(drag.handle(release()), DragResponse::ignored());
        assert_eq!(drag.handle(DragEvent::Escape), DragResponse::ignored());
    }

    #[test]
    fn only_primary_button_starts_a_drag() {
        let mut drag = DragController::default();
        let target = bar(d(2026, 1, 1), d(2026, 1, 5));
        assert!(!drag.begin_bar(PointerButton::Secondary, target.clone(), DragKind::Move, (0.0, 0.0), month_view()));
        assert!(drag.begin_bar(PointerButton::Primary, target.clone(), DragKind::Move, (0.0, 0.0), month_view()));
        // a second drag cannot start while one is active
        assert!(!drag.begin_bar(PointerButton::Primary, target, DragKind::Move, (0.0, 0.0), month_view()));
    }

    #[test]
    fn move_snaps_start_and_keeps_duration_when_zoomed_out() {
        let mut drag = DragController::default();
        let target = bar(d(2026, 1, 10), d(2026, 2, 8));
        drag.begin_bar(PointerButton::Primary, target.clone(), DragKind::Move, (100.0, 0.0), year_view());
        drag.handle(moved(160.0));
        let response = drag.handle(release());
        assert_eq!(
            response.signal,
            Some(DragSignal::CommitBar {
                target,
                kind: DragKind::Move,
                start: d(2026, 2, 1),
                end: d(2026, 3, 2),
                row_delta: 0,
                copy: false,
            })
        );
        assert!(!drag.is_active());
    }

    #[test]
    fn day_mode_from_settings_skips_month_snapping() {
        let settings = crate::config::Settings {
            snap_mode: SnapMode::Day,
            ..Default::default()
        };
        let mut drag = DragController::default();
        drag.set_snap(settings.snap_config());
        assert_eq!(drag.snap(), settings.snap_config());
        drag.begin_bar(PointerButton::Primary, bar(d(2026, 1, 10), d(2026, 2, 8)), DragKind::Move, (100.0, 0.0), year_view());
        drag.handle(moved(160.0));
        let preview = drag.preview().unwrap();
        assert_eq!((preview.start, preview.end), (d(2026, 1, 25), d(2026, 2, 23)));
    }

    #[test]
    fn move_uses_whole_days_when_zoomed_in() {
        let mut drag = DragController::default();
        drag.begin_bar(PointerButton::Primary, bar(d(2026, 1, 10), d(2026, 1, 12)), DragKind::Move, (0.0, 0.0), month_view());
        drag.handle(moved(-40.0));
        let preview = drag.preview().unwrap();
        assert_eq!((preview.start, preview.end), (d(2026, 1, 8), d(2026, 1, 10)));
        assert_eq!(preview.start_offset_px, -40.0);
    }

    #[test]
    fn resize_start_keeps_last_valid_value() {
        let mut drag = DragController::new(SnapConfig::new(SnapMode::Day, 90));
        drag.begin_bar(PointerButton::Primary, bar(d(2026, 1, 10), d(2026, 1, 15)), DragKind::ResizeStart, (0.0, 0.0), month_view());
        drag.handle(moved(60.0));
        assert_eq!(drag.preview().unwrap().start, d(2026, 1, 13));
        // would put the start on the end date: rejected
        drag.handle(moved(100.0));
        assert_eq!(drag.preview().unwrap().start, d(2026, 1, 13));
        assert_eq!(drag.preview().unwrap().end, d(2026, 1, 15));
    }

    #[test]
    fn resize_end_rejects_crossing_the_start() {
        let mut drag = DragController::new(SnapConfig::new(SnapMode::Day, 90));
        drag.begin_bar(PointerButton::Primary, bar(d(2026, 1, 10), d(2026, 1, 15)), DragKind::ResizeEnd, (0.0, 0.0), month_view());
        drag.handle(moved(40.0));
        assert_eq!(drag.preview().unwrap().end, d(2026, 1, 17));
        drag.handle(moved(-200.0));
        assert_eq!(drag.preview().unwrap().end, d(2026, 1, 17));
    }

    #[test]
    fn copy_mode_follows_modifier_live() {
        let mut drag = DragController::default();
        drag.begin_bar(PointerButton::Primary, bar(d(2026, 1, 10), d(2026, 1, 12)), DragKind::Move, (0.0, 0.0), month_view());
        drag.handle(DragEvent::PointerMove { x: 20.0, y: 0.0, copy_modifier: true });
        assert!(drag.preview().unwrap().copy_mode);
        drag.handle(DragEvent::PointerMove { x: 40.0, y: 0.0, copy_modifier: false });
        assert!(!drag.preview().unwrap().copy_mode);
        let response = drag.handle(DragEvent::PointerUp { copy_modifier: true });
        assert!(matches!(response.signal, Some(DragSignal::CommitBar { copy: true, .. })));
    }

    #[test]
    fn vertical_movement_reports_rows_for_moves_only() {
        let mut drag = DragController::default();
        drag.begin_bar(PointerButton::Primary, bar(d(2026, 1, 10), d(2026, 1, 12)), DragKind::Move, (0.0, 0.0), month_view());
        drag.handle(DragEvent::PointerMove { x: 0.0, y: 60.0, copy_modifier: false });
        let response = drag.handle(release());
        assert!(matches!(response.signal, Some(DragSignal::CommitBar { row_delta: 2, .. })));
    }

    #[test]
    fn escape_cancels_once() {
        let mut drag = DragController::default();
        drag.begin_bar(PointerButton::Primary, bar(d(2026, 1, 10), d(2026, 1, 12)), DragKind::Move, (0.0, 0.0), month_view());
        drag.handle(moved(80.0));
        let response = drag.handle(DragEvent::Escape);
        assert_eq!(response.signal, Some(DragSignal::Cancel));
        assert!(!drag.is_active());
        // the release that follows belongs to no session
        assert_eq!(drag.handle(release()).signal, None);
    }

    #[test]
    fn milestone_snaps_to_closest_month_edge() {
        let mut drag = DragController::default();
        let target = MilestoneTarget {
            task_id: "t".into(),
            milestone_id: "m".into(),
            date: d(2026, 3, 20),
        };
        assert!(drag.begin_milestone(PointerButton::Primary, target.clone(), (0.0, 0.0), year_view()));
        assert!(drag.is_dragging("m"));
        drag.handle(moved(32.0));
        let response = drag.handle(release());
        assert_eq!(
            response.signal,
            Some(DragSignal::CommitMilestone {
                target,
                date: d(2026, 3, 31),
                copy: false,
            })
        );
    }
}
