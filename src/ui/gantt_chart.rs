use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use egui::{Color32, Painter, Pos2, Rect, Rounding, Sense, Shape, Stroke, Ui, Vec2};

use crate::ui::theme;
use gantt_planner::drag::{
    BarTarget, DragController, DragEvent, DragGeometry, DragKind, DragSignal, DragState,
    MilestoneTarget, PointerButton,
};
use gantt_planner::model::task::{DividerStyle, LabelPosition, MilestoneShape};
use gantt_planner::model::{EntityId, Forest, Milestone, Task, TimelineScale, TimelineViewport};
use gantt_planner::ops::deps;

const ROW_HEIGHT: f32 = theme::ROW_HEIGHT;
const ROW_PADDING: f32 = theme::ROW_GAP;
const ROW_PITCH: f32 = ROW_HEIGHT + ROW_PADDING;
const HEADER_HEIGHT: f32 = theme::HEADER_HEIGHT;
const HANDLE_WIDTH: f32 = theme::HANDLE_WIDTH;

/// Display switches for the chart.
#[derive(Debug, Clone, Copy)]
pub struct ChartOptions {
    pub show_dependencies: bool,
    pub show_today: bool,
    pub today: NaiveDate,
}

/// Result details from interactions in the Gantt chart.
#[derive(Debug, Clone, Default)]
pub struct ChartInteraction {
    /// `Some(None)` clears the selection.
    pub select: Option<Option<EntityId>>,
    pub signal: Option<DragSignal>,
}

/// Render the Gantt chart area (right panel).
pub fn show_gantt_chart(
    forest: &Forest,
    viewport: &mut TimelineViewport,
    drag: &mut DragController,
    selected: Option<&str>,
    options: ChartOptions,
    ui: &mut Ui,
) -> ChartInteraction {
    let mut interaction = ChartInteraction::default();
    let rows = forest.flatten_visible();
    let available = ui.available_size();
    let chart_width = viewport.total_width().max(available.x);
    let chart_height = HEADER_HEIGHT + rows.len() as f32 * ROW_PITCH + 40.0;
    let geometry = DragGeometry::from_viewport(viewport, available.x, ROW_PITCH);

    // Ctrl+scroll zooms
    let scroll_delta = ui.input(|i| i.smooth_scroll_delta);
    if ui.rect_contains_pointer(ui.max_rect()) && ui.input(|i| i.modifiers.ctrl) {
        if scroll_delta.y > 0.0 {
            viewport.zoom_in();
        } else if scroll_delta.y < 0.0 {
            viewport.zoom_out();
        }
    }

    egui::ScrollArea::both()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            let (response, painter) = ui.allocate_painter(
                Vec2::new(chart_width, chart_height.max(available.y)),
                Sense::click(),
            );
            let origin = response.rect.min;
            let mut consumed_click = false;

            painter.rect_filled(response.rect, 0.0, theme::BG_DARK);
            draw_timeline_header(&painter, origin, viewport, chart_width);

            let mut anchors: HashMap<&str, Anchor> = HashMap::new();

            for (i, row) in rows.iter().enumerate() {
                let task = row.task;
                let row_top = origin.y + HEADER_HEIGHT + i as f32 * ROW_PITCH;
                let row_rect = Rect::from_min_size(
                    Pos2::new(origin.x, row_top),
                    Vec2::new(chart_width, ROW_PITCH),
                );
                let fill = if selected == Some(task.id.as_str()) {
                    theme::BG_SELECTED
                } else if i % 2 == 0 {
                    theme::BG_PANEL
                } else {
                    theme::BG_DARK
                };
                painter.rect_filled(row_rect, 0.0, fill);
                draw_row_border(&painter, task, row_rect);

                let y = row_top + ROW_PADDING;
                for (range_id, start, end) in task.spans() {
                    let target = BarTarget {
                        task_id: task.id.clone(),
                        range_id: range_id.map(str::to_string),
                        start,
                        end,
                    };
                    let ghost = bar_preview(drag, &target);
                    let (shown_start, shown_end, row_shift) = match ghost {
                        Some((s, e, shift, _)) => (s, e, shift),
                        None => (start, end, 0),
                    };
                    if let Some((_, _, _, true)) = ghost {
                        draw_copy_ghost(&painter, origin, viewport, start, end, y);
                    }
                    let color = range_id
                        .and_then(|id| task.time_ranges.iter().find(|r| r.id == id))
                        .and_then(|r| r.color)
                        .unwrap_or(task.color);
                    let bar_rect = draw_task_bar(
                        &painter,
                        origin,
                        viewport,
                        task,
                        color,
                        (shown_start, shown_end),
                        y + row_shift as f32 * ROW_PITCH,
                        selected == Some(task.id.as_str()),
                    );
                    anchors.insert(
                        range_id.unwrap_or(task.id.as_str()),
                        Anchor::new(bar_rect.left(), bar_rect.right(), bar_rect.center().y),
                    );
                    if range_id.is_some() {
                        anchors.entry(task.id.as_str()).or_insert(Anchor::new(
                            origin.x + viewport.date_to_x(task.start_date),
                            origin.x + viewport.day_end_to_x(task.end_date),
                            bar_rect.center().y,
                        ));
                    }

                    let salt = range_id.unwrap_or(task.id.as_str()).to_string();
                    let bar_response = ui.interact(
                        bar_rect,
                        ui.make_persistent_id(("task-bar", &salt)),
                        Sense::click_and_drag(),
                    );
                    let left_response = ui.interact(
                        handle_rect(bar_rect, bar_rect.left()).expand(4.0),
                        ui.make_persistent_id(("task-resize-left", &salt)),
                        Sense::drag(),
                    );
                    let right_response = ui.interact(
                        handle_rect(bar_rect, bar_rect.right()).expand(4.0),
                        ui.make_persistent_id(("task-resize-right", &salt)),
                        Sense::drag(),
                    );

                    if bar_response.clicked() {
                        interaction.select = Some(Some(task.id.clone()));
                        consumed_click = true;
                    }

                    let started = [
                        (&left_response, DragKind::ResizeStart),
                        (&right_response, DragKind::ResizeEnd),
                        (&bar_response, DragKind::Move),
                    ]
                    .into_iter()
                    .find(|(r, _)| r.drag_started());
                    if let Some((resp, kind)) = started {
                        if let Some(pos) = resp.interact_pointer_pos() {
                            if drag.begin_bar(button_of(resp), target.clone(), kind, (pos.x, pos.y), geometry) {
                                interaction.select = Some(Some(task.id.clone()));
                                consumed_click = true;
                            }
                        }
                    }

                    if left_response.hovered() || right_response.hovered() {
                        ui.ctx().set_cursor_icon(egui::CursorIcon::ResizeHorizontal);
                    } else if bar_response.hovered() {
                        ui.ctx().set_cursor_icon(egui::CursorIcon::Grab);
                    }
                    if selected == Some(task.id.as_str()) || left_response.hovered() || right_response.hovered() {
                        draw_handles(&painter, bar_rect);
                    }
                    if bar_response.hovered() && !drag.is_active() {
                        egui::show_tooltip_at_pointer(
                            ui.ctx(),
                            ui.layer_id(),
                            egui::Id::new(("task-tip", &salt)),
                            |ui| {
                                ui.strong(&task.name);
                                ui.label(format!(
                                    "{} → {}",
                                    start.format("%d/%m/%Y"),
                                    end.format("%d/%m/%Y"),
                                ));
                                if !task.description.is_empty() {
                                    ui.label(&task.description);
                                }
                            },
                        );
                    }
                }

                for milestone in &task.milestones {
                    let date = milestone_preview(drag, &milestone.id).unwrap_or(milestone.date);
                    let rect = draw_milestone(
                        &painter,
                        origin,
                        viewport,
                        milestone,
                        date,
                        y,
                        selected == Some(milestone.id.as_str()),
                    );
                    anchors.insert(
                        milestone.id.as_str(),
                        Anchor::new(rect.center().x, rect.center().x, rect.center().y),
                    );
                    let response = ui.interact(
                        rect.expand(4.0),
                        ui.make_persistent_id(("milestone", &milestone.id)),
                        Sense::click_and_drag(),
                    );
                    if response.clicked() {
                        interaction.select = Some(Some(task.id.clone()));
                        consumed_click = true;
                    }
                    if response.drag_started() {
                        if let Some(pos) = response.interact_pointer_pos() {
                            let target = MilestoneTarget {
                                task_id: task.id.clone(),
                                milestone_id: milestone.id.clone(),
                                date: milestone.date,
                            };
                            drag.begin_milestone(button_of(&response), target, (pos.x, pos.y), geometry);
                            consumed_click = true;
                        }
                    }
                    if response.hovered() && !drag.is_active() {
                        egui::show_tooltip_at_pointer(
                            ui.ctx(),
                            ui.layer_id(),
                            egui::Id::new(("milestone-tip", &milestone.id)),
                            |ui| {
                                ui.strong(&milestone.label);
                                ui.label(milestone.date.format("%d/%m/%Y").to_string());
                            },
                        );
                    }
                }
            }

            if options.show_dependencies {
                for (holder, predecessor) in deps::edges(forest) {
                    if let (Some(to), Some(from)) =
                        (anchors.get(holder.as_str()), anchors.get(predecessor.as_str()))
                    {
                        draw_dependency(&painter, *from, *to);
                    }
                }
            }

            if options.show_today {
                draw_today_line(&painter, origin, viewport, options.today, chart_height.max(available.y));
            }

            if response.clicked() && !consumed_click {
                interaction.select = Some(None);
            }
        });

    if let Some(signal) = feed_pointer(drag, ui) {
        interaction.signal = Some(signal);
    }
    if drag.is_active() {
        ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
    }

    interaction
}

/// Turn this frame's raw pointer and keyboard input into drag events.
fn feed_pointer(drag: &mut DragController, ui: &Ui) -> Option<DragSignal> {
    if !drag.is_active() {
        return None;
    }
    let (escape, released, pos, copy) = ui.input(|i| {
        (
            i.key_pressed(egui::Key::Escape),
            i.pointer.primary_released(),
            i.pointer.latest_pos(),
            i.modifiers.ctrl || i.modifiers.alt,
        )
    });
    if escape {
        return drag.handle(DragEvent::Escape).signal;
    }
    if let Some(pos) = pos {
        drag.handle(DragEvent::PointerMove {
            x: pos.x,
            y: pos.y,
            copy_modifier: copy,
        });
    }
    if released {
        return drag.handle(DragEvent::PointerUp { copy_modifier: copy }).signal;
    }
    None
}

fn button_of(response: &egui::Response) -> PointerButton {
    if response.dragged_by(egui::PointerButton::Primary) {
        PointerButton::Primary
    } else if response.dragged_by(egui::PointerButton::Secondary) {
        PointerButton::Secondary
    } else {
        PointerButton::Middle
    }
}

/// Preview dates, row shift and copy flag if `target` is the bar being dragged.
fn bar_preview(drag: &DragController, target: &BarTarget) -> Option<(NaiveDate, NaiveDate, i32, bool)> {
    match drag.state() {
        DragState::Bar(s) if s.target.task_id == target.task_id && s.target.range_id == target.range_id => {
            Some((s.start, s.end, s.row_delta, s.copy_mode))
        }
        _ => None,
    }
}

fn milestone_preview(drag: &DragController, milestone_id: &str) -> Option<NaiveDate> {
    match drag.state() {
        DragState::Milestone(s) if s.target.milestone_id == milestone_id => Some(s.date),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    left: f32,
    right: f32,
    mid_y: f32,
}

impl Anchor {
    fn new(left: f32, right: f32, mid_y: f32) -> Self {
        Self { left, right, mid_y }
    }
}

fn handle_rect(bar_rect: Rect, x: f32) -> Rect {
    Rect::from_min_max(
        Pos2::new(x - HANDLE_WIDTH * 0.5, bar_rect.top()),
        Pos2::new(x + HANDLE_WIDTH * 0.5, bar_rect.bottom()),
    )
}

fn draw_handles(painter: &Painter, bar_rect: Rect) {
    let handle_h = bar_rect.height() * 0.55;
    let handle_y = bar_rect.center().y - handle_h / 2.0;
    for x in [bar_rect.left() - 1.5, bar_rect.right() - 2.5] {
        painter.rect_filled(
            Rect::from_min_size(Pos2::new(x, handle_y), Vec2::new(4.0, handle_h)),
            Rounding::same(2.0),
            theme::HANDLE_COLOR,
        );
    }
}

fn draw_row_border(painter: &Painter, task: &Task, row_rect: Rect) {
    let y = row_rect.bottom();
    let points = [Pos2::new(row_rect.left(), y), Pos2::new(row_rect.right(), y)];
    if !task.divider.enabled {
        painter.line_segment(points, Stroke::new(0.5, theme::BORDER_SUBTLE));
        return;
    }
    let stroke = Stroke::new(task.divider.thickness.max(0.5), task.divider.color);
    match task.divider.style {
        DividerStyle::Solid => {
            painter.line_segment(points, stroke);
        }
        DividerStyle::Dashed => {
            painter.extend(Shape::dashed_line(&points, stroke, 6.0, 4.0));
        }
        DividerStyle::Dotted => {
            painter.extend(Shape::dashed_line(&points, stroke, 1.5, 3.0));
        }
    }
}

fn draw_timeline_header(painter: &Painter, origin: Pos2, viewport: &TimelineViewport, width: f32) {
    painter.rect_filled(
        Rect::from_min_size(origin, Vec2::new(width, HEADER_HEIGHT)),
        0.0,
        theme::BG_HEADER,
    );
    painter.line_segment(
        [
            Pos2::new(origin.x, origin.y + HEADER_HEIGHT),
            Pos2::new(origin.x + width, origin.y + HEADER_HEIGHT),
        ],
        Stroke::new(1.0, theme::BORDER_SUBTLE),
    );

    let grid = |x: f32| {
        painter.line_segment(
            [
                Pos2::new(x, origin.y + HEADER_HEIGHT),
                Pos2::new(x, origin.y + 2000.0),
            ],
            Stroke::new(0.5, theme::GRID_LINE),
        );
    };
    let month_label = |x: f32, y: f32, date: NaiveDate| {
        painter.text(
            Pos2::new(x + 3.0, origin.y + y),
            egui::Align2::LEFT_CENTER,
            date.format("%b %Y").to_string(),
            theme::font_header(),
            theme::TEXT_PRIMARY,
        );
    };

    let mut date = viewport.start;
    match viewport.scale {
        TimelineScale::Days => {
            while date <= viewport.end {
                let x = origin.x + viewport.date_to_x(date);
                grid(x);
                if viewport.pixels_per_day >= 20.0 {
                    let weekend = date.weekday().num_days_from_monday() >= 5;
                    painter.text(
                        Pos2::new(x + 3.0, origin.y + 28.0),
                        egui::Align2::LEFT_CENTER,
                        date.format("%d").to_string(),
                        theme::font_sub(),
                        if weekend { theme::TEXT_DIM } else { theme::TEXT_SECONDARY },
                    );
                }
                if date.day() == 1 {
                    month_label(x, 12.0, date);
                }
                date += Duration::days(1);
            }
        }
        TimelineScale::Weeks => {
            date -= Duration::days(date.weekday().num_days_from_monday() as i64);
            while date <= viewport.end {
                let x = origin.x + viewport.date_to_x(date);
                grid(x);
                painter.text(
                    Pos2::new(x + 3.0, origin.y + 28.0),
                    egui::Align2::LEFT_CENTER,
                    date.format("W%V").to_string(),
                    theme::font_sub(),
                    theme::TEXT_SECONDARY,
                );
                if date.day() <= 7 {
                    month_label(x, 12.0, date);
                }
                date += Duration::days(7);
            }
        }
        TimelineScale::Months => {
            date = gantt_planner::model::snap::month_start(date);
            while date <= viewport.end {
                let x = origin.x + viewport.date_to_x(date);
                grid(x);
                month_label(x + 2.0, 18.0, date);
                date = gantt_planner::model::snap::next_month_start(date);
            }
        }
    }
}

fn draw_today_line(painter: &Painter, origin: Pos2, viewport: &TimelineViewport, today: NaiveDate, height: f32) {
    if today < viewport.start || today > viewport.end {
        return;
    }
    let x = origin.x + viewport.date_to_x(today);
    painter.line_segment(
        [Pos2::new(x, origin.y + HEADER_HEIGHT), Pos2::new(x, origin.y + height)],
        Stroke::new(1.5, theme::TODAY_LINE),
    );
    let badge_w = 42.0;
    let badge_rect = Rect::from_min_size(
        Pos2::new(x - badge_w / 2.0, origin.y + HEADER_HEIGHT - 1.0),
        Vec2::new(badge_w, 14.0),
    );
    painter.rect_filled(badge_rect, Rounding::same(3.0), theme::TODAY_LINE);
    painter.text(
        badge_rect.center(),
        egui::Align2::CENTER_CENTER,
        "Today",
        theme::font_small(),
        Color32::WHITE,
    );
}

fn span_rect(origin: Pos2, viewport: &TimelineViewport, start: NaiveDate, end: NaiveDate, y: f32) -> Rect {
    let x_start = origin.x + viewport.date_to_x(start);
    let x_end = origin.x + viewport.day_end_to_x(end);
    let inset = theme::BAR_INSET;
    Rect::from_min_size(
        Pos2::new(x_start, y + inset),
        Vec2::new((x_end - x_start).max(6.0), ROW_HEIGHT - inset * 2.0),
    )
}

fn draw_copy_ghost(painter: &Painter, origin: Pos2, viewport: &TimelineViewport, start: NaiveDate, end: NaiveDate, y: f32) {
    let rect = span_rect(origin, viewport, start, end, y);
    painter.rect_filled(rect, Rounding::same(theme::BAR_ROUNDING), theme::COPY_GHOST);
}

fn draw_task_bar(
    painter: &Painter,
    origin: Pos2,
    viewport: &TimelineViewport,
    task: &Task,
    color: Color32,
    (start, end): (NaiveDate, NaiveDate),
    y: f32,
    is_selected: bool,
) -> Rect {
    let bar_rect = span_rect(origin, viewport, start, end, y);
    let rounding = Rounding::same(theme::BAR_ROUNDING);

    painter.rect_filled(bar_rect.translate(Vec2::new(1.0, 2.0)), rounding, Color32::from_black_alpha(35));
    painter.rect_filled(bar_rect, rounding, color);
    let highlight_rect = Rect::from_min_size(
        bar_rect.min,
        Vec2::new(bar_rect.width(), (bar_rect.height() * 0.45).max(4.0)),
    );
    painter.rect_filled(
        highlight_rect,
        Rounding {
            nw: theme::BAR_ROUNDING,
            ne: theme::BAR_ROUNDING,
            sw: 0.0,
            se: 0.0,
        },
        Color32::from_white_alpha(25),
    );
    // parents get a darker underline
    if task.has_children() {
        painter.line_segment(
            [
                Pos2::new(bar_rect.left(), bar_rect.bottom() - 1.0),
                Pos2::new(bar_rect.right(), bar_rect.bottom() - 1.0),
            ],
            Stroke::new(2.0, Color32::from_black_alpha(90)),
        );
    }

    if is_selected {
        painter.rect_stroke(
            bar_rect.expand(1.5),
            Rounding::same(theme::BAR_ROUNDING + 1.5),
            Stroke::new(2.0, theme::BORDER_ACCENT),
        );
    }

    if bar_rect.width() > 30.0 {
        let galley = painter.layout_no_wrap(task.name.clone(), theme::font_bar(), theme::TEXT_ON_BAR);
        let text_y = bar_rect.top() + (bar_rect.height() - galley.size().y) / 2.0;
        painter
            .with_clip_rect(bar_rect)
            .galley(Pos2::new(bar_rect.left() + 6.0, text_y), galley, Color32::TRANSPARENT);
    }

    bar_rect
}

fn star_points(center: Pos2, outer: f32) -> Vec<Pos2> {
    (0..10)
        .map(|i| {
            let radius = if i % 2 == 0 { outer } else { outer * 0.45 };
            let angle = -std::f32::consts::FRAC_PI_2 + i as f32 * std::f32::consts::PI / 5.0;
            center + Vec2::angled(angle) * radius
        })
        .collect()
}

fn draw_milestone(
    painter: &Painter,
    origin: Pos2,
    viewport: &TimelineViewport,
    milestone: &Milestone,
    date: NaiveDate,
    y: f32,
    is_selected: bool,
) -> Rect {
    let x = origin.x + (viewport.date_to_x(date) + viewport.day_end_to_x(date)) / 2.0;
    let center = Pos2::new(x, y + ROW_HEIGHT / 2.0);
    let size = (ROW_HEIGHT / 2.0 - 4.0).max(5.0);
    let outline = if is_selected {
        Stroke::new(2.0, theme::BORDER_ACCENT)
    } else {
        Stroke::new(1.0, Color32::from_black_alpha(90))
    };
    let color = milestone.color;

    match milestone.shape {
        MilestoneShape::Diamond => {
            let points = vec![
                center + Vec2::new(0.0, -size),
                center + Vec2::new(size, 0.0),
                center + Vec2::new(0.0, size),
                center + Vec2::new(-size, 0.0),
            ];
            painter.add(Shape::convex_polygon(points, color, outline));
        }
        MilestoneShape::Circle => {
            painter.circle(center, size * 0.85, color, outline);
        }
        MilestoneShape::Square => {
            painter.rect(
                Rect::from_center_size(center, Vec2::splat(size * 1.5)),
                Rounding::same(2.0),
                color,
                outline,
            );
        }
        MilestoneShape::Triangle => {
            let points = vec![
                center + Vec2::new(0.0, -size),
                center + Vec2::new(size, size * 0.8),
                center + Vec2::new(-size, size * 0.8),
            ];
            painter.add(Shape::convex_polygon(points, color, outline));
        }
        MilestoneShape::Star => {
            // non-convex: fill the core, outline the points
            painter.circle_filled(center, size * 0.5, color);
            painter.add(Shape::closed_line(star_points(center, size), Stroke::new(2.0, color)));
            if is_selected {
                painter.add(Shape::closed_line(star_points(center, size + 2.0), outline));
            }
        }
        MilestoneShape::Flag => {
            let pole_top = center + Vec2::new(-size * 0.6, -size);
            let pole_bottom = center + Vec2::new(-size * 0.6, size);
            painter.line_segment([pole_top, pole_bottom], Stroke::new(2.0, color));
            let points = vec![
                pole_top,
                pole_top + Vec2::new(size * 1.5, size * 0.45),
                pole_top + Vec2::new(0.0, size * 0.9),
            ];
            painter.add(Shape::convex_polygon(points, color, outline));
        }
    }

    if !milestone.label.is_empty() {
        let (pos, align) = match milestone.label_position {
            LabelPosition::Top => (center + Vec2::new(0.0, -size - 2.0), egui::Align2::CENTER_BOTTOM),
            LabelPosition::Bottom => (center + Vec2::new(0.0, size + 2.0), egui::Align2::CENTER_TOP),
            LabelPosition::Left => (center + Vec2::new(-size - 6.0, 0.0), egui::Align2::RIGHT_CENTER),
            LabelPosition::Right | LabelPosition::Auto => {
                (center + Vec2::new(size + 6.0, 0.0), egui::Align2::LEFT_CENTER)
            }
        };
        painter.text(pos, align, &milestone.label, theme::font_small(), theme::TEXT_SECONDARY);
    }

    Rect::from_center_size(center, Vec2::splat(size * 2.0 + 2.0))
}

/// Elbow connector from the predecessor's end to the holder's start.
fn draw_dependency(painter: &Painter, from: Anchor, to: Anchor) {
    let stroke = Stroke::new(1.2, theme::DEPENDENCY_LINE);
    let start = Pos2::new(from.right, from.mid_y);
    let end = Pos2::new(to.left, to.mid_y);
    let bend_x = start.x + 8.0;
    let points = if end.x - 8.0 >= start.x + 4.0 {
        vec![start, Pos2::new(end.x - 8.0, start.y), Pos2::new(end.x - 8.0, end.y), end]
    } else {
        let mid_y = (start.y + end.y) / 2.0;
        vec![
            start,
            Pos2::new(bend_x, start.y),
            Pos2::new(bend_x, mid_y),
            Pos2::new(end.x - 8.0, mid_y),
            Pos2::new(end.x - 8.0, end.y),
            end,
        ]
    };
    painter.add(Shape::line(points, stroke));
    let head = vec![
        end,
        end + Vec2::new(-6.0, -3.5),
        end + Vec2::new(-6.0, 3.5),
    ];
    painter.add(Shape::convex_polygon(head, theme::DEPENDENCY_LINE, Stroke::NONE));
}
