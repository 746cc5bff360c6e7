use egui::{Color32, Id, Pos2, RichText, Stroke, Ui};
use egui_phosphor::regular as icons;

use crate::ui::theme;
use gantt_planner::model::{EntityId, Forest};

/// Actions that the task table can request.
pub enum TaskTableAction {
    None,
    Select(EntityId),
    Delete(EntityId),
    ToggleExpanded(EntityId),
    Indent(EntityId),
    Outdent(EntityId),
    AddChild(EntityId),
    /// A row was dropped onto another row.
    Move { active: EntityId, over: EntityId },
    Add,
}

fn row_drag_key() -> Id {
    Id::new("task-table-row-drag")
}

fn row_rects_key() -> Id {
    Id::new("task-table-rows")
}

/// Render the left-side task tree.
pub fn show_task_table(forest: &Forest, selected: Option<&str>, ui: &mut Ui) -> TaskTableAction {
    let mut action = TaskTableAction::None;
    let rows = forest.flatten_visible();

    ui.add_space(2.0);
    ui.horizontal(|ui| {
        ui.label(RichText::new("Tasks").strong().size(15.0).color(theme::TEXT_PRIMARY));
        ui.add_space(4.0);
        ui.label(
            RichText::new(format!("({})", forest.task_count()))
                .size(11.0)
                .color(theme::TEXT_DIM),
        );
    });
    ui.add_space(4.0);

    let btn = egui::Button::new(
        RichText::new(format!("{}  Add Task", icons::PLUS))
            .color(Color32::WHITE)
            .size(12.0),
    )
    .fill(theme::ACCENT)
    .rounding(egui::Rounding::same(5.0));
    if ui.add_sized([ui.available_width(), 30.0], btn).clicked() {
        action = TaskTableAction::Add;
    }

    ui.add_space(6.0);
    ui.separator();
    ui.add_space(2.0);

    let dragging: Option<EntityId> = ui.ctx().data(|d| d.get_temp(row_drag_key()));
    let mut row_rects = Vec::with_capacity(rows.len());

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for (i, row) in rows.iter().enumerate() {
                let task = row.task;
                let is_selected = selected == Some(task.id.as_str());
                let row_bg = if is_selected {
                    theme::BG_SELECTED
                } else if i % 2 == 0 {
                    theme::BG_PANEL
                } else {
                    theme::BG_DARK
                };

                let frame = egui::Frame {
                    fill: row_bg,
                    rounding: egui::Rounding::same(4.0),
                    inner_margin: egui::Margin::symmetric(6.0, 4.0),
                    outer_margin: egui::Margin::ZERO,
                    stroke: egui::Stroke::NONE,
                    shadow: egui::epaint::Shadow::NONE,
                };

                let frame_resp = frame.show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.spacing_mut().item_spacing.x = 4.0;
                        ui.add_space(row.level as f32 * theme::INDENT_WIDTH);

                        if task.has_children() {
                            let caret = if task.expanded { icons::CARET_DOWN } else { icons::CARET_RIGHT };
                            let toggle = ui.add(
                                egui::Button::new(RichText::new(caret).size(11.0).color(theme::TEXT_SECONDARY))
                                    .frame(false),
                            );
                            if toggle.clicked() {
                                action = TaskTableAction::ToggleExpanded(task.id.clone());
                            }
                        } else {
                            ui.add_space(14.0);
                        }

                        let (dot_rect, _) = ui.allocate_exact_size(egui::vec2(6.0, 6.0), egui::Sense::hover());
                        ui.painter().circle_filled(dot_rect.center(), 3.0, task.color);

                        let name = if task.milestones.is_empty() {
                            task.name.clone()
                        } else {
                            format!("{} {}", task.name, icons::FLAG)
                        };
                        let name_text = RichText::new(name).size(12.0).color(if is_selected {
                            Color32::WHITE
                        } else {
                            theme::TEXT_PRIMARY
                        });
                        ui.add(egui::Label::new(name_text).truncate());

                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            ui.spacing_mut().item_spacing.x = 2.0;
                            let small = |glyph: &str| {
                                egui::Button::new(RichText::new(glyph).size(11.0).color(theme::TEXT_DIM)).frame(false)
                            };
                            if ui.add(small(icons::X)).on_hover_text("Delete task").clicked() {
                                action = TaskTableAction::Delete(task.id.clone());
                            }
                            if is_selected {
                                if ui.add(small(icons::PLUS)).on_hover_text("Add sub-task").clicked() {
                                    action = TaskTableAction::AddChild(task.id.clone());
                                }
                                if ui.add(small(icons::ARROW_RIGHT)).on_hover_text("Indent").clicked() {
                                    action = TaskTableAction::Indent(task.id.clone());
                                }
                                if ui.add(small(icons::ARROW_LEFT)).on_hover_text("Outdent").clicked() {
                                    action = TaskTableAction::Outdent(task.id.clone());
                                }
                            }
                            ui.label(
                                RichText::new(task.end_date.format("%d/%m").to_string())
                                    .size(10.0)
                                    .color(theme::TEXT_SECONDARY),
                            );
                            ui.label(RichText::new("→").size(9.0).color(theme::TEXT_DIM));
                            ui.label(
                                RichText::new(task.start_date.format("%d/%m").to_string())
                                    .size(10.0)
                                    .color(theme::TEXT_SECONDARY),
                            );
                        });
                    });
                });

                let row_rect = frame_resp.response.rect;
                row_rects.push((task.id.clone(), row_rect));
                let row_response = ui.interact(
                    row_rect,
                    Id::new(("task-row", &task.id)),
                    egui::Sense::click_and_drag(),
                );
                if row_response.clicked() {
                    action = TaskTableAction::Select(task.id.clone());
                }
                if row_response.drag_started() {
                    let id = task.id.clone();
                    ui.ctx().data_mut(|d| d.insert_temp(row_drag_key(), id));
                }
                if row_response.drag_stopped() {
                    ui.ctx().data_mut(|d| d.remove::<EntityId>(row_drag_key()));
                    let pointer = ui.input(|i| i.pointer.interact_pos());
                    if let Some(over) = pointer.and_then(|p| row_under(&previous_row_rects(ui), p)) {
                        if over != task.id {
                            action = TaskTableAction::Move {
                                active: task.id.clone(),
                                over,
                            };
                        }
                    }
                }

                ui.add_space(1.0);
            }

            // drop indicator
            if let (Some(_), Some(pointer)) = (&dragging, ui.input(|i| i.pointer.hover_pos())) {
                if let Some((_, rect)) = row_rects.iter().find(|(_, r)| r.y_range().contains(pointer.y)) {
                    ui.painter().line_segment(
                        [Pos2::new(rect.left(), rect.top()), Pos2::new(rect.right(), rect.top())],
                        Stroke::new(2.0, theme::ACCENT),
                    );
                }
            }
        });

    // store rects for the next frame's drop lookup
    ui.ctx().data_mut(|d| d.insert_temp(row_rects_key(), row_rects));

    action
}

/// Row rects recorded by the previous frame; rows below the dragged one
/// have not been laid out yet in this frame.
fn previous_row_rects(ui: &Ui) -> Vec<(EntityId, egui::Rect)> {
    ui.ctx()
        .data(|d| d.get_temp::<Vec<(EntityId, egui::Rect)>>(row_rects_key()))
        .unwrap_or_default()
}

fn row_under(rows: &[(EntityId, egui::Rect)], pointer: Pos2) -> Option<EntityId> {
    rows.iter()
        .find(|(_, r)| r.y_range().contains(pointer.y))
        .map(|(id, _)| id.clone())
}
