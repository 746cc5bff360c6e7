use chrono::NaiveDate;
use egui::{Color32, Id, RichText, Ui};
use egui_phosphor::regular as icons;

use crate::ui::theme;
use gantt_planner::model::task::{DividerStyle, LabelPosition, MilestoneShape};
use gantt_planner::model::{EntityId, EntityKind, Forest, Task};
use gantt_planner::ops::deps;
use gantt_planner::ops::{MilestonePatch, RangePatch, TaskPatch};

/// Actions the editor can request.
pub enum EditorAction {
    None,
    Update(TaskPatch),
    AddRange,
    UpdateRange(EntityId, RangePatch),
    DeleteRange(EntityId),
    AddMilestone,
    UpdateMilestone(EntityId, MilestonePatch),
    DeleteMilestone(EntityId),
    AddDependency { holder: EntityId, predecessor: EntityId },
    RemoveDependency { holder: EntityId, predecessor: EntityId },
    Duplicate,
}

/// Persistent state for the "add dependency" picker.
#[derive(Clone, Default)]
struct DepPickerState {
    holder: Option<EntityId>,
    predecessor: Option<EntityId>,
}

const SHAPES: [(MilestoneShape, &str); 6] = [
    (MilestoneShape::Diamond, "Diamond"),
    (MilestoneShape::Circle, "Circle"),
    (MilestoneShape::Square, "Square"),
    (MilestoneShape::Triangle, "Triangle"),
    (MilestoneShape::Star, "Star"),
    (MilestoneShape::Flag, "Flag"),
];

const LABEL_POSITIONS: [(LabelPosition, &str); 5] = [
    (LabelPosition::Auto, "Auto"),
    (LabelPosition::Top, "Top"),
    (LabelPosition::Bottom, "Bottom"),
    (LabelPosition::Left, "Left"),
    (LabelPosition::Right, "Right"),
];

fn section(ui: &mut Ui, title: &str) {
    ui.add_space(2.0);
    ui.label(RichText::new(title).size(10.0).color(theme::TEXT_DIM).strong());
}

/// Text field whose value is committed when it loses focus. Returns the new
/// text if it differs from `current`.
fn buffered_text(ui: &mut Ui, key: Id, current: &str, multiline: bool) -> Option<String> {
    let mut buffer = ui
        .data(|d| d.get_temp::<String>(key))
        .unwrap_or_else(|| current.to_string());
    let edit = if multiline {
        egui::TextEdit::multiline(&mut buffer).desired_rows(3)
    } else {
        egui::TextEdit::singleline(&mut buffer)
    };
    let response = ui.add_sized([ui.available_width(), 24.0], edit.text_color(theme::TEXT_PRIMARY));
    if response.has_focus() {
        ui.data_mut(|d| d.insert_temp(key, buffer.clone()));
    }
    if response.lost_focus() {
        ui.data_mut(|d| d.remove::<String>(key));
        if buffer != current {
            return Some(buffer);
        }
    }
    None
}

fn date_picker(ui: &mut Ui, salt: &str, date: NaiveDate) -> Option<NaiveDate> {
    let mut value = date;
    let response = ui.add(egui_extras::DatePickerButton::new(&mut value).id_salt(salt));
    (response.changed() && value != date).then_some(value)
}

fn delete_button(ui: &mut Ui, hover: &str) -> bool {
    ui.add(egui::Button::new(RichText::new(icons::TRASH).size(11.0).color(theme::TEXT_DIM)).frame(false))
        .on_hover_text(hover)
        .clicked()
}

/// Render an inline editor for the selected task, including its time ranges,
/// milestones and dependency links.
pub fn show_task_editor(task: &Task, forest: &Forest, ui: &mut Ui) -> EditorAction {
    let mut action = EditorAction::None;

    ui.add_space(6.0);
    ui.horizontal(|ui| {
        ui.label(RichText::new("Edit Task").strong().size(13.0).color(theme::TEXT_PRIMARY));
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui
                .add(egui::Button::new(RichText::new(icons::COPY).size(12.0)).frame(false))
                .on_hover_text("Duplicate task")
                .clicked()
            {
                action = EditorAction::Duplicate;
            }
        });
    });
    ui.add_space(4.0);

    let frame = egui::Frame {
        fill: theme::BG_DARK,
        rounding: egui::Rounding::same(4.0),
        inner_margin: egui::Margin::same(8.0),
        outer_margin: egui::Margin::ZERO,
        stroke: egui::Stroke::new(1.0, theme::BORDER_SUBTLE),
        shadow: egui::epaint::Shadow::NONE,
    };

    frame.show(ui, |ui| {
        ui.spacing_mut().item_spacing.y = 6.0;
        ui.visuals_mut().extreme_bg_color = theme::BG_FIELD;

        section(ui, "Name");
        if let Some(name) = buffered_text(ui, Id::new(("edit-name", &task.id)), &task.name, false) {
            action = EditorAction::Update(TaskPatch::name(name));
        }

        // Dates and color
        if task.uses_ranges() {
            section(ui, "Dates");
            ui.label(
                RichText::new(format!(
                    "{} {} {}  (from time ranges)",
                    task.start_date.format("%Y-%m-%d"),
                    icons::ARROW_RIGHT,
                    task.end_date.format("%Y-%m-%d"),
                ))
                .size(11.0)
                .color(theme::TEXT_SECONDARY),
            );
        } else {
            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    section(ui, "Start");
                    if let Some(start) = date_picker(ui, &format!("start-{}", task.id), task.start_date) {
                        let end = task.end_date.max(start);
                        action = EditorAction::Update(TaskPatch::dates(start, end));
                    }
                });
                ui.vertical(|ui| {
                    section(ui, "End");
                    if let Some(end) = date_picker(ui, &format!("end-{}", task.id), task.end_date) {
                        let start = task.start_date.min(end);
                        action = EditorAction::Update(TaskPatch::dates(start, end));
                    }
                });
            });
        }

        ui.horizontal(|ui| {
            section(ui, "Color");
            let mut color = task.color;
            if ui.color_edit_button_srgba(&mut color).changed() {
                action = EditorAction::Update(TaskPatch {
                    color: Some(color),
                    ..Default::default()
                });
            }
            ui.add_space(12.0);
            let mut divider = task.divider.clone();
            if ui.checkbox(&mut divider.enabled, "Divider below").changed() {
                action = EditorAction::Update(TaskPatch {
                    divider: Some(divider.clone()),
                    ..Default::default()
                });
            }
            if divider.enabled {
                let before = divider.style;
                egui::ComboBox::from_id_salt(("divider-style", &task.id))
                    .selected_text(format!("{:?}", divider.style))
                    .width(70.0)
                    .show_ui(ui, |ui| {
                        for style in [DividerStyle::Solid, DividerStyle::Dashed, DividerStyle::Dotted] {
                            ui.selectable_value(&mut divider.style, style, format!("{style:?}"));
                        }
                    });
                if divider.style != before {
                    action = EditorAction::Update(TaskPatch {
                        divider: Some(divider),
                        ..Default::default()
                    });
                }
            }
        });

        section(ui, "Description");
        if let Some(text) = buffered_text(ui, Id::new(("edit-desc", &task.id)), &task.description, true) {
            action = EditorAction::Update(TaskPatch {
                description: Some(text),
                ..Default::default()
            });
        }

        // Time ranges
        ui.separator();
        ui.horizontal(|ui| {
            section(ui, "Time ranges");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button(format!("{} Add", icons::PLUS)).clicked() {
                    action = EditorAction::AddRange;
                }
            });
        });
        for (i, range) in task.time_ranges.iter().enumerate() {
            ui.horizontal(|ui| {
                ui.label(RichText::new(format!("{}.", i + 1)).size(10.0).color(theme::TEXT_DIM));
                if let Some(start) = date_picker(ui, &format!("range-start-{}", range.id), range.start_date) {
                    action = EditorAction::UpdateRange(range.id.clone(), RangePatch::dates(start, range.end_date.max(start)));
                }
                if let Some(end) = date_picker(ui, &format!("range-end-{}", range.id), range.end_date) {
                    action = EditorAction::UpdateRange(range.id.clone(), RangePatch::dates(range.start_date.min(end), end));
                }
                if delete_button(ui, "Delete time range") {
                    action = EditorAction::DeleteRange(range.id.clone());
                }
            });
            let label = range.label.clone().unwrap_or_default();
            if let Some(text) = buffered_text(ui, Id::new(("range-label", &range.id)), &label, false) {
                action = EditorAction::UpdateRange(
                    range.id.clone(),
                    RangePatch {
                        label: Some(text),
                        ..Default::default()
                    },
                );
            }
        }

        // Milestones
        ui.separator();
        ui.horizontal(|ui| {
            section(ui, "Milestones");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button(format!("{} Add", icons::PLUS)).clicked() {
                    action = EditorAction::AddMilestone;
                }
            });
        });
        for milestone in &task.milestones {
            if let Some(text) = buffered_text(ui, Id::new(("ms-label", &milestone.id)), &milestone.label, false) {
                action = EditorAction::UpdateMilestone(
                    milestone.id.clone(),
                    MilestonePatch {
                        label: Some(text),
                        ..Default::default()
                    },
                );
            }
            ui.horizontal(|ui| {
                if let Some(date) = date_picker(ui, &format!("ms-date-{}", milestone.id), milestone.date) {
                    action = EditorAction::UpdateMilestone(milestone.id.clone(), MilestonePatch::date(date));
                }
                let mut shape = milestone.shape;
                egui::ComboBox::from_id_salt(("ms-shape", &milestone.id))
                    .selected_text(SHAPES.iter().find(|(s, _)| *s == shape).map_or("", |(_, n)| *n))
                    .width(70.0)
                    .show_ui(ui, |ui| {
                        for (value, name) in SHAPES {
                            ui.selectable_value(&mut shape, value, name);
                        }
                    });
                let mut position = milestone.label_position;
                egui::ComboBox::from_id_salt(("ms-label-pos", &milestone.id))
                    .selected_text(LABEL_POSITIONS.iter().find(|(p, _)| *p == position).map_or("", |(_, n)| *n))
                    .width(60.0)
                    .show_ui(ui, |ui| {
                        for (value, name) in LABEL_POSITIONS {
                            ui.selectable_value(&mut position, value, name);
                        }
                    });
                let mut color = milestone.color;
                let color_changed = ui.color_edit_button_srgba(&mut color).changed();
                if shape != milestone.shape || position != milestone.label_position || color_changed {
                    action = EditorAction::UpdateMilestone(
                        milestone.id.clone(),
                        MilestonePatch {
                            shape: Some(shape),
                            label_position: Some(position),
                            color: Some(color),
                            ..Default::default()
                        },
                    );
                }
                if delete_button(ui, "Delete milestone") {
                    action = EditorAction::DeleteMilestone(milestone.id.clone());
                }
            });
        }

        ui.separator();
        if let Some(dep_action) = show_dependencies(task, forest, ui) {
            action = dep_action;
        }
    });

    action
}

fn kind_icon(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Task => icons::LIST_BULLETS,
        EntityKind::TimeRange => icons::ARROWS_HORIZONTAL,
        EntityKind::Milestone => icons::DIAMOND,
    }
}

fn show_dependencies(task: &Task, forest: &Forest, ui: &mut Ui) -> Option<EditorAction> {
    let mut action = None;
    let owned = task.owned_ids();
    // entities this task itself owns, excluding its sub-tasks
    let mut holders: Vec<(EntityId, String)> = vec![(task.id.clone(), task.name.clone())];
    let index = forest.index();
    for id in task
        .time_ranges
        .iter()
        .map(|r| &r.id)
        .chain(task.milestones.iter().map(|m| &m.id))
    {
        if let Some(entity) = index.get(id) {
            holders.push((id.clone(), entity.display_name()));
        }
    }

    section(ui, "Depends on");
    let mut any = false;
    for (holder, holder_name) in &holders {
        for pred in deps::predecessors(forest, holder) {
            any = true;
            ui.horizontal(|ui| {
                ui.label(RichText::new(kind_icon(pred.kind)).size(11.0).color(theme::TEXT_DIM));
                let text = if holder == &task.id {
                    pred.name.clone()
                } else {
                    format!("{} {} {}", holder_name, icons::ARROW_LEFT, pred.name)
                };
                ui.label(RichText::new(text).size(11.0).color(theme::TEXT_SECONDARY));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if delete_button(ui, "Remove dependency") {
                        action = Some(EditorAction::RemoveDependency {
                            holder: holder.clone(),
                            predecessor: pred.id.clone(),
                        });
                    }
                });
            });
        }
    }
    if !any {
        ui.label(RichText::new("None").size(11.0).color(theme::TEXT_DIM));
    }

    let successors = deps::successors(forest, &task.id);
    if !successors.is_empty() {
        section(ui, "Required by");
        for succ in successors {
            ui.label(
                RichText::new(format!("{} {}", kind_icon(succ.kind), succ.name))
                    .size(11.0)
                    .color(theme::TEXT_SECONDARY),
            );
        }
    }

    // picker
    let key = Id::new(("dep-picker", &task.id));
    let mut picker: DepPickerState = ui.data(|d| d.get_temp(key)).unwrap_or_default();
    let holder = picker
        .holder
        .clone()
        .filter(|h| holders.iter().any(|(id, _)| id == h))
        .unwrap_or_else(|| task.id.clone());
    let candidates: Vec<(EntityId, EntityKind, String)> = index
        .iter()
        .filter(|e| !owned.iter().any(|o| o == e.id()))
        .map(|e| (e.id().to_string(), e.kind(), e.display_name()))
        .collect();

    ui.horizontal(|ui| {
        let holder_name = holders
            .iter()
            .find(|(id, _)| *id == holder)
            .map(|(_, n)| n.clone())
            .unwrap_or_default();
        egui::ComboBox::from_id_salt(("dep-holder", &task.id))
            .selected_text(RichText::new(holder_name).size(11.0))
            .width(100.0)
            .show_ui(ui, |ui| {
                for (id, name) in &holders {
                    if ui.selectable_label(*id == holder, name.as_str()).clicked() {
                        picker.holder = Some(id.clone());
                    }
                }
            });
        ui.label(RichText::new(icons::ARROW_LEFT).size(11.0).color(theme::TEXT_DIM));
        let pred_name = picker
            .predecessor
            .as_ref()
            .and_then(|p| candidates.iter().find(|(id, _, _)| id == p))
            .map(|(_, _, n)| n.clone())
            .unwrap_or_else(|| "Pick…".to_string());
        egui::ComboBox::from_id_salt(("dep-pred", &task.id))
            .selected_text(RichText::new(pred_name).size(11.0))
            .width(120.0)
            .show_ui(ui, |ui| {
                for (id, kind, name) in &candidates {
                    let label = format!("{} {}", kind_icon(*kind), name);
                    if ui
                        .selectable_label(picker.predecessor.as_ref() == Some(id), label)
                        .clicked()
                    {
                        picker.predecessor = Some(id.clone());
                    }
                }
            });
        let link = egui::Button::new(RichText::new("Link").color(Color32::WHITE).size(11.0))
            .fill(theme::ACCENT)
            .rounding(egui::Rounding::same(4.0));
        if ui.add_enabled(picker.predecessor.is_some(), link).clicked() {
            if let Some(predecessor) = picker.predecessor.take() {
                action = Some(EditorAction::AddDependency {
                    holder: holder.clone(),
                    predecessor,
                });
            }
        }
    });
    ui.data_mut(|d| d.insert_temp(key, picker));

    action
}
