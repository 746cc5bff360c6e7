use egui::{Color32, Context, RichText, Window};
use egui_phosphor::regular as icons;

use crate::app::GanttApp;
use crate::ui::theme;
use gantt_planner::io::ImportMode;

fn accent_button(text: &str) -> egui::Button<'static> {
    egui::Button::new(RichText::new(text.to_string()).color(Color32::WHITE))
        .fill(theme::ACCENT)
        .rounding(egui::Rounding::same(4.0))
}

/// Render the "Add Task" dialog.
pub fn show_add_task_dialog(app: &mut GanttApp, ctx: &Context) {
    let mut should_close = false;
    let parent_name = app
        .new_task_parent
        .as_deref()
        .and_then(|id| app.editor.forest().find_task(id))
        .map(|t| t.name.clone());
    let candidates: Vec<(String, String, usize)> = app
        .editor
        .forest()
        .flatten()
        .iter()
        .map(|n| (n.task.id.clone(), n.task.name.clone(), n.level))
        .collect();

    Window::new(RichText::new("Add Task").strong().size(14.0))
        .resizable(false)
        .collapsible(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .fixed_size([theme::DIALOG_WIDTH, 0.0])
        .show(ctx, |ui| {
            ui.visuals_mut().extreme_bg_color = theme::BG_FIELD;
            ui.add_space(4.0);

            egui::Grid::new("add_task_grid")
                .num_columns(2)
                .striped(false)
                .spacing([12.0, 8.0])
                .show(ui, |ui| {
                    ui.label(RichText::new("Name").color(theme::TEXT_SECONDARY));
                    ui.add_sized(
                        [220.0, 24.0],
                        egui::TextEdit::singleline(&mut app.new_task_name)
                            .hint_text("Task name...")
                            .text_color(theme::TEXT_PRIMARY),
                    );
                    ui.end_row();

                    ui.label(RichText::new("Start").color(theme::TEXT_SECONDARY));
                    ui.add(egui_extras::DatePickerButton::new(&mut app.new_task_start).id_salt("dlg_dp_start"));
                    ui.end_row();

                    ui.label(RichText::new("End").color(theme::TEXT_SECONDARY));
                    ui.add(egui_extras::DatePickerButton::new(&mut app.new_task_end).id_salt("dlg_dp_end"));
                    ui.end_row();

                    ui.label(RichText::new("Parent").color(theme::TEXT_SECONDARY));
                    egui::ComboBox::from_id_salt("dlg_parent")
                        .selected_text(parent_name.unwrap_or_else(|| "(top level)".to_string()))
                        .width(220.0)
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut app.new_task_parent, None, "(top level)");
                            for (id, name, level) in &candidates {
                                let label = format!("{}{}", "  ".repeat(*level), name);
                                ui.selectable_value(&mut app.new_task_parent, Some(id.clone()), label);
                            }
                        });
                    ui.end_row();
                });

            ui.add_space(6.0);
            ui.separator();
            ui.add_space(4.0);

            ui.horizontal(|ui| {
                if ui.add_sized([80.0, 28.0], accent_button("Create")).clicked() {
                    app.create_task_from_dialog();
                    should_close = true;
                }
                if ui.add_sized([80.0, 28.0], egui::Button::new("Cancel")).clicked() {
                    should_close = true;
                }
            });
            ui.add_space(2.0);
        });

    if should_close || ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
        app.show_add_task = false;
    }
}

/// Ask whether a loaded JSON file replaces the project or is merged into it.
pub fn show_import_dialog(app: &mut GanttApp, ctx: &Context) {
    let Some(count) = app.pending_import.as_ref().map(|f| f.task_count()) else {
        return;
    };
    let mut choice: Option<Option<ImportMode>> = None;

    Window::new(RichText::new("Import Project").strong().size(14.0))
        .resizable(false)
        .collapsible(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .fixed_size([theme::DIALOG_WIDTH, 0.0])
        .show(ctx, |ui| {
            ui.add_space(4.0);
            ui.label(format!("The file contains {count} tasks."));
            ui.label(
                RichText::new("Merging appends them with fresh IDs; links into the current project are not kept.")
                    .size(11.0)
                    .color(theme::TEXT_SECONDARY),
            );
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui.add_sized([90.0, 28.0], accent_button("Replace")).clicked() {
                    choice = Some(Some(ImportMode::Replace));
                }
                if ui.add_sized([90.0, 28.0], egui::Button::new("Merge")).clicked() {
                    choice = Some(Some(ImportMode::Merge));
                }
                if ui.add_sized([90.0, 28.0], egui::Button::new("Cancel")).clicked() {
                    choice = Some(None);
                }
            });
            ui.add_space(2.0);
        });

    if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
        choice = Some(None);
    }
    match choice {
        Some(Some(mode)) => app.finish_import(mode),
        Some(None) => {
            app.pending_import = None;
            app.editor.set_status("Import cancelled");
        }
        None => {}
    }
}

/// Render the snapshot manager.
pub fn show_snapshots_dialog(app: &mut GanttApp, ctx: &Context) {
    let mut should_close = false;
    let mut restore: Option<String> = None;
    let mut delete: Option<String> = None;
    let mut save = false;

    Window::new(RichText::new("Snapshots").strong().size(14.0))
        .resizable(true)
        .collapsible(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .default_size([420.0, 360.0])
        .show(ctx, |ui| {
            ui.visuals_mut().extreme_bg_color = theme::BG_FIELD;
            ui.horizontal(|ui| {
                ui.add_sized(
                    [240.0, 24.0],
                    egui::TextEdit::singleline(&mut app.snapshot_name).hint_text("Snapshot name..."),
                );
                if ui.add_sized([110.0, 24.0], accent_button("Save current")).clicked() {
                    save = true;
                }
            });
            ui.add_space(6.0);
            ui.separator();

            egui::ScrollArea::vertical().max_height(260.0).show(ui, |ui| {
                if app.snapshots.is_empty() {
                    ui.label(RichText::new("No snapshots yet").color(theme::TEXT_DIM));
                }
                for snapshot in app.snapshots.iter().rev() {
                    ui.horizontal(|ui| {
                        ui.vertical(|ui| {
                            ui.label(RichText::new(&snapshot.name).strong());
                            ui.label(
                                RichText::new(format!(
                                    "{} · {} tasks",
                                    snapshot.timestamp.format("%Y-%m-%d %H:%M"),
                                    snapshot.data.task_count()
                                ))
                                .size(10.5)
                                .color(theme::TEXT_SECONDARY),
                            );
                        });
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui
                                .add(egui::Button::new(RichText::new(icons::TRASH).color(theme::DANGER)).frame(false))
                                .on_hover_text("Delete snapshot")
                                .clicked()
                            {
                                delete = Some(snapshot.id.clone());
                            }
                            if ui.button("Restore").clicked() {
                                restore = Some(snapshot.id.clone());
                            }
                        });
                    });
                    ui.separator();
                }
            });

            ui.add_space(4.0);
            if ui.add_sized([80.0, 28.0], egui::Button::new("Close")).clicked() {
                should_close = true;
            }
        });

    if save {
        app.save_snapshot();
    }
    if let Some(id) = restore {
        app.restore_snapshot(&id);
    }
    if let Some(id) = delete {
        app.delete_snapshot(&id);
    }
    if should_close || ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
        app.show_snapshots = false;
    }
}

/// Render the "About" dialog.
pub fn show_about_dialog(app: &mut GanttApp, ctx: &Context) {
    let mut should_close = false;
    Window::new("About")
        .resizable(false)
        .collapsible(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .fixed_size([300.0, 190.0])
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(12.0);
                ui.heading(RichText::new("Gantt Planner").strong());
                ui.add_space(2.0);
                ui.label(
                    RichText::new(format!("Version {}", env!("CARGO_PKG_VERSION"))).color(theme::TEXT_SECONDARY),
                );
                ui.add_space(10.0);
                ui.label("Hierarchical Gantt planning");
                ui.label("built with Rust and egui.");
                ui.add_space(14.0);
                if ui.add_sized([100.0, 28.0], egui::Button::new("Close")).clicked() {
                    should_close = true;
                }
            });
        });
    if should_close || ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
        app.show_about = false;
    }
}

/// Render the "CSV Import Format" help dialog.
pub fn show_csv_help_dialog(app: &mut GanttApp, ctx: &Context) {
    let mut should_close = false;

    Window::new(RichText::new("CSV Import Format").strong().size(14.0))
        .resizable(true)
        .collapsible(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .default_size([560.0, 480.0])
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(4.0);
                ui.label(RichText::new("Delimiters").strong());
                ui.label("The delimiter is auto-detected: comma (,), semicolon (;), or tab.");
                ui.add_space(8.0);

                ui.label(RichText::new("Columns").strong());
                ui.add_space(2.0);
                egui::Grid::new("csv_columns")
                    .num_columns(2)
                    .striped(true)
                    .spacing([12.0, 4.0])
                    .show(ui, |ui| {
                        let rows = [
                            ("Task Name *", "Name, Task, Task Label, Task Name, Label, Title, Activity"),
                            ("Start Date *", "Start, Start Date, From, Begin, Begin Date"),
                            ("End Date *", "End, End Date, To, Finish, Finish Date, Due, Due Date"),
                            ("Level", "Level, Depth, Indent (0 = top level)"),
                            ("Parent", "Parent, Parent Task, Parent Name, Subtask Of"),
                            ("Milestones", "Milestones: \"Label (DD/MM/YYYY), ...\""),
                            ("Milestone", "Milestone, Is Milestone, Type (true / yes / 1 / milestone)"),
                            ("Description", "Description, Notes, Note, Details, Comment"),
                        ];
                        ui.label(RichText::new("Column").underline());
                        ui.label(RichText::new("Accepted headers (case-insensitive)").underline());
                        ui.end_row();
                        for (column, headers) in rows {
                            ui.label(RichText::new(column).strong());
                            ui.label(headers);
                            ui.end_row();
                        }
                    });
                ui.add_space(8.0);

                ui.label(RichText::new("Supported Date Formats").strong());
                for fmt in [
                    "YYYY-MM-DD   (e.g. 2025-06-15)",
                    "DD/MM/YYYY   (e.g. 15/06/2025)",
                    "MM/DD/YYYY   (e.g. 06/15/2025)",
                    "DD-MM-YYYY   (e.g. 15-06-2025)",
                    "DD.MM.YYYY   (e.g. 15.06.2025)",
                    "YYYY/MM/DD   (e.g. 2025/06/15)",
                ] {
                    ui.label(RichText::new(fmt).monospace().size(11.0));
                }
                ui.add_space(8.0);

                ui.label(RichText::new("Notes").strong());
                for note in [
                    "• A Level column takes precedence over Parent for nesting.",
                    "• Parent tasks are matched by name within the same file.",
                    "• Rows marked as milestones become milestones of their parent task.",
                    "• Rows with a missing name or unreadable dates are skipped.",
                    "• Files written by Export CSV import back unchanged.",
                ] {
                    ui.label(RichText::new(note).small());
                }
                ui.add_space(10.0);

                ui.label(RichText::new("Example (semicolon-delimited)").strong());
                let example = "Level;Task;Start;End;Milestones\n\
                               0;Phase 1;01/01/2025;28/02/2025;Sign-off (28/02/2025)\n\
                               1;Design;01/01/2025;31/01/2025;\n\
                               1;Build;01/02/2025;28/02/2025;\n\
                               0;Launch;01/03/2025;02/03/2025;";
                egui::Frame::dark_canvas(ui.style()).show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut example.to_string())
                            .font(egui::TextStyle::Monospace)
                            .desired_width(f32::INFINITY)
                            .interactive(false),
                    );
                });
                ui.add_space(8.0);
            });

            ui.separator();
            if ui.add_sized([80.0, 28.0], egui::Button::new("Close")).clicked() {
                should_close = true;
            }
        });

    if should_close || ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
        app.show_csv_help = false;
    }
}
