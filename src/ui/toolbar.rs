use egui::{menu, RichText, Ui};

use crate::app::GanttApp;
use crate::ui::theme;
use gantt_planner::model::{SnapMode, TimelineScale};

/// Render the top toolbar / menu bar.
pub fn show_toolbar(app: &mut GanttApp, ui: &mut Ui) {
    menu::bar(ui, |ui| {
        ui.menu_button(RichText::new("  File  ").font(theme::font_menu()), |ui| {
            if ui.button("  New Project").clicked() {
                app.new_project();
                ui.close_menu();
            }
            if ui.button("  Open...").clicked() {
                app.open_project();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("  Save          Ctrl+S").clicked() {
                app.save_project();
                ui.close_menu();
            }
            if ui.button("  Save As...").clicked() {
                app.save_project_as();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("  Import JSON...").clicked() {
                app.import_json();
                ui.close_menu();
            }
            if ui.button("  Import CSV...").clicked() {
                app.import_csv();
                ui.close_menu();
            }
            if ui.button("  Export CSV...").clicked() {
                app.export_csv();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("  Snapshots...").clicked() {
                app.open_snapshots();
                ui.close_menu();
            }
            if ui.button("  Open Data Folder").clicked() {
                app.open_data_folder();
                ui.close_menu();
            }
        });

        ui.menu_button(RichText::new("  Edit  ").font(theme::font_menu()), |ui| {
            if ui
                .add_enabled(app.editor.can_undo(), egui::Button::new("  Undo          Ctrl+Z"))
                .clicked()
            {
                app.editor.undo();
                ui.close_menu();
            }
            if ui
                .add_enabled(app.editor.can_redo(), egui::Button::new("  Redo          Ctrl+Y"))
                .clicked()
            {
                app.editor.redo();
                ui.close_menu();
            }
            ui.separator();
            let selected = app.editor.selected().map(str::to_string);
            let has_selection = selected.is_some();
            if ui.add_enabled(has_selection, egui::Button::new("  Indent        Tab")).clicked() {
                if let Some(id) = &selected {
                    app.editor.indent(id);
                }
                ui.close_menu();
            }
            if ui
                .add_enabled(has_selection, egui::Button::new("  Outdent       Shift+Tab"))
                .clicked()
            {
                if let Some(id) = &selected {
                    app.editor.outdent(id);
                }
                ui.close_menu();
            }
            if ui.add_enabled(has_selection, egui::Button::new("  Duplicate     Ctrl+D")).clicked() {
                if let Some(id) = &selected {
                    app.duplicate(id);
                }
                ui.close_menu();
            }
            if ui.add_enabled(has_selection, egui::Button::new("  Delete        Del")).clicked() {
                if let Some(id) = &selected {
                    app.editor.delete_task(id);
                }
                ui.close_menu();
            }
        });

        ui.menu_button(RichText::new("  View  ").font(theme::font_menu()), |ui| {
            if ui.button("  Zoom In        Ctrl+Scroll ↑").clicked() {
                app.viewport.zoom_in();
                ui.close_menu();
            }
            if ui.button("  Zoom Out      Ctrl+Scroll ↓").clicked() {
                app.viewport.zoom_out();
                ui.close_menu();
            }
            if ui.button("  Fit Project").clicked() {
                app.fit_viewport();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("  Expand All").clicked() {
                app.editor.set_all_expanded(true);
                ui.close_menu();
            }
            if ui.button("  Collapse All").clicked() {
                app.editor.set_all_expanded(false);
                ui.close_menu();
            }
            ui.separator();
            ui.label(RichText::new("Timeline Scale").small().weak());
            let mut scale = app.viewport.scale;
            for (value, name) in [
                (TimelineScale::Days, "Days"),
                (TimelineScale::Weeks, "Weeks"),
                (TimelineScale::Months, "Months"),
            ] {
                if ui.radio_value(&mut scale, value, name).clicked() {
                    ui.close_menu();
                }
            }
            if scale != app.viewport.scale {
                app.viewport.scale = scale;
                app.settings.view.scale = scale;
                app.persist_settings();
            }
            ui.separator();
            ui.label(RichText::new("Snapping").small().weak());
            let mut mode = app.settings.snap_mode;
            let adaptive = ui
                .radio_value(&mut mode, SnapMode::Adaptive, "Adaptive (months when zoomed out)")
                .clicked();
            let days = ui.radio_value(&mut mode, SnapMode::Day, "Whole days").clicked();
            if adaptive || days {
                ui.close_menu();
            }
            if mode != app.settings.snap_mode {
                app.settings.snap_mode = mode;
                app.apply_snap_settings();
                app.persist_settings();
            }
            ui.separator();
            let mut view = app.settings.view.clone();
            ui.checkbox(&mut view.show_dependencies, "Show dependencies");
            ui.checkbox(&mut view.show_today, "Show today line");
            if view != app.settings.view {
                app.settings.view = view;
                app.persist_settings();
            }
        });

        ui.menu_button(RichText::new("  Help  ").font(theme::font_menu()), |ui| {
            if ui.button("CSV Format").clicked() {
                app.show_csv_help = true;
                ui.close_menu();
            }
            if ui.button("About").clicked() {
                app.show_about = true;
                ui.close_menu();
            }
        });

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let name = app
                .file_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled (unsaved)".to_string());
            ui.label(RichText::new(name).size(11.0).weak());
        });
    });
}
