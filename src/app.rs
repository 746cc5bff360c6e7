use chrono::{Duration, NaiveDate};
use std::path::PathBuf;
use tracing::{info, warn};

use gantt_planner::config::{Settings, ViewSettings};
use gantt_planner::drag::{DragController, DragSignal};
use gantt_planner::editor::ProjectEditor;
use gantt_planner::io::{self, FileStore, ImportMode, ProjectStore, Snapshot};
use gantt_planner::model::{EntityId, Forest, Milestone, Task, TimeRange, TimelineViewport};

use crate::ui;
use crate::ui::gantt_chart::ChartOptions;
use crate::ui::task_editor::EditorAction;
use crate::ui::task_table::TaskTableAction;

/// Seconds between a change and the background save to the data folder.
const AUTOSAVE_DELAY: f64 = 2.0;

/// Main application state.
pub struct GanttApp {
    pub editor: ProjectEditor,
    pub drag: DragController,
    pub viewport: TimelineViewport,
    pub settings: Settings,
    pub file_path: Option<PathBuf>,

    // Dialog state
    pub show_add_task: bool,
    pub show_about: bool,
    pub show_csv_help: bool,
    pub show_snapshots: bool,
    pub new_task_name: String,
    pub new_task_start: NaiveDate,
    pub new_task_end: NaiveDate,
    pub new_task_parent: Option<EntityId>,
    pub snapshot_name: String,
    pub snapshots: Vec<Snapshot>,
    /// Parsed JSON waiting for the user to pick replace or merge.
    pub pending_import: Option<Forest>,

    settings_path: PathBuf,
    store: FileStore,
    last_persisted: Forest,
    last_change: Option<f64>,
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl GanttApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        // Register Phosphor icon font as a fallback so icons render inline with text
        let mut fonts = egui::FontDefinitions::default();
        egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
        cc.egui_ctx.set_fonts(fonts);

        let settings_path = Settings::default_path();
        let settings = Settings::load(&settings_path);
        let store = FileStore::default_location();
        let today = today();
        let forest = io::store::load_or_sample(&store, today);
        info!(tasks = forest.task_count(), data = %store.root().display(), "project loaded");

        let editor = ProjectEditor::with_settings(forest.clone(), &settings);
        let viewport = Self::viewport_for(&editor, &settings.view, today);
        let (new_task_start, new_task_end) = editor.default_span(today);

        Self {
            drag: DragController::new(settings.snap_config()),
            viewport,
            editor,
            file_path: None,
            show_add_task: false,
            show_about: false,
            show_csv_help: false,
            show_snapshots: false,
            new_task_name: String::new(),
            new_task_start,
            new_task_end,
            new_task_parent: None,
            snapshot_name: String::new(),
            snapshots: Vec::new(),
            pending_import: None,
            settings,
            settings_path,
            store,
            last_persisted: forest,
            last_change: None,
        }
    }

    fn viewport_for(editor: &ProjectEditor, view: &ViewSettings, today: NaiveDate) -> TimelineViewport {
        let mut viewport = TimelineViewport::fit(editor.span(), today);
        viewport.scale = view.scale;
        viewport.pixels_per_day = view
            .pixels_per_day
            .clamp(TimelineViewport::MIN_PIXELS_PER_DAY, TimelineViewport::MAX_PIXELS_PER_DAY);
        viewport
    }

    /// View options as currently shown, for writing into project files.
    fn current_view(&self) -> ViewSettings {
        ViewSettings {
            scale: self.viewport.scale,
            pixels_per_day: self.viewport.pixels_per_day,
            ..self.settings.view.clone()
        }
    }

    pub fn fit_viewport(&mut self) {
        let (scale, ppd) = (self.viewport.scale, self.viewport.pixels_per_day);
        self.viewport = TimelineViewport::fit(self.editor.span(), today());
        self.viewport.scale = scale;
        self.viewport.pixels_per_day = ppd;
    }

    pub fn apply_snap_settings(&mut self) {
        self.drag.set_snap(self.settings.snap_config());
    }

    pub fn persist_settings(&mut self) {
        self.settings.view.pixels_per_day = self.viewport.pixels_per_day;
        self.settings.save(&self.settings_path);
    }

    // --- File operations ---

    pub fn new_project(&mut self) {
        self.editor.replace_project(Forest::default());
        self.file_path = None;
        self.fit_viewport();
        self.editor.set_status("New project created");
    }

    pub fn open_project(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Gantt Project", &["gantt.json", "json"])
            .pick_file()
        else {
            return;
        };
        match io::file::load_project(&path) {
            Ok(imported) => {
                self.editor.replace_project(imported.forest);
                if let Some(view) = imported.view_settings {
                    self.settings.view = view;
                }
                self.viewport = Self::viewport_for(&self.editor, &self.settings.view, today());
                info!(path = %path.display(), "opened project");
                self.file_path = Some(path);
                self.editor.set_status("Project loaded");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open project");
                self.editor.set_status(format!("Error loading: {e}"));
            }
        }
    }

    pub fn save_project(&mut self) {
        match self.file_path.clone() {
            Some(path) => self.write_project(path),
            None => self.save_project_as(),
        }
    }

    pub fn save_project_as(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Gantt Project", &["gantt.json", "json"])
            .set_file_name("project.gantt.json")
            .save_file()
        {
            self.write_project(path);
        }
    }

    fn write_project(&mut self, path: PathBuf) {
        match io::file::save_project(self.editor.forest(), &self.current_view(), &path) {
            Ok(()) => {
                info!(path = %path.display(), "saved project");
                self.file_path = Some(path);
                self.editor.set_status("Project saved");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not save project");
                self.editor.set_status(format!("Error saving: {e}"));
            }
        }
    }

    /// Parse a JSON export and ask whether to replace or merge.
    pub fn import_json(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        else {
            return;
        };
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| io::parse_import(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(imported) => self.pending_import = Some(imported.forest),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "JSON import failed");
                self.editor.set_status(format!("Import failed: {e}"));
            }
        }
    }

    pub fn finish_import(&mut self, mode: ImportMode) {
        let Some(incoming) = self.pending_import.take() else {
            return;
        };
        if self.editor.import(&incoming, mode) {
            self.fit_viewport();
        }
    }

    pub fn import_csv(&mut self) {
        // Guard: if current project has tasks, confirm before replacing
        if !self.editor.forest().is_empty() {
            let confirm = rfd::MessageDialog::new()
                .set_title("Import CSV")
                .set_description("This will replace the current project. Continue?")
                .set_buttons(rfd::MessageButtons::YesNo)
                .show();
            if confirm != rfd::MessageDialogResult::Yes {
                return;
            }
        }

        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv", "txt"])
            .pick_file()
        else {
            return;
        };
        match io::csv_import::import_csv(&path) {
            Ok((forest, skipped)) => {
                let count = forest.task_count();
                self.editor.import(&forest, ImportMode::Replace);
                self.file_path = None;
                self.fit_viewport();
                if skipped > 0 {
                    self.editor
                        .set_status(format!("Imported {count} tasks ({skipped} rows skipped)"));
                } else {
                    self.editor.set_status(format!("Imported {count} tasks"));
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "CSV import failed");
                self.editor.set_status(format!("CSV import failed: {e}"));
            }
        }
    }

    pub fn export_csv(&mut self) {
        if self.editor.forest().is_empty() {
            self.editor.set_status("Nothing to export: project has no tasks");
            return;
        }
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .set_file_name("project.csv")
            .save_file()
        {
            match io::csv_export::export_csv(self.editor.forest(), &path) {
                Ok(count) => self.editor.set_status(format!("Exported {count} tasks to CSV")),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "CSV export failed");
                    self.editor.set_status(format!("CSV export failed: {e}"));
                }
            }
        }
    }

    pub fn open_data_folder(&mut self) {
        let root = self.store.root().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&root).and_then(|()| open::that(&root)) {
            warn!(path = %root.display(), error = %e, "could not open data folder");
            self.editor.set_status(format!("Could not open {}: {e}", root.display()));
        }
    }

    // --- Snapshots ---

    pub fn open_snapshots(&mut self) {
        self.refresh_snapshots();
        self.show_snapshots = true;
    }

    fn refresh_snapshots(&mut self) {
        match self.store.list_snapshots() {
            Ok(snapshots) => self.snapshots = snapshots,
            Err(e) => {
                warn!(error = %e, "could not list snapshots");
                self.editor.set_status(format!("Could not read snapshots: {e}"));
            }
        }
    }

    pub fn save_snapshot(&mut self) {
        let name = std::mem::take(&mut self.snapshot_name);
        match self.store.save_snapshot(&name, self.editor.forest()) {
            Ok(snapshot) => self.editor.set_status(format!("Snapshot '{}' saved", snapshot.name)),
            Err(e) => self.editor.set_status(format!("Could not save snapshot: {e}")),
        }
        self.refresh_snapshots();
    }

    pub fn restore_snapshot(&mut self, id: &str) {
        let Some(snapshot) = self.snapshots.iter().find(|s| s.id == id).cloned() else {
            return;
        };
        if self.editor.import(&snapshot.data, ImportMode::Replace) {
            self.fit_viewport();
            self.editor
                .set_status(format!("Restored snapshot '{}'", snapshot.name));
        }
        self.show_snapshots = false;
    }

    pub fn delete_snapshot(&mut self, id: &str) {
        if let Err(e) = self.store.delete_snapshot(id) {
            self.editor.set_status(format!("Could not delete snapshot: {e}"));
        }
        self.refresh_snapshots();
    }

    // --- Task operations ---

    pub fn create_task_from_dialog(&mut self) {
        let start = self.new_task_start;
        let end = if self.new_task_end >= start {
            self.new_task_end
        } else {
            self.editor.default_span(start).1
        };
        let name = self.new_task_name.trim();
        let mut task = Task::new(if name.is_empty() { "New Task" } else { name }, start, end);
        task.color = ui::theme::task_color(self.editor.forest().task_count());

        let parent = self.new_task_parent.take();
        self.editor.add_task_with(parent.as_deref(), task);
        self.reset_dialog_fields();
    }

    fn add_child(&mut self, parent_id: &str) {
        let today = today();
        let start = self
            .editor
            .forest()
            .find_task(parent_id)
            .map_or(today, |p| p.start_date.max(today));
        let mut task = Task::with_span("New Subtask", start, self.settings.default_task_days);
        task.color = ui::theme::task_color(self.editor.forest().task_count());
        self.editor.add_task_with(Some(parent_id), task);
    }

    pub fn duplicate(&mut self, task_id: &str) {
        if let Some(start) = self.editor.forest().find_task(task_id).map(|t| t.start_date) {
            self.editor.duplicate_task(task_id, start);
        }
    }

    fn reset_dialog_fields(&mut self) {
        let (start, end) = self.editor.default_span(today());
        self.new_task_name.clear();
        self.new_task_start = start;
        self.new_task_end = end;
        self.new_task_parent = None;
    }

    fn handle_table_action(&mut self, action: TaskTableAction) {
        match action {
            TaskTableAction::None => {}
            TaskTableAction::Select(id) => self.editor.select(Some(id)),
            TaskTableAction::Delete(id) => {
                self.editor.delete_task(&id);
            }
            TaskTableAction::ToggleExpanded(id) => {
                self.editor.toggle_expanded(&id);
            }
            TaskTableAction::Indent(id) => {
                self.editor.indent(&id);
            }
            TaskTableAction::Outdent(id) => {
                self.editor.outdent(&id);
            }
            TaskTableAction::AddChild(id) => self.add_child(&id),
            TaskTableAction::Move { active, over } => {
                self.editor.move_task(&active, &over);
            }
            TaskTableAction::Add => {
                self.new_task_parent = self.editor.selected().map(str::to_string);
                self.show_add_task = true;
            }
        }
    }

    fn handle_editor_action(&mut self, task_id: &str, action: EditorAction) {
        match action {
            EditorAction::None => {}
            EditorAction::Update(patch) => {
                self.editor.update_task(task_id, &patch);
            }
            EditorAction::AddRange => {
                let Some(task) = self.editor.forest().find_task(task_id) else {
                    return;
                };
                let last_end = task
                    .spans()
                    .iter()
                    .map(|(_, _, end)| *end)
                    .max()
                    .unwrap_or(task.end_date);
                let start = last_end + Duration::days(1);
                let range = TimeRange::new(start, start + Duration::days(6));
                self.editor.add_time_range(task_id, range);
            }
            EditorAction::UpdateRange(id, patch) => {
                self.editor.update_time_range(&id, &patch);
            }
            EditorAction::DeleteRange(id) => {
                self.editor.delete_time_range(&id);
            }
            EditorAction::AddMilestone => {
                let Some(date) = self.editor.forest().find_task(task_id).map(|t| t.end_date) else {
                    return;
                };
                self.editor.add_milestone(task_id, Milestone::new("Milestone", date));
            }
            EditorAction::UpdateMilestone(id, patch) => {
                self.editor.update_milestone(&id, &patch);
            }
            EditorAction::DeleteMilestone(id) => {
                self.editor.delete_milestone(&id);
            }
            EditorAction::AddDependency { holder, predecessor } => {
                // a refused link leaves its reason in the status bar
                if let Ok(true) = self.editor.add_dependency(&holder, &predecessor) {
                    self.editor.set_status("Dependency added");
                }
            }
            EditorAction::RemoveDependency { holder, predecessor } => {
                self.editor.remove_dependency(&holder, &predecessor);
            }
            EditorAction::Duplicate => self.duplicate(task_id),
        }
    }

    fn apply_drag(&mut self, signal: DragSignal) {
        let summary = match &signal {
            DragSignal::CommitBar {
                target,
                start,
                end,
                copy: false,
                ..
            } => self.editor.forest().find_task(&target.task_id).map(|task| {
                format!(
                    "Updated '{}' ({} → {})",
                    task.name,
                    start.format("%Y-%m-%d"),
                    end.format("%Y-%m-%d")
                )
            }),
            _ => None,
        };
        if self.editor.apply_drag(signal) {
            if let Some(message) = summary {
                self.editor.set_status(message);
            }
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let typing = ctx.memory(|m| m.focused().is_some());
        let (save, undo, redo, duplicate, delete, indent, outdent) = ctx.input(|i| {
            let ctrl = i.modifiers.command;
            (
                ctrl && i.key_pressed(egui::Key::S),
                ctrl && !i.modifiers.shift && i.key_pressed(egui::Key::Z),
                ctrl && (i.key_pressed(egui::Key::Y) || (i.modifiers.shift && i.key_pressed(egui::Key::Z))),
                ctrl && i.key_pressed(egui::Key::D),
                !typing && i.key_pressed(egui::Key::Delete),
                !typing && !i.modifiers.shift && i.key_pressed(egui::Key::Tab),
                !typing && i.modifiers.shift && i.key_pressed(egui::Key::Tab),
            )
        });

        if save {
            self.save_project();
        }
        if self.drag.is_active() {
            return;
        }
        if undo {
            self.editor.undo();
        }
        if redo {
            self.editor.redo();
        }
        let Some(selected) = self.editor.selected().map(str::to_string) else {
            return;
        };
        if duplicate {
            self.duplicate(&selected);
        }
        if delete {
            self.editor.delete_task(&selected);
        }
        if indent {
            self.editor.indent(&selected);
        }
        if outdent {
            self.editor.outdent(&selected);
        }
    }

    /// Save the working project to the data folder a short while after the
    /// last change.
    fn autosave(&mut self, ctx: &egui::Context) {
        if self.editor.forest().same_nodes(&self.last_persisted) {
            self.last_change = None;
            return;
        }
        let now = ctx.input(|i| i.time);
        let since = *self.last_change.get_or_insert(now);
        if now - since < AUTOSAVE_DELAY {
            ctx.request_repaint_after(std::time::Duration::from_secs_f64(AUTOSAVE_DELAY));
            return;
        }
        match self.store.save(self.editor.forest()) {
            Ok(()) => tracing::debug!("autosaved project"),
            Err(e) => warn!(error = %e, "autosave failed"),
        }
        self.last_persisted = self.editor.forest().clone();
        self.last_change = None;
    }

    fn show_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(ui::theme::STATUS_BAR_HEIGHT)
            .frame(
                egui::Frame::default()
                    .fill(ui::theme::BG_STATUS)
                    .inner_margin(egui::Margin::symmetric(10.0, 0.0)),
            )
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(
                        egui::RichText::new(self.editor.status())
                            .font(ui::theme::font_status())
                            .color(ui::theme::TEXT_SECONDARY),
                    );
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            egui::RichText::new(format!("Tasks: {}", self.editor.forest().task_count()))
                                .size(10.5)
                                .color(ui::theme::TEXT_DIM),
                        );
                        ui.label(egui::RichText::new(" · ").size(10.5).color(ui::theme::TEXT_DIM));
                        let default_ppd = ViewSettings::default().pixels_per_day;
                        ui.label(
                            egui::RichText::new(format!(
                                "Zoom: {:.0}%",
                                self.viewport.pixels_per_day / default_ppd * 100.0
                            ))
                            .size(10.5)
                            .color(ui::theme::TEXT_DIM),
                        );
                        let history = self.editor.history();
                        ui.label(egui::RichText::new(" · ").size(10.5).color(ui::theme::TEXT_DIM));
                        ui.label(
                            egui::RichText::new(format!("History: {}/{}", history.index() + 1, history.len()))
                                .size(10.5)
                                .color(ui::theme::TEXT_DIM),
                        );
                    });
                });
            });
    }
}

impl eframe::App for GanttApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ui::theme::apply_theme(ctx);

        // Handle keyboard shortcuts outside closures to avoid borrow issues
        self.handle_shortcuts(ctx);

        // Top panel: toolbar
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui::toolbar::show_toolbar(self, ui);
        });

        self.show_status_bar(ctx);

        // Left panel: editor for the selection, then the task tree
        let mut table_action = TaskTableAction::None;
        let mut editor_action = None;
        egui::SidePanel::left("task_panel")
            .default_width(ui::theme::SIDE_PANEL_WIDTH)
            .min_width(220.0)
            .max_width(ui::theme::SIDE_PANEL_WIDTH * 2.0)
            .resizable(true)
            .frame(
                egui::Frame::default()
                    .fill(ui::theme::BG_PANEL)
                    .inner_margin(egui::Margin::same(8.0))
                    .stroke(egui::Stroke::new(1.0, ui::theme::BORDER_SUBTLE)),
            )
            .show(ctx, |ui| {
                let forest = self.editor.forest();
                if let Some(task) = self.editor.selected().and_then(|id| forest.find_task(id)) {
                    egui::ScrollArea::vertical()
                        .id_salt("task_editor_scroll")
                        .max_height(ui.available_height() * 0.55)
                        .show(ui, |ui| {
                            let action = ui::task_editor::show_task_editor(task, forest, ui);
                            editor_action = Some((task.id.clone(), action));
                        });
                    ui.add_space(4.0);
                    ui.separator();
                    ui.add_space(2.0);
                }
                table_action = ui::task_table::show_task_table(forest, self.editor.selected(), ui);
            });

        if let Some((task_id, action)) = editor_action {
            self.handle_editor_action(&task_id, action);
        }
        self.handle_table_action(table_action);

        // Central panel: Gantt chart
        let options = ChartOptions {
            show_dependencies: self.settings.view.show_dependencies,
            show_today: self.settings.view.show_today,
            today: today(),
        };
        let chart_frame = egui::Frame::default()
            .fill(ui::theme::BG_DARK)
            .inner_margin(egui::Margin::ZERO);
        let interaction = egui::CentralPanel::default()
            .frame(chart_frame)
            .show(ctx, |ui| {
                ui::gantt_chart::show_gantt_chart(
                    self.editor.forest(),
                    &mut self.viewport,
                    &mut self.drag,
                    self.editor.selected(),
                    options,
                    ui,
                )
            })
            .inner;
        if let Some(selection) = interaction.select {
            self.editor.select(selection);
        }
        if let Some(signal) = interaction.signal {
            self.apply_drag(signal);
        }
        if self.drag.is_active() {
            ctx.request_repaint();
        }

        // Dialogs
        if self.show_add_task {
            ui::dialogs::show_add_task_dialog(self, ctx);
        }
        if self.pending_import.is_some() {
            ui::dialogs::show_import_dialog(self, ctx);
        }
        if self.show_snapshots {
            ui::dialogs::show_snapshots_dialog(self, ctx);
        }
        if self.show_about {
            ui::dialogs::show_about_dialog(self, ctx);
        }
        if self.show_csv_help {
            ui::dialogs::show_csv_help_dialog(self, ctx);
        }

        self.autosave(ctx);
    }
}
