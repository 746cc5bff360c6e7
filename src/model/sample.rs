use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use egui::Color32;

use super::task::{Milestone, MilestoneShape, Task, TimeRange};
use super::tree::Forest;

/// Generate a sample project for demonstration: three phases, the second
/// with two sub-tasks, one of which is split into two time ranges.
pub fn sample_forest(today: NaiveDate) -> Forest {
    let days = Duration::days;

    // ── Phase 1: Planning ───────────────────────────────────────
    let mut kickoff = Task::new("Project Kickoff", today - days(5), today - days(2));
    kickoff.color = Color32::from_rgb(70, 130, 180);

    let mut requirements = Task::new("Requirements Gathering", today - days(2), today + days(5));
    requirements.color = Color32::from_rgb(60, 179, 113);
    requirements.dependencies.push(kickoff.id.clone());

    let mut planning = Task::new("Planning", today - days(5), today + days(8));
    planning.color = Color32::from_rgb(70, 120, 180);
    planning
        .milestones
        .push(Milestone::new("Planning Complete", today + days(8)));
    planning.children = vec![Arc::new(kickoff), Arc::new(requirements)];

    // ── Phase 2: Execution ──────────────────────────────────────
    let mut design = Task::new("UI Design", today + days(6), today + days(18));
    design.color = Color32::from_rgb(218, 112, 214);
    let mut sketches = TimeRange::new(today + days(6), today + days(10));
    sketches.label = Some("Sketches".into());
    let polish = TimeRange::new(today + days(14), today + days(18));
    design.time_ranges = vec![sketches, polish];
    design.sync_span();

    let mut backend = Task::new("Backend Development", today + days(6), today + days(28));
    backend.color = Color32::from_rgb(106, 90, 205);
    let mut api_freeze = Milestone::new("API Freeze", today + days(20));
    api_freeze.shape = MilestoneShape::Flag;
    backend.milestones.push(api_freeze);

    let mut execution = Task::new("Execution", today + days(6), today + days(30));
    execution.color = Color32::from_rgb(180, 100, 50);
    execution.dependencies.push(planning.id.clone());
    execution.children = vec![Arc::new(design), Arc::new(backend)];

    // ── Phase 3: Launch ─────────────────────────────────────────
    let mut launch = Task::new("Launch", today + days(30), today + days(32));
    launch.color = Color32::from_rgb(220, 20, 60);
    let mut go_live = Milestone::new("Go Live", today + days(32));
    go_live.shape = MilestoneShape::Star;
    launch.milestones.push(go_live);
    launch.dependencies.push(execution.id.clone());

    Forest::new(vec![planning, execution, launch])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_valid_and_shaped_as_documented() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let forest = sample_forest(today);
        assert_eq!(forest.validate(), Ok(()));
        assert_eq!(forest.roots().len(), 3);
        assert_eq!(forest.roots()[1].children.len(), 2);
        assert_eq!(forest.task_count(), 7);
    }
}
