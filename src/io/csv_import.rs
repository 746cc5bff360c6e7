use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use egui::Color32;
use tracing::{info, warn};

use crate::model::{Forest, Milestone, Task};

use super::envelope::ImportError;

/// Bar colors cycled through for imported rows.
pub const IMPORT_PALETTE: [Color32; 8] = [
    Color32::from_rgb(70, 130, 180),
    Color32::from_rgb(60, 179, 113),
    Color32::from_rgb(218, 112, 214),
    Color32::from_rgb(255, 165, 0),
    Color32::from_rgb(100, 149, 237),
    Color32::from_rgb(220, 20, 60),
    Color32::from_rgb(0, 206, 209),
    Color32::from_rgb(255, 215, 0),
];

/// Try parsing a date string with several common formats.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    crate::model::task::date_serde::parse(s)
}

/// Detect delimiter by checking the first line for common separators.
fn detect_delimiter(first_line: &str) -> u8 {
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    let tabs = first_line.matches('\t').count();

    if semicolons >= commas && semicolons >= tabs {
        b';'
    } else if tabs >= commas {
        b'\t'
    } else {
        b','
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Name,
    Start,
    End,
    Description,
    Parent,
    Level,
    Milestones,
    IsMilestone,
}

fn header_to_column(header: &str) -> Option<Column> {
    let normalized = header.trim().to_lowercase().replace([' ', '-', '_'], "");
    match normalized.as_str() {
        "name" | "task" | "tasklabel" | "taskname" | "label" | "title" | "activity" => {
            Some(Column::Name)
        }
        "start" | "startdate" | "from" | "begin" | "begindate" => Some(Column::Start),
        "end" | "enddate" | "to" | "finish" | "finishdate" | "due" | "duedate" => Some(Column::End),
        "description" | "notes" | "note" | "details" | "comment" | "comments" => {
            Some(Column::Description)
        }
        "parent" | "parenttask" | "parentname" | "subtaskof" => Some(Column::Parent),
        "level" | "depth" | "indent" => Some(Column::Level),
        "milestones" => Some(Column::Milestones),
        "milestone" | "ismilestone" | "type" => Some(Column::IsMilestone),
        _ => None,
    }
}

/// Parse `Label (date), Label (date)` as written by the CSV export.
fn parse_milestones(cell: &str) -> Vec<Milestone> {
    cell.split("),")
        .filter_map(|entry| {
            let entry = entry.trim().trim_end_matches(')');
            let (label, date) = entry.rsplit_once('(')?;
            Some(Milestone::new(label.trim(), parse_date(date)?))
        })
        .collect()
}

fn is_truthy(cell: &str) -> bool {
    matches!(
        cell.trim().to_lowercase().as_str(),
        "true" | "yes" | "1" | "milestone"
    )
}

struct Row {
    task: Task,
    parent: Option<String>,
    level: Option<usize>,
    is_milestone: bool,
}

/// Import tasks from CSV text.
///
/// Nesting comes from a `Level` column when present, otherwise from a
/// `Parent` column naming another row's task. Rows flagged as milestones
/// become milestones of their parent task.
/// Returns `(forest, skipped_rows)`.
pub fn import_csv_str(content: &str) -> Result<(Forest, usize), ImportError> {
    let first_line = content.lines().next().unwrap_or("");
    let delimiter = detect_delimiter(first_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let columns: Vec<Option<Column>> = headers.iter().map(header_to_column).collect();
    let has = |c: Column| columns.contains(&Some(c));
    if !has(Column::Name) || !has(Column::Start) || !has(Column::End) {
        let found: Vec<&str> = headers.iter().collect();
        return Err(ImportError::MissingColumns(found.join(", ")));
    }

    let mut rows: Vec<Row> = Vec::new();
    let mut skipped = 0usize;

    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(row = i + 2, error = %e, "skipping CSV row");
                skipped += 1;
                continue;
            }
        };

        let mut cells: HashMap<Column, &str> = HashMap::new();
        for (field, column) in record.iter().zip(columns.iter()) {
            if let Some(column) = column {
                cells.entry(*column).or_insert(field);
            }
        }
        let cell = |c: Column| cells.get(&c).copied().unwrap_or("");

        let name = cell(Column::Name);
        if name.is_empty() {
            skipped += 1;
            continue;
        }
        let (Some(start), Some(end)) = (parse_date(cell(Column::Start)), parse_date(cell(Column::End)))
        else {
            warn!(row = i + 2, name, "skipping row with invalid dates");
            skipped += 1;
            continue;
        };

        let mut task = Task::new(name, start, end.max(start));
        task.description = cell(Column::Description).to_string();
        task.color = IMPORT_PALETTE[rows.len() % IMPORT_PALETTE.len()];
        task.milestones = parse_milestones(cell(Column::Milestones));

        rows.push(Row {
            task,
            parent: Some(cell(Column::Parent))
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            level: cell(Column::Level).parse().ok(),
            is_milestone: is_truthy(cell(Column::IsMilestone)),
        });
    }

    if rows.is_empty() {
        return Err(ImportError::NoRows(skipped));
    }

    let forest = if has(Column::Level) && rows.iter().all(|r| r.level.is_some()) {
        Forest::from_levels(&fold_level_milestones(rows))
    } else {
        nest_by_parent_name(rows)
    };

    info!(tasks = forest.task_count(), skipped, "imported CSV");
    Ok((forest, skipped))
}

pub fn import_csv(path: &Path) -> Result<(Forest, usize), ImportError> {
    let content = std::fs::read_to_string(path)?;
    import_csv_str(&content)
}

/// A milestone row turned into a milestone, keeping the row's ID.
fn row_milestone(task: Task) -> Milestone {
    let mut milestone = Milestone::new(task.name, task.start_date);
    milestone.id = task.id;
    milestone
}

/// Pair rows with their levels, moving milestone rows onto the nearest
/// preceding row one level up. Top-level milestone rows stay tasks.
fn fold_level_milestones(rows: Vec<Row>) -> Vec<(Task, usize)> {
    let mut out: Vec<(Task, usize)> = Vec::with_capacity(rows.len());
    for row in rows {
        let level = row.level.unwrap_or(0);
        if row.is_milestone {
            if let Some((owner, _)) = out.iter_mut().rev().find(|(_, l)| *l < level) {
                owner.milestones.push(row_milestone(row.task));
                continue;
            }
        }
        out.push((row.task, level));
    }
    out
}

/// Build the forest from `parent` names. Unknown parents, self references
/// and parent loops leave the row at the root level.
fn nest_by_parent_name(rows: Vec<Row>) -> Forest {
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        by_name.entry(row.task.name.to_lowercase()).or_insert(i);
    }

    let mut parent: Vec<Option<usize>> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let name = row.parent.as_ref()?;
            match by_name.get(&name.to_lowercase()) {
                Some(&p) if p != i => Some(p),
                Some(_) => None,
                None => {
                    warn!(parent = %name, task = %row.task.name, "parent task not found");
                    None
                }
            }
        })
        .collect();

    for i in 0..rows.len() {
        let mut seen = vec![i];
        let mut cursor = parent[i];
        while let Some(p) = cursor {
            if p == i {
                parent[i] = None;
                break;
            }
            // a loop further up; its members are cut on their own turn
            if seen.contains(&p) {
                break;
            }
            seen.push(p);
            cursor = parent[p];
        }
    }

    let mut tasks: Vec<Option<Task>> = Vec::with_capacity(rows.len());
    let mut milestone_rows: Vec<(usize, Milestone)> = Vec::new();
    for (i, row) in rows.into_iter().enumerate() {
        match (row.is_milestone, parent[i]) {
            (true, Some(p)) => {
                milestone_rows.push((p, row_milestone(row.task)));
                tasks.push(None);
            }
            _ => tasks.push(Some(row.task)),
        }
    }
    for (p, milestone) in milestone_rows {
        if let Some(task) = tasks[p].as_mut() {
            task.milestones.push(milestone);
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    let mut roots = Vec::new();
    for i in 0..tasks.len() {
        if tasks[i].is_none() {
            continue;
        }
        match parent[i] {
            Some(p) if tasks[p].is_some() => children[p].push(i),
            _ => roots.push(i),
        }
    }

    fn build(i: usize, tasks: &mut [Option<Task>], children: &[Vec<usize>]) -> Option<Task> {
        let mut task = tasks[i].take()?;
        task.children = children[i]
            .iter()
            .filter_map(|&c| build(c, tasks, children))
            .map(Arc::new)
            .collect();
        Some(task)
    }

    Forest::new(
        roots
            .into_iter()
            .filter_map(|r| build(r, &mut tasks, &children))
            .collect(),
    )
}
