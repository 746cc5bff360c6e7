use std::io::Write;
use std::path::Path;

use crate::model::{Forest, Task};

use super::store::StoreError;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Milestones of a task as `Label (DD/MM/YYYY)` entries joined by `, `.
fn milestone_cell(task: &Task) -> String {
    task.milestones
        .iter()
        .map(|m| format!("{} ({})", m.label, m.date.format(DATE_FORMAT)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Write the forest as a semicolon-delimited sheet, one row per task in
/// display order. Returns the number of tasks written.
///
/// Columns: Level ; Task ; Start ; End ; Milestones
pub fn write_csv<W: Write>(forest: &Forest, writer: W) -> Result<usize, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(["Level", "Task", "Start", "End", "Milestones"])?;

    let rows = forest.flatten();
    for node in &rows {
        let task = node.task;
        wtr.write_record([
            node.level.to_string(),
            task.name.clone(),
            task.start_date.format(DATE_FORMAT).to_string(),
            task.end_date.format(DATE_FORMAT).to_string(),
            milestone_cell(task),
        ])?;
    }

    wtr.flush()?;
    Ok(rows.len())
}

/// Export the forest to a CSV file that `import_csv` reads back.
pub fn export_csv(forest: &Forest, path: &Path) -> Result<usize, StoreError> {
    let file = std::fs::File::create(path)?;
    let written = write_csv(forest, file)?;
    tracing::info!(path = %path.display(), rows = written, "exported CSV");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::tests::{d, node, task};
    use crate::model::Milestone;

    #[test]
    fn rows_follow_display_order_with_levels() {
        let mut leaf = task("b");
        leaf.milestones.push(Milestone::new("Ship", d(2026, 1, 9)));
        let forest = Forest::new(vec![node("a", vec![leaf])]);

        let mut out = Vec::new();
        assert_eq!(write_csv(&forest, &mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Level;Task;Start;End;Milestones");
        assert_eq!(lines[1], "0;A;01/01/2026;10/01/2026;");
        assert_eq!(lines[2], "1;B;01/01/2026;10/01/2026;Ship (09/01/2026)");
    }
}
