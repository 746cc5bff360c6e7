//! Upgrade raw task JSON from older files before typed decoding.
//!
//! Older files may lack `timeRanges`, `dependencies`, `milestones`,
//! `divider` or `children`, and very old ones name the span `start`/`end`.
//! Dates are never changed.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::model::task::new_id;

use super::envelope::ImportError;

/// Migrate a JSON array of root tasks in place of the input value.
pub fn migrate_tasks(data: Value) -> Result<Value, ImportError> {
    let Value::Array(tasks) = data else {
        return Err(ImportError::UnknownShape);
    };
    let mut upgraded = 0usize;
    let tasks = tasks
        .into_iter()
        .map(|t| migrate_task(t, &mut upgraded))
        .collect::<Result<Vec<_>, _>>()?;
    if upgraded > 0 {
        debug!(upgraded, "migrated legacy task records");
    }
    Ok(Value::Array(tasks))
}

fn migrate_task(value: Value, upgraded: &mut usize) -> Result<Value, ImportError> {
    let Value::Object(mut task) = value else {
        return Err(ImportError::UnknownShape);
    };
    let mut touched = false;

    for (old, new) in [("start", "startDate"), ("end", "endDate")] {
        if !task.contains_key(new) {
            if let Some(v) = task.remove(old) {
                task.insert(new.to_string(), v);
                touched = true;
            }
        }
    }
    touched |= fill(&mut task, "id", || Value::String(new_id()));
    touched |= fill(&mut task, "timeRanges", || json!([]));
    touched |= fill(&mut task, "dependencies", || json!([]));
    touched |= fill(&mut task, "milestones", || json!([]));
    touched |= fill(&mut task, "children", || json!([]));
    touched |= fill(&mut task, "divider", || json!({ "enabled": false }));

    for key in ["timeRanges", "milestones"] {
        if let Some(Value::Array(items)) = task.get_mut(key) {
            for item in items.iter_mut().filter_map(Value::as_object_mut) {
                touched |= fill(item, "id", || Value::String(new_id()));
                touched |= fill(item, "dependencies", || json!([]));
            }
        }
    }

    if let Some(children) = task.remove("children") {
        let Value::Array(children) = children else {
            return Err(ImportError::UnknownShape);
        };
        let children = children
            .into_iter()
            .map(|c| migrate_task(c, upgraded))
            .collect::<Result<Vec<_>, _>>()?;
        task.insert("children".into(), Value::Array(children));
    }

    if touched {
        *upgraded += 1;
    }
    Ok(Value::Object(task))
}

/// Insert `key` if absent or null. Returns true if it did.
fn fill(object: &mut Map<String, Value>, key: &str, default: impl FnOnce() -> Value) -> bool {
    match object.get(key) {
        Some(v) if !v.is_null() => false,
        _ => {
            object.insert(key.to_string(), default());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fills_missing_collections_without_touching_dates() {
        let raw = json!([{
            "id": "a",
            "name": "A",
            "startDate": "2024-03-01",
            "endDate": "2024-03-05",
            "children": [{ "id": "b", "name": "B", "start": "2024-03-02", "end": "2024-03-03" }]
        }]);
        let migrated = migrate_tasks(raw).unwrap();
        let a = &migrated[0];
        assert_eq!(a["startDate"], "2024-03-01");
        assert_eq!(a["timeRanges"], json!([]));
        assert_eq!(a["divider"]["enabled"], false);
        let b = &a["children"][0];
        assert_eq!(b["startDate"], "2024-03-02");
        assert_eq!(b["endDate"], "2024-03-03");
        assert!(b.get("start").is_none());
        assert_eq!(b["milestones"], json!([]));
    }

    #[test]
    fn gives_ids_to_nested_entities() {
        let raw = json!([{
            "id": "a", "name": "A", "startDate": "2024-03-01", "endDate": "2024-03-05",
            "milestones": [{ "date": "2024-03-04", "label": "M" }],
            "dependencies": null
        }]);
        let migrated = migrate_tasks(raw).unwrap();
        assert!(migrated[0]["milestones"][0]["id"].is_string());
        assert_eq!(migrated[0]["milestones"][0]["dependencies"], json!([]));
        assert_eq!(migrated[0]["dependencies"], json!([]));
    }

    #[test]
    fn rejects_non_task_shapes() {
        assert!(matches!(migrate_tasks(json!({"a": 1})), Err(ImportError::UnknownShape)));
        assert!(matches!(migrate_tasks(json!([1, 2])), Err(ImportError::UnknownShape)));
    }
}
