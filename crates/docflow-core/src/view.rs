//! Display derivations for a task forest.

use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::task::flatten;
use crate::{Task, TaskId, TaskStatus};

/// All nodes (flattened, pre-order) with the given status.
pub fn filter_by_status(forest: &[Task], status: TaskStatus) -> Vec<&Task> {
    flatten(forest).filter(|task| task.status == status).collect()
}

/// Ids of nodes currently running; these are expanded by default.
pub fn running_ids(forest: &[Task]) -> HashSet<TaskId> {
    flatten(forest)
        .filter(|task| task.status == TaskStatus::Running)
        .map(|task| task.id.clone())
        .collect()
}

/// Format a duration in seconds as `"Ns"` or `"Mm Ss"`.
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else {
        format!("{}m {}s", seconds / 60, seconds % 60)
    }
}

/// Format an ISO-8601 timestamp as local `HH:MM:SS`.
///
/// Timestamps without an offset are taken as local time. Anything that does
/// not parse is returned as given.
pub fn format_time(iso: &str) -> String {
    const FORMAT: &str = "%H:%M:%S";

    if let Ok(at) = DateTime::parse_from_rfc3339(iso) {
        return at.with_timezone(&Local).format(FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(iso, pattern) {
            if let Some(local) = Local.from_local_datetime(&naive).earliest() {
                return local.format(FORMAT).to_string();
            }
        }
    }
    iso.to_string()
}

/// Single-character marker for a status.
pub fn status_icon(status: TaskStatus) -> char {
    match status {
        TaskStatus::Pending => '○',
        TaskStatus::Running => '◐',
        TaskStatus::Completed => '●',
        TaskStatus::Failed => '✗',
    }
}

/// Two-decimal score, or `-` when absent.
pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(score) => format!("{:.2}", score),
        None => "-".to_string(),
    }
}
