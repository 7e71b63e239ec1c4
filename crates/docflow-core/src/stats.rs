//! Aggregate statistics over a task forest.

use serde::{Deserialize, Serialize};

use crate::task::flatten;
use crate::{Task, TaskStatus, WorkflowState};

/// Seconds reported as remaining while anything is still pending or running.
///
/// Not computed from real durations.
pub const ESTIMATED_REMAINING_PLACEHOLDER_SECS: u64 = 120;

/// Counts and score summary over every node of a workflow forest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowStatistics {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub running: u32,
    pub pending: u32,
    /// Mean score of completed nodes that carry a score; 0 when none do.
    pub average_score: f64,
    /// Heuristic, non-authoritative.
    #[serde(deserialize_with = "crate::wire::seconds")]
    pub estimated_time_remaining: u64,
}

impl WorkflowStatistics {
    /// Fold over an already flattened sequence of tasks. Children of the
    /// yielded tasks are not visited.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = Self::default();
        let mut score_sum = 0.0;
        let mut score_count = 0u32;

        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Completed => {
                    stats.completed += 1;
                    if let Some(score) = task.score.filter(|s| s.is_finite()) {
                        score_sum += score;
                        score_count += 1;
                    }
                }
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Pending => stats.pending += 1,
            }
        }

        if score_count > 0 {
            stats.average_score = score_sum / f64::from(score_count);
        }
        stats.estimated_time_remaining = if stats.running > 0 || stats.pending > 0 {
            ESTIMATED_REMAINING_PLACEHOLDER_SECS
        } else {
            0
        };
        stats
    }

    /// Check if every node has finished (completed or failed).
    pub fn is_settled(&self) -> bool {
        self.running == 0 && self.pending == 0
    }
}

/// Compute statistics over every node of a forest, nested children included.
pub fn aggregate(forest: &[Task]) -> WorkflowStatistics {
    WorkflowStatistics::from_tasks(flatten(forest))
}

/// Overall progress in percent: completed nodes over all nodes (flattened).
pub fn overall_progress(stats: &WorkflowStatistics) -> u8 {
    if stats.total == 0 {
        return 0;
    }
    let pct = f64::from(stats.completed) / f64::from(stats.total) * 100.0;
    pct.round().clamp(0.0, 100.0) as u8
}

/// The backend's workflow-level rule: completed once every node completed,
/// failed if any node failed, running otherwise.
///
/// Only used when a caller asks for it; updates never rewrite a workflow's
/// status on their own.
pub fn derive_workflow_state(stats: &WorkflowStatistics) -> WorkflowState {
    if stats.total > 0 && stats.completed == stats.total {
        WorkflowState::Completed
    } else if stats.failed > 0 {
        WorkflowState::Failed
    } else {
        WorkflowState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deep_forest() -> Vec<Task> {
        vec![
            Task::new("a", "A", "s")
                .with_status(TaskStatus::Running)
                .with_child(
                    Task::new("a1", "A1", "s")
                        .with_status(TaskStatus::Completed)
                        .with_score(0.8)
                        .with_child(Task::new("a1x", "A1x", "s").with_status(TaskStatus::Failed)),
                )
                .with_child(
                    Task::new("a2", "A2", "s")
                        .with_status(TaskStatus::Completed)
                        .with_score(0.6),
                ),
            Task::new("b", "B", "s").with_status(TaskStatus::Completed),
        ]
    }

    #[test]
    fn test_total_counts_nested_nodes() {
        let stats = aggregate(&deep_forest());
        assert_eq!(stats.total, 5);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn test_average_ignores_unscored_completions() {
        let stats = aggregate(&deep_forest());
        assert!((stats.average_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_average_is_zero_without_scores() {
        let forest = vec![
            Task::new("a", "A", "s").with_status(TaskStatus::Completed),
            Task::new("b", "B", "s").with_status(TaskStatus::Running).with_score(0.9),
        ];
        assert_eq!(aggregate(&forest).average_score, 0.0);
        assert_eq!(aggregate(&[]).average_score, 0.0);
    }

    #[test]
    fn test_remaining_placeholder() {
        assert_eq!(
            aggregate(&deep_forest()).estimated_time_remaining,
            ESTIMATED_REMAINING_PLACEHOLDER_SECS
        );
        let done = vec![Task::new("a", "A", "s").with_status(TaskStatus::Completed)];
        assert_eq!(aggregate(&done).estimated_time_remaining, 0);
    }

    #[test]
    fn test_overall_progress_uses_flattened_total() {
        let stats = aggregate(&deep_forest());
        // 3 of 5 nodes, not 1 of 2 roots.
        assert_eq!(overall_progress(&stats), 60);
        assert_eq!(overall_progress(&WorkflowStatistics::default()), 0);
    }

    #[test]
    fn test_derive_workflow_state() {
        assert_eq!(derive_workflow_state(&aggregate(&deep_forest())), WorkflowState::Failed);
        let done = vec![Task::new("a", "A", "s").with_status(TaskStatus::Completed)];
        assert_eq!(derive_workflow_state(&aggregate(&done)), WorkflowState::Completed);
        assert_eq!(derive_workflow_state(&aggregate(&[])), WorkflowState::Running);
    }

    #[test]
    fn test_decodes_backend_statistics() {
        let stats: WorkflowStatistics = serde_json::from_str(
            r#"{"total": 4, "completed": 2, "failed": 0, "running": 1, "pending": 1,
                "averageScore": 0.75, "estimatedTimeRemaining": 0}"#,
        )
        .unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.estimated_time_remaining, 0);
    }
}
