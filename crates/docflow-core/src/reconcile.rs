//! Pure reconciliation over nested forests.
//!
//! [`reconcile`] is the value-level form of [`TaskTree::apply`](crate::TaskTree::apply):
//! it never mutates its input and returns a new forest. Aggregates are not
//! touched here; callers recompute statistics from the result.

use crate::task::{clone_forest, find_mut};
use crate::{Task, TaskUpdate};

/// Merge `update` into the first node (pre-order) whose id matches.
///
/// An unknown id returns an unchanged copy of the forest.
pub fn reconcile(forest: &[Task], update: &TaskUpdate) -> Vec<Task> {
    let mut next = clone_forest(forest);
    if let Some(task) = find_mut(&mut next, update.task_id()) {
        update.apply_to(task);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::flatten;
    use crate::{aggregate, CompletionPatch, ProgressPatch, TaskId, TaskStatus};

    fn two_children() -> Vec<Task> {
        vec![Task::new("root", "Root", "section")
            .with_child(Task::new("child-1", "Child 1", "sentence"))
            .with_child(Task::new("child-2", "Child 2", "sentence"))]
    }

    #[test]
    fn test_unknown_id_leaves_forest_unchanged() {
        let forest = two_children();
        let update = TaskUpdate::from(ProgressPatch::new("missing").status(TaskStatus::Failed));
        assert_eq!(reconcile(&forest, &update), forest);
    }

    #[test]
    fn test_only_matching_node_changes() {
        let forest = two_children();
        let update = TaskUpdate::from(ProgressPatch::new("child-2").progress(55).status(TaskStatus::Running));
        let next = reconcile(&forest, &update);

        for (before, after) in flatten(&forest).zip(flatten(&next)) {
            if before.id.as_str() == "child-2" {
                let mut expected = before.clone();
                expected.progress = Some(55);
                expected.status = TaskStatus::Running;
                assert_eq!(after, &expected);
            } else if before.id.as_str() == "child-1" {
                assert_eq!(after, before);
            } else {
                // The root differs only through its child.
                assert_eq!(after.name, before.name);
                assert_eq!(after.status, before.status);
                assert_eq!(after.children[0], before.children[0]);
            }
        }
    }

    #[test]
    fn test_scenario_a_root_starts_running() {
        let forest = vec![Task::new("root", "Root", "section")];
        let next = reconcile(
            &forest,
            &ProgressPatch::new("root").status(TaskStatus::Running).into(),
        );
        let stats = aggregate(&next);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn test_scenario_b_child_completion() {
        let forest = two_children();
        let next = reconcile(
            &forest,
            &CompletionPatch::new("child-1", Some(0.9), None).into(),
        );
        let stats = aggregate(&next);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.total, 3);
        assert!((stats.average_score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scenario_c_completion_for_absent_task() {
        let forest = two_children();
        let update = TaskUpdate::from(CompletionPatch::new("ghost", Some(1.0), None));
        let next = reconcile(&forest, &update);
        assert_eq!(next, forest);
    }

    #[test]
    fn test_completion_twice_equals_once() {
        let forest = two_children();
        let update = TaskUpdate::from(CompletionPatch::new(TaskId::new("child-2"), Some(0.5), None));
        let once = reconcile(&forest, &update);
        let twice = reconcile(&once, &update);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let forest = two_children();
        let snapshot = forest.clone();
        let _ = reconcile(&forest, &ProgressPatch::new("root").status(TaskStatus::Running).into());
        assert_eq!(forest, snapshot);
    }
}
