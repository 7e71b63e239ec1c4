//! Task nodes and forest helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{TaskId, TaskStatus};

/// A Task is one node of the workflow forest.
///
/// `name` and `kind` are fixed at creation; everything else is filled in
/// by updates as the backend makes progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// Human readable label (usually the backend task class).
    #[serde(default)]
    pub name: String,

    /// Task category, e.g. `section_creation`.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Current task status.
    #[serde(default)]
    pub status: TaskStatus,

    /// Quality score in [0, 1], set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Progress in percent while running.
    #[serde(
        default,
        deserialize_with = "crate::wire::opt_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress: Option<u8>,

    /// ISO-8601 start timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// ISO-8601 end timestamp, set on terminal transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    /// Free-form result payload (string or structured record).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Failure reason, set when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Parent id as reported by the backend. Informational only; nesting
    /// is expressed by `children`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,

    /// Ordered child tasks. Empty means leaf.
    #[serde(default)]
    pub children: Vec<Task>,
}

impl Task {
    /// Create a new pending leaf task.
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            status: TaskStatus::Pending,
            score: None,
            progress: None,
            start_time: None,
            end_time: None,
            output: None,
            error: None,
            parent_id: None,
            children: Vec::new(),
        }
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder method to set the score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Builder method to append a child; the child's `parent_id` is set.
    pub fn with_child(mut self, mut child: Task) -> Self {
        child.parent_id = Some(self.id.clone());
        self.children.push(child);
        self
    }

    /// Check if the task has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Deep copy of a forest. Order, fields and nesting are preserved and the
/// result shares no node with the input.
pub fn clone_forest(forest: &[Task]) -> Vec<Task> {
    forest.to_vec()
}

/// Pre-order iterator over every node of a forest.
pub struct Flatten<'a> {
    stack: Vec<&'a Task>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = &'a Task;

    fn next(&mut self) -> Option<Self::Item> {
        let task = self.stack.pop()?;
        self.stack.extend(task.children.iter().rev());
        Some(task)
    }
}

/// Visit every node (roots and all descendants) in pre-order.
pub fn flatten(forest: &[Task]) -> Flatten<'_> {
    Flatten {
        stack: forest.iter().rev().collect(),
    }
}

/// First node in pre-order carrying `id`.
pub fn find<'a>(forest: &'a [Task], id: &TaskId) -> Option<&'a Task> {
    flatten(forest).find(|task| &task.id == id)
}

/// Mutable variant of [`find`].
pub fn find_mut<'a>(forest: &'a mut [Task], id: &TaskId) -> Option<&'a mut Task> {
    for task in forest.iter_mut() {
        if &task.id == id {
            return Some(task);
        }
        if let Some(found) = find_mut(&mut task.children, id) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Task> {
        vec![
            Task::new("a", "A", "section")
                .with_child(Task::new("a1", "A1", "sentence"))
                .with_child(
                    Task::new("a2", "A2", "sentence").with_child(Task::new("a2x", "A2x", "check")),
                ),
            Task::new("b", "B", "section"),
        ]
    }

    #[test]
    fn test_flatten_is_preorder() {
        let forest = sample();
        let ids: Vec<&str> = flatten(&forest).map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a1", "a2", "a2x", "b"]);
    }

    #[test]
    fn test_clone_forest_is_deep_and_unshared() {
        let forest = sample();
        let copy = clone_forest(&forest);
        assert_eq!(copy, forest);

        let originals: Vec<*const Task> = flatten(&forest).map(|t| t as *const Task).collect();
        for node in flatten(&copy) {
            assert!(!originals.contains(&(node as *const Task)));
        }
    }

    #[test]
    fn test_find_nested() {
        let forest = sample();
        let found = find(&forest, &TaskId::new("a2x")).unwrap();
        assert_eq!(found.name, "A2x");
        assert_eq!(found.parent_id, Some(TaskId::new("a2")));
        assert!(find(&forest, &TaskId::new("zzz")).is_none());
    }

    #[test]
    fn test_deserialize_backend_task() {
        let json = r#"{
            "id": "task_world_vision",
            "name": "CreateWorldVisionSectionTask",
            "type": "section_creation",
            "status": "running",
            "startTime": "2025-11-05T13:06:05",
            "children": [
                {"id": "task_1", "name": "TopicSentenceTask", "type": "topicsentence",
                 "status": "completed", "score": 0.8, "output": "The urgent need...",
                 "endTime": "2025-11-05 13:06:56", "parentId": "task_world_vision"}
            ]
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.kind, "section_creation");
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.children.len(), 1);
        assert_eq!(task.children[0].score, Some(0.8));
        assert_eq!(
            task.children[0].output,
            Some(Value::String("The urgent need...".into()))
        );
    }

    #[test]
    fn test_missing_children_means_leaf() {
        let task: Task = serde_json::from_str(r#"{"id": "x", "progress": 42.6}"#).unwrap();
        assert!(task.is_leaf());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, Some(43));
    }
}
