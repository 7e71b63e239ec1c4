//! Incremental task updates.
//!
//! Updates are a closed set of variants, each with its own field set, rather
//! than an open record spread onto a task.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CoreError, Task, TaskId, TaskStatus};

/// Generic field patch (progress ticks, status changes).
///
/// Provided fields override the task's values; `None` keeps the prior value.
/// `id`, `name`, `type` and `children` are not patchable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPatch {
    /// Target task. The backend sends either `taskId` or `id`.
    #[serde(alias = "id")]
    pub task_id: TaskId,

    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    /// Quality score in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Percent complete; fractional wire values are rounded.
    #[serde(
        default,
        deserialize_with = "crate::wire::opt_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress: Option<u8>,

    /// When the task started (ISO-8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// When the task finished (ISO-8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    /// Free-form result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Human-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressPatch {
    /// Empty patch for a task.
    pub fn new(task_id: impl Into<TaskId>) -> Self {
        Self {
            task_id: task_id.into(),
            status: None,
            score: None,
            progress: None,
            start_time: None,
            end_time: None,
            output: None,
            error: None,
        }
    }

    /// Builder method to set the status.
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Builder method to set progress; values above 100 are clamped.
    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    /// Builder method to set the score.
    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Builder method to set the start timestamp (ISO-8601).
    pub fn start_time(mut self, at: impl Into<String>) -> Self {
        self.start_time = Some(at.into());
        self
    }

    /// Builder method to set the end timestamp (ISO-8601).
    pub fn end_time(mut self, at: impl Into<String>) -> Self {
        self.end_time = Some(at.into());
        self
    }

    /// Builder method to set the result payload.
    pub fn output(mut self, output: impl Into<Value>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Builder method to set the failure reason.
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    fn merge_into(&self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(score) = self.score {
            task.score = Some(score);
        }
        if let Some(progress) = self.progress {
            task.progress = Some(progress);
        }
        if let Some(start) = &self.start_time {
            task.start_time = Some(start.clone());
        }
        if let Some(end) = &self.end_time {
            task.end_time = Some(end.clone());
        }
        if let Some(output) = &self.output {
            task.output = Some(output.clone());
        }
        if let Some(error) = &self.error {
            task.error = Some(error.clone());
        }
    }
}

/// Completion notice. Applying it always marks the task completed, sets
/// `endTime` to the moment the notice was received and copies `score` and
/// `output`; any other fields in the wire payload are ignored.
///
/// The receive time is stamped once, so applying the same notice twice
/// yields the same task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPatch {
    /// Target task, sent as `taskId` or `id`.
    #[serde(alias = "id")]
    pub task_id: TaskId,

    /// Final score; absent clears any earlier one.
    #[serde(default)]
    pub score: Option<f64>,

    /// Final result payload.
    #[serde(default)]
    pub output: Option<Value>,

    /// When the notice was received.
    #[serde(skip, default = "received_now")]
    pub received_at: String,
}

fn received_now() -> String {
    Utc::now().to_rfc3339()
}

impl CompletionPatch {
    /// Completion notice received now.
    pub fn new(task_id: impl Into<TaskId>, score: Option<f64>, output: Option<Value>) -> Self {
        Self {
            task_id: task_id.into(),
            score,
            output,
            received_at: received_now(),
        }
    }

    fn merge_into(&self, task: &mut Task) {
        task.status = TaskStatus::Completed;
        task.end_time = Some(self.received_at.clone());
        task.score = self.score;
        task.output = self.output.clone();
    }
}

/// An update addressed to a single task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    /// Merge the provided fields.
    Patch(ProgressPatch),
    /// Mark completed with score/output.
    Complete(CompletionPatch),
}

impl TaskUpdate {
    /// Id of the task this update targets.
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Patch(patch) => &patch.task_id,
            Self::Complete(patch) => &patch.task_id,
        }
    }

    /// Apply the update to a task in place.
    pub fn apply_to(&self, task: &mut Task) {
        match self {
            Self::Patch(patch) => patch.merge_into(task),
            Self::Complete(patch) => patch.merge_into(task),
        }
    }

    /// Decode a generic field patch from a JSON payload.
    pub fn patch_from_json(data: &str) -> Result<Self, CoreError> {
        let patch: ProgressPatch = serde_json::from_str(data)?;
        Self::checked(Self::Patch(patch))
    }

    /// Decode a completion notice from a JSON payload.
    pub fn completion_from_json(data: &str) -> Result<Self, CoreError> {
        let patch: CompletionPatch = serde_json::from_str(data)?;
        Self::checked(Self::Complete(patch))
    }

    fn checked(update: Self) -> Result<Self, CoreError> {
        if update.task_id().as_str().trim().is_empty() {
            return Err(CoreError::InvalidInput("update has an empty task id".into()));
        }
        Ok(update)
    }
}

impl From<ProgressPatch> for TaskUpdate {
    fn from(patch: ProgressPatch) -> Self {
        Self::Patch(patch)
    }
}

impl From<CompletionPatch> for TaskUpdate {
    fn from(patch: CompletionPatch) -> Self {
        Self::Complete(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_overrides_only_given_fields() {
        let mut task = Task::new("t", "T", "leaf").with_status(TaskStatus::Running);
        task.start_time = Some("2025-11-05T13:06:05".into());

        TaskUpdate::from(ProgressPatch::new("t").progress(40)).apply_to(&mut task);

        assert_eq!(task.progress, Some(40));
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.start_time.as_deref(), Some("2025-11-05T13:06:05"));
    }

    #[test]
    fn test_builder_sets_every_field() {
        let mut task = Task::new("t", "T", "leaf");
        TaskUpdate::from(
            ProgressPatch::new("t")
                .status(TaskStatus::Failed)
                .progress(140)
                .score(0.4)
                .start_time("2025-11-05T13:06:05")
                .end_time("2025-11-05T13:06:09")
                .output("partial")
                .error("timeout"),
        )
        .apply_to(&mut task);

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, Some(100));
        assert_eq!(task.score, Some(0.4));
        assert_eq!(task.end_time.as_deref(), Some("2025-11-05T13:06:09"));
        assert_eq!(task.output, Some(Value::String("partial".into())));
        assert_eq!(task.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_completion_ignores_other_wire_fields() {
        let update = TaskUpdate::completion_from_json(
            r#"{"taskId": "t", "status": "failed", "score": 0.7, "output": "done", "error": "x"}"#,
        )
        .unwrap();

        let mut task = Task::new("t", "T", "leaf");
        update.apply_to(&mut task);

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.score, Some(0.7));
        assert_eq!(task.output, Some(Value::String("done".into())));
        assert!(task.error.is_none());
        assert!(task.end_time.is_some());
    }

    #[test]
    fn test_completion_is_idempotent() {
        let update = TaskUpdate::from(CompletionPatch::new("t", Some(0.9), None));

        let mut once = Task::new("t", "T", "leaf").with_status(TaskStatus::Running);
        update.apply_to(&mut once);

        let mut twice = once.clone();
        update.apply_to(&mut twice);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_patch_accepts_id_alias() {
        let update = TaskUpdate::patch_from_json(
            r#"{"id": "task_1", "name": "TopicSentenceTask", "status": "running", "children": []}"#,
        )
        .unwrap();
        assert_eq!(update.task_id().as_str(), "task_1");
        match update {
            TaskUpdate::Patch(patch) => assert_eq!(patch.status, Some(TaskStatus::Running)),
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(matches!(
            TaskUpdate::patch_from_json("{not json"),
            Err(CoreError::Serialization(_))
        ));
        assert!(matches!(
            TaskUpdate::patch_from_json(r#"{"status": "running"}"#),
            Err(CoreError::Serialization(_))
        ));
        assert!(matches!(
            TaskUpdate::completion_from_json(r#"{"taskId": "  "}"#),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
