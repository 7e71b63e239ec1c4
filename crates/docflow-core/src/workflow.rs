//! Workflow aggregate and the tracker that applies updates to it.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::stats::{overall_progress, WorkflowStatistics};
use crate::{JobId, JobStatus, Task, TaskTree, TaskUpdate, WorkflowId, WorkflowState};

/// Root aggregate: a job's task forest plus derived statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub workflow_id: WorkflowId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,

    /// Reported by the backend; independent of task statuses.
    #[serde(default)]
    pub status: WorkflowState,

    #[serde(default, deserialize_with = "crate::wire::percent")]
    pub overall_progress: u8,

    /// Task forest. Serialized as nested `children` arrays.
    #[serde(default)]
    pub tasks: TaskTree,

    #[serde(default)]
    pub statistics: WorkflowStatistics,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub updated_at: String,
}

impl WorkflowStatus {
    /// A freshly accepted workflow with no tasks yet.
    pub fn new(workflow_id: WorkflowId, job_id: Option<JobId>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            workflow_id,
            job_id,
            status: WorkflowState::Running,
            overall_progress: 0,
            tasks: TaskTree::new(),
            statistics: WorkflowStatistics::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Builder method to set the task forest; aggregates are recomputed.
    pub fn with_tasks(mut self, forest: &[Task]) -> Self {
        self.tasks = TaskTree::from_forest(forest);
        self.refresh_aggregates();
        self
    }

    /// Nested copy of the task forest.
    pub fn forest(&self) -> Vec<Task> {
        self.tasks.to_forest()
    }

    /// Merge a task update, then recompute statistics and progress.
    ///
    /// Returns `false` when the update targets an unknown task; nothing
    /// changes in that case, not even `updated_at`.
    pub fn apply_task_update(&mut self, update: &TaskUpdate) -> bool {
        if !self.tasks.apply(update) {
            return false;
        }
        self.refresh_aggregates();
        true
    }

    /// Recompute statistics and overall progress from the forest.
    pub fn refresh_aggregates(&mut self) {
        self.statistics = self.tasks.statistics();
        self.overall_progress = overall_progress(&self.statistics);
        self.updated_at = Utc::now().to_rfc3339();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Anything a status source can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// Incremental change to one task.
    Task(TaskUpdate),
    /// Whole-workflow replacement (full refetch or scripted snapshot).
    Workflow(Box<WorkflowStatus>),
    /// Document job status.
    Job(JobStatus),
}

impl StatusUpdate {
    /// Whether this update reports a terminal workflow or job.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Task(_) => false,
            Self::Workflow(workflow) => workflow.is_terminal(),
            Self::Job(job) => job.is_terminal(),
        }
    }
}

impl From<TaskUpdate> for StatusUpdate {
    fn from(update: TaskUpdate) -> Self {
        Self::Task(update)
    }
}

impl From<WorkflowStatus> for StatusUpdate {
    fn from(workflow: WorkflowStatus) -> Self {
        Self::Workflow(Box::new(workflow))
    }
}

impl From<JobStatus> for StatusUpdate {
    fn from(job: JobStatus) -> Self {
        Self::Job(job)
    }
}

/// View-owned state: the current workflow and job, updated strictly in the
/// order updates are applied.
#[derive(Debug, Default)]
pub struct WorkflowTracker {
    workflow: Option<WorkflowStatus>,
    job: Option<JobStatus>,
    applied: u64,
}

impl WorkflowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one update. Returns whether the visible state changed.
    ///
    /// Task updates arriving before any workflow is known are dropped.
    pub fn apply(&mut self, update: StatusUpdate) -> bool {
        let changed = match update {
            StatusUpdate::Task(task_update) => match self.workflow.as_mut() {
                Some(workflow) => workflow.apply_task_update(&task_update),
                None => false,
            },
            StatusUpdate::Workflow(workflow) => {
                self.workflow = Some(*workflow);
                true
            }
            StatusUpdate::Job(job) => {
                self.job = Some(job);
                true
            }
        };
        if changed {
            self.applied += 1;
        }
        changed
    }

    /// Discard all state (view reset or a new job started).
    pub fn reset(&mut self) {
        self.workflow = None;
        self.job = None;
    }

    pub fn workflow(&self) -> Option<&WorkflowStatus> {
        self.workflow.as_ref()
    }

    pub fn job(&self) -> Option<&JobStatus> {
        self.job.as_ref()
    }

    /// Number of updates that changed state since creation.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// True once the tracked workflow or job reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.workflow.as_ref().is_some_and(WorkflowStatus::is_terminal)
            || self.job.as_ref().is_some_and(JobStatus::is_terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompletionPatch, ProgressPatch, TaskStatus};

    fn workflow() -> WorkflowStatus {
        WorkflowStatus::new(WorkflowId::new("workflow_1"), Some(JobId::new("job_1"))).with_tasks(&[
            Task::new("root", "Root", "section")
                .with_child(Task::new("c1", "C1", "sentence"))
                .with_child(Task::new("c2", "C2", "sentence")),
        ])
    }

    #[test]
    fn test_task_update_recomputes_aggregates() {
        let mut wf = workflow();
        assert_eq!(wf.statistics.pending, 3);

        assert!(wf.apply_task_update(&CompletionPatch::new("c1", Some(0.9), None).into()));
        assert_eq!(wf.statistics.completed, 1);
        assert_eq!(wf.overall_progress, 33);
        // Parent status is left to the backend.
        assert_eq!(wf.forest()[0].status, TaskStatus::Pending);
        assert_eq!(wf.status, WorkflowState::Running);
    }

    #[test]
    fn test_unknown_task_changes_nothing() {
        let mut wf = workflow();
        let before = wf.clone();
        assert!(!wf.apply_task_update(&ProgressPatch::new("zzz").progress(5).into()));
        assert_eq!(wf, before);
    }

    #[test]
    fn test_tracker_drops_task_updates_without_workflow() {
        let mut tracker = WorkflowTracker::new();
        let update = TaskUpdate::from(ProgressPatch::new("root").status(TaskStatus::Running));
        assert!(!tracker.apply(update.clone().into()));

        tracker.apply(workflow().into());
        assert!(tracker.apply(update.into()));
        assert_eq!(tracker.workflow().unwrap().statistics.running, 1);
        assert_eq!(tracker.applied(), 2);
    }

    #[test]
    fn test_full_replace_wins_over_patches() {
        let mut tracker = WorkflowTracker::new();
        tracker.apply(workflow().into());
        tracker.apply(TaskUpdate::from(ProgressPatch::new("c2").progress(80)).into());

        let mut replacement = workflow();
        replacement.status = WorkflowState::Completed;
        tracker.apply(replacement.clone().into());

        assert_eq!(tracker.workflow(), Some(&replacement));
        assert!(tracker.is_terminal());

        tracker.reset();
        assert!(tracker.workflow().is_none());
        assert!(!tracker.is_terminal());
    }

    #[test]
    fn test_decode_backend_workflow() {
        let json = r#"{
            "workflowId": "workflow_abc123def456",
            "jobId": "job_1730800000000",
            "status": "running",
            "overallProgress": 66.66666666666667,
            "tasks": [{
                "id": "task_world_vision", "name": "CreateWorldVisionSectionTask",
                "type": "section_creation", "status": "running",
                "children": [
                    {"id": "task_a", "name": "TopicSentenceTask", "type": "topicsentence",
                     "status": "completed", "score": 0.8, "parentId": "task_world_vision"},
                    {"id": "task_b", "name": "SupportingSentenceTask", "type": "supportingsentence",
                     "status": "completed", "score": 0.7, "parentId": "task_world_vision"}
                ]
            }],
            "statistics": {"total": 3, "completed": 2, "failed": 0, "running": 1,
                           "pending": 0, "averageScore": 0.75, "estimatedTimeRemaining": 0},
            "createdAt": "2025-11-05T13:06:00.000000",
            "updatedAt": "2025-11-05T13:07:43.000000"
        }"#;
        let wf: WorkflowStatus = serde_json::from_str(json).unwrap();
        assert_eq!(wf.overall_progress, 67);
        assert_eq!(wf.tasks.len(), 3);
        assert_eq!(wf.statistics.completed, 2);
        assert!(!wf.is_terminal());
    }
}
