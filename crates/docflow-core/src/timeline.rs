//! Scripted workflow timelines for demos and view testing.
//!
//! A timeline is an ordered list of whole-workflow snapshots, each with the
//! delay that separates it from the previous one.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    CompletionPatch, JobId, ProgressPatch, Task, TaskStatus, TaskUpdate, WorkflowId,
    WorkflowState, WorkflowStatus,
};

/// One scripted step: wait `delay` after the previous step, then replace the
/// workflow with `snapshot`. The first step's delay is not waited for.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineStep {
    pub delay: Duration,
    pub snapshot: WorkflowStatus,
}

const SECTION_ID: &str = "task_world_vision";

/// Leaf tasks of the demo section with the score each one finishes with.
const SENTENCES: [(&str, &str, &str, f64); 4] = [
    (
        "task_topic_determination",
        "WorldVisionTopicDeterminationTask",
        "topic_determination",
        1.0,
    ),
    ("task_topic_sentence", "TopicSentenceTask", "topic_sentence", 0.8),
    (
        "task_supporting_sentence",
        "SupportingSentenceTask",
        "supporting_sentence",
        0.7,
    ),
    (
        "task_concluding_sentence",
        "ConcludingSentenceTask",
        "concluding_sentence",
        0.9,
    ),
];

const OUTPUTS: [&str; 4] = [
    "Keys: ['primary_trend', 'supporting_evidence']",
    "The urgent need for sustainable data storage is reshaping infrastructure.",
    "As the reliance on cloud services grows, energy demand follows.",
    "Sustainable storage is no longer optional for the industry.",
];

fn initial_forest() -> Vec<Task> {
    let mut section = Task::new(SECTION_ID, "CreateWorldVisionSectionTask", "section_creation");
    for (id, name, kind, _) in SENTENCES {
        section = section.with_child(Task::new(id, name, kind));
    }
    vec![section]
}

/// Demo timeline: one section task whose sentence subtasks run one after the
/// other, each ticking progress before completing with a score.
pub fn demo_timeline(step_delay: Duration) -> Vec<TimelineStep> {
    demo_timeline_from(Utc::now(), step_delay)
}

/// [`demo_timeline`] with a fixed start instant.
pub fn demo_timeline_from(start: DateTime<Utc>, step_delay: Duration) -> Vec<TimelineStep> {
    let mut builder = TimelineBuilder::new(start);
    builder.snapshot();

    builder.advance(step_delay);
    builder.update(
        ProgressPatch::new(SECTION_ID)
            .status(TaskStatus::Running)
            .start_time(builder.clock())
            .into(),
    );
    builder.snapshot();

    for (i, (id, _, _, score)) in SENTENCES.iter().enumerate() {
        builder.advance(step_delay);
        builder.update(
            ProgressPatch::new(*id)
                .status(TaskStatus::Running)
                .progress(0)
                .start_time(builder.clock())
                .into(),
        );
        builder.snapshot();

        builder.advance(step_delay);
        builder.update(ProgressPatch::new(*id).progress(50).into());
        builder.snapshot();

        builder.advance(step_delay);
        let mut done = CompletionPatch::new(*id, Some(*score), Some(OUTPUTS[i].into()));
        done.received_at = builder.clock();
        builder.update(done.into());
        builder.snapshot();
    }

    builder.advance(step_delay);
    builder.update(
        ProgressPatch::new(SECTION_ID)
            .status(TaskStatus::Completed)
            .end_time(builder.clock())
            .into(),
    );
    builder.current.status = WorkflowState::Completed;
    builder.snapshot();

    builder.steps
}

struct TimelineBuilder {
    current: WorkflowStatus,
    start: DateTime<Utc>,
    elapsed: Duration,
    pending_delay: Duration,
    steps: Vec<TimelineStep>,
}

impl TimelineBuilder {
    fn new(start: DateTime<Utc>) -> Self {
        let mut current = WorkflowStatus::new(
            WorkflowId::new("workflow_demo"),
            Some(JobId::new("job_demo")),
        )
        .with_tasks(&initial_forest());
        current.created_at = start.to_rfc3339();
        Self {
            current,
            start,
            elapsed: Duration::ZERO,
            pending_delay: Duration::ZERO,
            steps: Vec::new(),
        }
    }

    /// Scripted wall-clock time of the step being built.
    fn clock(&self) -> String {
        let offset = chrono::Duration::from_std(self.elapsed).unwrap_or_default();
        (self.start + offset).to_rfc3339()
    }

    fn advance(&mut self, delay: Duration) {
        self.elapsed += delay;
        self.pending_delay += delay;
    }

    fn update(&mut self, update: TaskUpdate) {
        self.current.apply_task_update(&update);
    }

    fn snapshot(&mut self) {
        let mut snapshot = self.current.clone();
        snapshot.updated_at = self.clock();
        self.steps.push(TimelineStep {
            delay: std::mem::take(&mut self.pending_delay),
            snapshot,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> Vec<TimelineStep> {
        demo_timeline(Duration::from_millis(500))
    }

    #[test]
    fn test_starts_pending_and_ends_completed() {
        let steps = timeline();
        let first = &steps[0].snapshot;
        assert_eq!(first.statistics.pending, 5);
        assert_eq!(first.overall_progress, 0);
        assert_eq!(steps[0].delay, Duration::ZERO);

        let last = &steps.last().unwrap().snapshot;
        assert_eq!(last.status, WorkflowState::Completed);
        assert_eq!(last.statistics.completed, 5);
        assert_eq!(last.overall_progress, 100);
        assert!((last.statistics.average_score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_progress_never_decreases() {
        let steps = timeline();
        for pair in steps.windows(2) {
            assert!(pair[1].snapshot.overall_progress >= pair[0].snapshot.overall_progress);
            assert_eq!(pair[1].delay, Duration::from_millis(500));
        }
    }

    #[test]
    fn test_only_last_step_is_terminal() {
        let steps = timeline();
        let terminal: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.snapshot.is_terminal())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(terminal, vec![steps.len() - 1]);
    }
}
