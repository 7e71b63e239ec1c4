//! Scripted source: replay a timeline of workflow snapshots.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use docflow_core::TimelineStep;

use super::{StatusSource, UpdateSink};

/// Lifecycle of a [`ScriptedSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Replaying,
    /// Every step was delivered.
    Finished,
    Stopped,
}

/// Delivers each step's snapshot as a whole-workflow replacement.
///
/// The first snapshot is delivered from `start` itself; later ones are
/// scheduled against the start instant so delays do not drift. The sink is
/// closed after the last step.
pub struct ScriptedSource {
    steps: Arc<[TimelineStep]>,
    state: Arc<watch::Sender<ReplayState>>,
    cancel: Option<CancellationToken>,
    sink: Option<UpdateSink>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<TimelineStep>) -> Self {
        let (state, _) = watch::channel(ReplayState::Idle);
        Self {
            steps: steps.into(),
            state: Arc::new(state),
            cancel: None,
            sink: None,
            handle: None,
        }
    }

    pub fn state(&self) -> ReplayState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ReplayState> {
        self.state.subscribe()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl StatusSource for ScriptedSource {
    /// Must be called from within a Tokio runtime.
    fn start(&mut self, sink: UpdateSink) {
        if self.state() == ReplayState::Replaying {
            return;
        }
        info!(steps = self.steps.len(), "Replaying scripted timeline");

        let Some(first) = self.steps.first() else {
            self.state.send_replace(ReplayState::Finished);
            return;
        };
        let started = Instant::now();
        self.state.send_replace(ReplayState::Replaying);
        sink.deliver(first.snapshot.clone().into());

        let cancel = CancellationToken::new();
        let steps = Arc::clone(&self.steps);
        let state = Arc::clone(&self.state);
        let task_sink = sink.clone();
        let task_cancel = cancel.clone();

        self.handle = Some(tokio::spawn(async move {
            let mut due = started;
            for (index, step) in steps.iter().enumerate().skip(1) {
                due += step.delay;
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => return,
                    _ = tokio::time::sleep_until(due) => {}
                }
                debug!(step = index, "Delivering scripted snapshot");
                if !task_sink.deliver(step.snapshot.clone().into()) {
                    return;
                }
            }
            task_sink.close();
            state.send_replace(ReplayState::Finished);
        }));
        self.cancel = Some(cancel);
        self.sink = Some(sink);
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(sink) = self.sink.take() {
            sink.close();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        if self.state() != ReplayState::Finished {
            self.state.send_replace(ReplayState::Stopped);
        }
    }

    fn describe(&self) -> String {
        format!("scripted timeline ({} steps)", self.steps.len())
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::{demo_timeline, StatusUpdate, WorkflowState, WorkflowTracker};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_first_snapshot_is_delivered_synchronously() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = ScriptedSource::new(demo_timeline(Duration::from_secs(60)));
        source.start(UpdateSink::channel(tx));

        assert_eq!(source.state(), ReplayState::Replaying);
        assert!(matches!(rx.try_recv(), Ok(StatusUpdate::Workflow(_))));
        assert!(rx.try_recv().is_err());

        source.stop();
        assert_eq!(source.state(), ReplayState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replays_every_step_in_order() {
        let steps = demo_timeline(Duration::from_millis(500));
        let expected: Vec<_> = steps.iter().map(|s| s.snapshot.clone()).collect();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = ScriptedSource::new(steps);
        let mut states = source.subscribe();
        source.start(UpdateSink::channel(tx));

        states
            .wait_for(|s| *s == ReplayState::Finished)
            .await
            .unwrap();

        let mut tracker = WorkflowTracker::new();
        for snapshot in expected {
            match rx.try_recv() {
                Ok(StatusUpdate::Workflow(delivered)) => assert_eq!(*delivered, snapshot),
                other => panic!("unexpected update: {:?}", other),
            }
            tracker.apply(snapshot.into());
        }
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        let workflow = tracker.workflow().unwrap();
        assert_eq!(workflow.status, WorkflowState::Completed);
        assert_eq!(workflow.overall_progress, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_wait_for_their_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = ScriptedSource::new(demo_timeline(Duration::from_secs(1)));
        source.start(UpdateSink::channel(tx));
        assert!(rx.try_recv().is_ok());

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_snapshots_after_stop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = ScriptedSource::new(demo_timeline(Duration::from_millis(100)));
        source.start(UpdateSink::channel(tx));

        tokio::time::sleep(Duration::from_millis(250)).await;
        source.stop();
        let delivered = std::iter::from_fn(|| rx.try_recv().ok()).count();
        assert_eq!(delivered, 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(source.state(), ReplayState::Stopped);
    }

    #[tokio::test]
    async fn test_empty_timeline_finishes_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = ScriptedSource::new(Vec::new());
        source.start(UpdateSink::channel(tx));
        assert_eq!(source.state(), ReplayState::Finished);
        assert!(rx.try_recv().is_err());
    }
}
