//! Polling source: refetch a status on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use docflow_core::{JobId, StatusUpdate, WorkflowId};

use super::{StatusSource, UpdateSink};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::HttpClient;

/// One fetch of the current status.
#[async_trait]
pub trait StatusFetcher: Send + Sync + 'static {
    async fn fetch(&self) -> Result<StatusUpdate, ClientError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Fetches the full workflow snapshot.
#[derive(Debug, Clone)]
pub struct WorkflowFetcher {
    client: HttpClient,
    workflow_id: WorkflowId,
}

impl WorkflowFetcher {
    pub fn new(client: HttpClient, workflow_id: WorkflowId) -> Self {
        Self {
            client,
            workflow_id,
        }
    }
}

#[async_trait]
impl StatusFetcher for WorkflowFetcher {
    async fn fetch(&self) -> Result<StatusUpdate, ClientError> {
        let workflow = self.client.workflow_tasks(&self.workflow_id).await?;
        Ok(workflow.into())
    }

    fn describe(&self) -> String {
        format!("workflow {}", self.workflow_id)
    }
}

/// Fetches a document job's status.
#[derive(Debug, Clone)]
pub struct JobFetcher {
    client: HttpClient,
    job_id: JobId,
}

impl JobFetcher {
    pub fn new(client: HttpClient, job_id: JobId) -> Self {
        Self { client, job_id }
    }
}

#[async_trait]
impl StatusFetcher for JobFetcher {
    async fn fetch(&self) -> Result<StatusUpdate, ClientError> {
        let job = self.client.job_status(&self.job_id).await?;
        Ok(job.into())
    }

    fn describe(&self) -> String {
        format!("job {}", self.job_id)
    }
}

/// Why a poll loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollExit {
    /// A terminal status was delivered.
    Terminal,
    Cancelled,
    /// The sink was closed under us.
    SinkClosed,
}

/// Fetch immediately, then once per `period`, until cancelled or a terminal
/// status has been delivered. Fetch failures are logged and retried on the
/// next tick.
pub(crate) async fn poll_loop(
    fetcher: &dyn StatusFetcher,
    period: Duration,
    sink: &UpdateSink,
    cancel: &CancellationToken,
) -> PollExit {
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollExit::Cancelled,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollExit::Cancelled,
            result = fetcher.fetch() => result,
        };

        match result {
            Ok(update) => {
                let terminal = update.is_terminal();
                if !sink.deliver(update) {
                    return PollExit::SinkClosed;
                }
                if terminal {
                    debug!(source = %fetcher.describe(), "Terminal status received, polling done");
                    return PollExit::Terminal;
                }
            }
            Err(e) => {
                warn!(source = %fetcher.describe(), error = %e, "Status fetch failed, retrying next tick");
            }
        }
    }
}

/// Lifecycle of a [`PollingSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Stopped,
}

/// Delivers a fresh status every interval until the status is terminal,
/// then closes the sink.
pub struct PollingSource {
    fetcher: Arc<dyn StatusFetcher>,
    interval: Duration,
    state: Arc<watch::Sender<PollState>>,
    cancel: Option<CancellationToken>,
    sink: Option<UpdateSink>,
    handle: Option<JoinHandle<()>>,
}

impl PollingSource {
    pub fn new(fetcher: impl StatusFetcher, interval: Duration) -> Self {
        let (state, _) = watch::channel(PollState::Idle);
        Self {
            fetcher: Arc::new(fetcher),
            interval,
            state: Arc::new(state),
            cancel: None,
            sink: None,
            handle: None,
        }
    }

    /// Poll a workflow snapshot at the configured interval.
    pub fn workflow(client: HttpClient, workflow_id: WorkflowId, config: &ClientConfig) -> Self {
        Self::new(WorkflowFetcher::new(client, workflow_id), config.poll_interval)
    }

    /// Poll a job status at the configured interval.
    pub fn job(client: HttpClient, job_id: JobId, config: &ClientConfig) -> Self {
        Self::new(JobFetcher::new(client, job_id), config.poll_interval)
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }
}

impl StatusSource for PollingSource {
    /// Must be called from within a Tokio runtime.
    fn start(&mut self, sink: UpdateSink) {
        if self.state() == PollState::Polling {
            return;
        }
        info!(source = %self.fetcher.describe(), interval_ms = self.interval.as_millis() as u64, "Starting polling");

        let cancel = CancellationToken::new();
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let interval = self.interval;
        let task_sink = sink.clone();
        let task_cancel = cancel.clone();

        state.send_replace(PollState::Polling);
        self.handle = Some(tokio::spawn(async move {
            poll_loop(fetcher.as_ref(), interval, &task_sink, &task_cancel).await;
            task_sink.close();
            state.send_replace(PollState::Stopped);
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
        self.state.send_replace(PollState::Stopped);
    }

    fn describe(&self) -> String {
        format!("polling {}", self.fetcher.describe())
    }
}

impl Drop for PollingSource {
    fn drop(&mut self) {
        self.stop();
    }
}
