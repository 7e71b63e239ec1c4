//! Push-stream source: consume an SSE status stream, downgrading to polling
//! when the stream fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Response;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use docflow_core::{JobId, JobStatus, StatusUpdate, TaskUpdate, WorkflowId, WorkflowState};

use super::poll::{poll_loop, JobFetcher, StatusFetcher, WorkflowFetcher};
use super::{StatusSource, UpdateSink};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::HttpClient;
use crate::sse::{SseEvent, SseParser};

/// Lifecycle of a [`StreamSource`]. `Fallback` is never left for `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Open,
    /// The stream failed; the status is being polled instead.
    Fallback,
    Closed,
}

/// How a stream that did not fail came to an end.
enum StreamEnd {
    /// The server signalled completion without a terminal payload.
    Complete,
    /// A terminal status was delivered from the stream itself.
    Terminal,
    SinkClosed,
}

/// What to do with one SSE event.
enum Dispatch {
    Deliver(StatusUpdate),
    Complete,
    Skip,
}

/// Endpoint-specific half of a stream: how to open it, decode its events,
/// finish it and poll it instead.
#[async_trait]
trait StreamTarget: Send + Sync + 'static {
    fn describe(&self) -> String;

    async fn open(&self) -> Result<Response, ClientError>;

    /// Decode one event. An error fails the stream.
    fn dispatch(&self, event: &SseEvent) -> Result<Dispatch, ClientError>;

    /// Terminal update to deliver after [`Dispatch::Complete`].
    async fn final_update(&self) -> Option<StatusUpdate>;

    fn fetcher(&self) -> Box<dyn StatusFetcher>;
}

/// `GET /api/workflow/{id}/stream`: per-task updates.
struct WorkflowTarget {
    client: HttpClient,
    workflow_id: WorkflowId,
}

#[async_trait]
impl StreamTarget for WorkflowTarget {
    fn describe(&self) -> String {
        format!("workflow {}", self.workflow_id)
    }

    async fn open(&self) -> Result<Response, ClientError> {
        self.client.open_workflow_stream(&self.workflow_id).await
    }

    fn dispatch(&self, event: &SseEvent) -> Result<Dispatch, ClientError> {
        let decoded = match event.name() {
            "task_update" | "message" => TaskUpdate::patch_from_json(&event.data),
            "task_complete" => TaskUpdate::completion_from_json(&event.data),
            "workflow_complete" => return Ok(Dispatch::Complete),
            other => {
                debug!(event = other, "Ignoring unknown stream event");
                return Ok(Dispatch::Skip);
            }
        };
        Ok(match decoded {
            Ok(update) => Dispatch::Deliver(update.into()),
            Err(e) => {
                warn!(event = event.name(), error = %e, "Skipping malformed stream event");
                Dispatch::Skip
            }
        })
    }

    /// Refetch the whole workflow. The snapshot also carries tasks the stream
    /// mentioned before the consumer knew them. `workflow_complete` is
    /// authoritative, so a snapshot that still lags is marked completed.
    async fn final_update(&self) -> Option<StatusUpdate> {
        match self.client.workflow_tasks(&self.workflow_id).await {
            Ok(mut workflow) => {
                if !workflow.is_terminal() {
                    workflow.status = WorkflowState::Completed;
                }
                Some(workflow.into())
            }
            Err(e) => {
                warn!(workflow_id = %self.workflow_id, error = %e, "Final snapshot unavailable");
                None
            }
        }
    }

    fn fetcher(&self) -> Box<dyn StatusFetcher> {
        Box::new(WorkflowFetcher::new(self.client.clone(), self.workflow_id.clone()))
    }
}

/// `GET /api/status/{jobId}/stream`: one full job status per event.
struct JobTarget {
    client: HttpClient,
    job_id: JobId,
}

#[async_trait]
impl StreamTarget for JobTarget {
    fn describe(&self) -> String {
        format!("job {}", self.job_id)
    }

    async fn open(&self) -> Result<Response, ClientError> {
        self.client.open_job_stream(&self.job_id).await
    }

    fn dispatch(&self, event: &SseEvent) -> Result<Dispatch, ClientError> {
        let value: Value = match serde_json::from_str(&event.data) {
            Ok(value) => value,
            Err(e) => {
                warn!(job_id = %self.job_id, error = %e, "Skipping malformed stream event");
                return Ok(Dispatch::Skip);
            }
        };
        // The backend reports an unknown job in-band and then ends the stream.
        if value.get("jobId").is_none() {
            if let Some(error) = value.get("error").and_then(Value::as_str) {
                return Err(ClientError::Stream(error.to_string()));
            }
        }
        Ok(match serde_json::from_value::<JobStatus>(value) {
            Ok(job) => Dispatch::Deliver(job.into()),
            Err(e) => {
                warn!(job_id = %self.job_id, error = %e, "Skipping malformed job status");
                Dispatch::Skip
            }
        })
    }

    async fn final_update(&self) -> Option<StatusUpdate> {
        None
    }

    fn fetcher(&self) -> Box<dyn StatusFetcher> {
        Box::new(JobFetcher::new(self.client.clone(), self.job_id.clone()))
    }
}

/// Delivers updates from a push stream.
///
/// The stream counts as failed when it cannot be opened, answers with a
/// non-success status, errors mid-read, or ends before a terminal event.
/// On failure the source switches to polling (when enabled in the config)
/// and stays there. Whenever the source finishes on its own the sink is
/// closed, so a channel consumer sees its receiver end.
pub struct StreamSource {
    target: Arc<dyn StreamTarget>,
    poll_interval: Duration,
    fallback: bool,
    state: Arc<watch::Sender<StreamState>>,
    cancel: Option<CancellationToken>,
    sink: Option<UpdateSink>,
    handle: Option<JoinHandle<()>>,
}

impl StreamSource {
    /// Follow a workflow's task stream; on `workflow_complete` a final
    /// snapshot is fetched and delivered.
    pub fn workflow(client: HttpClient, workflow_id: WorkflowId, config: &ClientConfig) -> Self {
        Self::with_target(
            Arc::new(WorkflowTarget {
                client,
                workflow_id,
            }),
            config,
        )
    }

    /// Follow a document job's status stream until a terminal stage.
    pub fn job(client: HttpClient, job_id: JobId, config: &ClientConfig) -> Self {
        Self::with_target(Arc::new(JobTarget { client, job_id }), config)
    }

    fn with_target(target: Arc<dyn StreamTarget>, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(StreamState::Connecting);
        Self {
            target,
            poll_interval: config.poll_interval,
            fallback: config.stream_fallback,
            state: Arc::new(state),
            cancel: None,
            sink: None,
            handle: None,
        }
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl StatusSource for StreamSource {
    /// Must be called from within a Tokio runtime.
    fn start(&mut self, sink: UpdateSink) {
        if self.is_running() {
            return;
        }
        info!(source = %self.target.describe(), "Opening status stream");

        let cancel = CancellationToken::new();
        let worker = StreamWorker {
            target: Arc::clone(&self.target),
            poll_interval: self.poll_interval,
            fallback: self.fallback,
            state: Arc::clone(&self.state),
            sink: sink.clone(),
            cancel: cancel.clone(),
        };

        self.state.send_replace(StreamState::Connecting);
        self.handle = Some(tokio::spawn(worker.run()));
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
        self.state.send_replace(StreamState::Closed);
    }

    fn describe(&self) -> String {
        format!("stream {}", self.target.describe())
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background half of a [`StreamSource`].
struct StreamWorker {
    target: Arc<dyn StreamTarget>,
    poll_interval: Duration,
    fallback: bool,
    state: Arc<watch::Sender<StreamState>>,
    sink: UpdateSink,
    cancel: CancellationToken,
}

impl StreamWorker {
    async fn run(self) {
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            outcome = self.consume() => outcome,
        };
        let source = self.target.describe();

        match outcome {
            Ok(StreamEnd::Complete) => {
                info!(source = %source, "Stream signalled completion");
                let update = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return,
                    update = self.target.final_update() => update,
                };
                if let Some(update) = update {
                    self.sink.deliver(update);
                }
            }
            Ok(StreamEnd::Terminal) => {
                info!(source = %source, "Terminal status received, stream closed");
            }
            Ok(StreamEnd::SinkClosed) => {}
            Err(e) if self.fallback => {
                warn!(source = %source, error = %e, "Status stream failed, falling back to polling");
                self.state.send_replace(StreamState::Fallback);
                let fetcher = self.target.fetcher();
                let exit = poll_loop(fetcher.as_ref(), self.poll_interval, &self.sink, &self.cancel).await;
                debug!(source = %source, ?exit, "Fallback polling ended");
            }
            Err(e) => {
                warn!(source = %source, error = %e, "Status stream failed");
            }
        }
        self.sink.close();
        self.state.send_replace(StreamState::Closed);
    }

    async fn consume(&self) -> Result<StreamEnd, ClientError> {
        let response = self.target.open().await?;
        self.state.send_replace(StreamState::Open);

        let mut body = response.bytes_stream();
        let mut parser = SseParser::new();
        while let Some(chunk) = body.next().await {
            for event in parser.push(&chunk?) {
                match self.target.dispatch(&event)? {
                    Dispatch::Deliver(update) => {
                        let terminal = update.is_terminal();
                        if !self.sink.deliver(update) {
                            return Ok(StreamEnd::SinkClosed);
                        }
                        if terminal {
                            return Ok(StreamEnd::Terminal);
                        }
                    }
                    Dispatch::Complete => return Ok(StreamEnd::Complete),
                    Dispatch::Skip => {}
                }
            }
        }
        Err(ClientError::Stream(
            "stream ended before a terminal event".to_string(),
        ))
    }
}
