//! Client library for the Docflow document-generation backend.
//!
//! Provides the HTTP client for job/workflow endpoints, a Server-Sent-Events
//! parser, and the status sources (polling, push stream with polling
//! fallback, scripted timeline) that feed updates into a
//! [`WorkflowTracker`](docflow_core::WorkflowTracker).

pub mod config;
pub mod error;
pub mod http;
pub mod source;
pub mod sse;
pub mod types;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::HttpClient;
pub use source::{
    JobFetcher, PollState, PollingSource, ReplayState, ScriptedSource, StatusFetcher,
    StatusSource, StreamSource, StreamState, UpdateSink, WorkflowFetcher,
};
pub use sse::{SseEvent, SseParser};
