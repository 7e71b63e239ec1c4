//! Request and response bodies of the backend API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use docflow_core::{JobId, WorkflowId};

/// Body of `POST /api/workflow/generate`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    /// Additional generation parameters passed through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }
}

/// Response of `POST /api/workflow/generate`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAccepted {
    pub job_id: JobId,
    pub workflow_id: WorkflowId,
    #[serde(default)]
    pub estimated_tasks: u32,
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

/// Body of `POST /api/refine`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineRequest {
    /// Reuse an existing job id; the backend allocates one otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_doc_html: Option<String>,
}

/// Response of `POST /api/generate` and `POST /api/refine`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub job_id: JobId,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub doc_html: String,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub status_url: Option<String>,
}

/// Body of `POST /api/export`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub full_doc_html: String,
}

/// Response of `POST /api/export`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub pdf_url: String,
}

/// Response of `POST /api/cancel/{jobId}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CancelResponse {
    #[serde(default)]
    pub message: String,
}

/// Response of `GET /api/health`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub checks: HashMap<String, Value>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub instance: Option<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
