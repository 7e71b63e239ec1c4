//! HTTP client for the backend REST endpoints.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use docflow_core::{JobId, JobStatus, WorkflowId, WorkflowStatus};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::types::{
    CancelResponse, DocumentResponse, ExportRequest, ExportResponse, GenerateRequest,
    HealthResponse, RefineRequest, WorkflowAccepted, WorkflowRequest,
};

/// HTTP client for the backend API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        }
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/health`.
    ///
    /// An unhealthy backend answers 503 with the same body, so the body is
    /// decoded whatever the status; only an undecodable error reply fails.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let path = "/api/health";
        let url = self.url(path);
        debug!(url = %url, "GET request");

        let response = self.inner.get(&url).timeout(self.request_timeout).send().await?;
        let status = response.status();
        match response.json::<HealthResponse>().await {
            Ok(health) => Ok(health),
            Err(_) if !status.is_success() => Err(ClientError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            }),
            Err(e) => Err(ClientError::Serialization(e.to_string())),
        }
    }

    /// `POST /api/workflow/generate`: start a task-tree workflow.
    pub async fn generate_workflow(
        &self,
        request: &WorkflowRequest,
    ) -> Result<WorkflowAccepted, ClientError> {
        self.post_json("/api/workflow/generate", request).await
    }

    /// `GET /api/workflow/{id}/tasks`: full workflow snapshot.
    pub async fn workflow_tasks(&self, workflow_id: &WorkflowId) -> Result<WorkflowStatus, ClientError> {
        self.get_json(&format!("/api/workflow/{}/tasks", workflow_id)).await
    }

    /// `GET /api/workflow/{id}/stream`: open the push stream.
    ///
    /// The returned response has a success status; its body is the SSE stream.
    pub async fn open_workflow_stream(&self, workflow_id: &WorkflowId) -> Result<Response, ClientError> {
        self.open_stream(&format!("/api/workflow/{}/stream", workflow_id)).await
    }

    /// `GET /api/status/{jobId}/stream`: one full job status per event until
    /// the job reaches a terminal stage.
    pub async fn open_job_stream(&self, job_id: &JobId) -> Result<Response, ClientError> {
        self.open_stream(&format!("/api/status/{}/stream", job_id)).await
    }

    /// Download a generated PDF. `pdf_url` is the path returned by
    /// [`export`](Self::export) or a job status, e.g. `/api/pdf/{id}`.
    pub async fn download_pdf(&self, pdf_url: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.url(pdf_url);
        debug!(url = %url, "Downloading PDF");

        let response = self.inner.get(&url).timeout(self.request_timeout).send().await?;
        let response = check_status(response, pdf_url)?;
        Ok(response.bytes().await?.to_vec())
    }

    /// `POST /api/generate`: start document generation.
    pub async fn generate(&self, prompt: &str) -> Result<DocumentResponse, ClientError> {
        let request = GenerateRequest {
            prompt: prompt.to_string(),
        };
        self.post_json("/api/generate", &request).await
    }

    /// `POST /api/refine`: refine a document or a selection of it.
    pub async fn refine(&self, request: &RefineRequest) -> Result<DocumentResponse, ClientError> {
        self.post_json("/api/refine", request).await
    }

    /// `POST /api/export`: render a document to PDF.
    pub async fn export(&self, request: &ExportRequest) -> Result<ExportResponse, ClientError> {
        self.post_json("/api/export", request).await
    }

    /// `GET /api/status/{jobId}`.
    pub async fn job_status(&self, job_id: &JobId) -> Result<JobStatus, ClientError> {
        self.get_json(&format!("/api/status/{}", job_id)).await
    }

    /// `POST /api/cancel/{jobId}`. The job's status eventually reaches `failed`.
    pub async fn cancel(&self, job_id: &JobId) -> Result<CancelResponse, ClientError> {
        self.post_json(&format!("/api/cancel/{}", job_id), &serde_json::json!({}))
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Open an SSE response. No request timeout applies to the body.
    async fn open_stream(&self, path: &str) -> Result<Response, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "Opening event stream");

        let response = self
            .inner
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        check_status(response, path)
    }

    /// Get JSON from an endpoint.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "GET request");
        self.send_json(self.inner.get(&url), path).await
    }

    /// Post a JSON body and decode the JSON reply.
    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "POST request");
        self.send_json(self.inner.post(&url).json(body), path).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, ClientError> {
        let response = request.timeout(self.request_timeout).send().await?;
        let response = check_status(response, path)?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }
}

fn check_status(response: Response, path: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(path.to_string()));
    }
    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            path: path.to_string(),
        });
    }
    Ok(response)
}
