//! Document job status (`GET /api/status/{jobId}`).
//!
//! Jobs report a pipeline *stage*, a vocabulary separate from task status.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::JobId;

/// Pipeline stage of a document job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    #[default]
    Initializing,
    Analyzing,
    Generating,
    Formatting,
    Finalizing,
    Completed,
    /// Failed or cancelled.
    Failed,
}

impl JobStage {
    /// Returns true if the job will not report further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Analyzing => "analyzing",
            Self::Generating => "generating",
            Self::Formatting => "formatting",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polled status of a document job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: JobId,

    pub stage: JobStage,

    /// Percent complete.
    #[serde(default, deserialize_with = "crate::wire::percent")]
    pub progress: u8,

    #[serde(default)]
    pub message: String,

    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,

    /// Seconds, as estimated by the backend.
    #[serde(
        default,
        deserialize_with = "crate::wire::opt_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_time_remaining: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_steps: Option<u32>,

    /// Log of step descriptions, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,

    /// Generated document, present once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_html: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl JobStatus {
    /// Fresh status for a job that was just accepted.
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            stage: JobStage::Initializing,
            progress: 0,
            message: String::new(),
            start_time: None,
            estimated_time_remaining: None,
            current_step: None,
            total_steps: None,
            completed_steps: None,
            details: Vec::new(),
            doc_html: None,
            pdf_url: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_backend_status() {
        let json = r#"{
            "jobId": "job_1730800000000_abcdefghi",
            "stage": "generating",
            "progress": 52,
            "message": "Generating document content...",
            "startTime": 1730800000000,
            "estimatedTimeRemaining": 17,
            "currentStep": "Content generation",
            "totalSteps": 5,
            "completedSteps": 2,
            "details": ["Job created", "Validating prompt"],
            "_server": "port-3001"
        }"#;
        let status: JobStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.stage, JobStage::Generating);
        assert_eq!(status.progress, 52);
        assert_eq!(status.estimated_time_remaining, Some(17));
        assert_eq!(status.details.len(), 2);
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_cancelled_job_is_failed_stage() {
        let json = r#"{"jobId": "job_1", "stage": "failed", "progress": 40,
                       "message": "Job cancelled by user", "estimatedTimeRemaining": 0}"#;
        let status: JobStatus = serde_json::from_str(json).unwrap();
        assert!(status.is_terminal());
        assert_eq!(status.stage.to_string(), "failed");
    }
}
