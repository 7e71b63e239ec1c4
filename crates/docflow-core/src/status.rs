//! Status enums for Tasks and Workflows.
//!
//! Both enums share the backend's lowercase vocabulary but are kept apart:
//! a workflow's status is reported by the backend and is never derived from
//! the status of its tasks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::CoreError;

/// Wire vocabulary shared by task and workflow statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WireStatus {
    /// Case- and whitespace-insensitive; anything unrecognized is pending.
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Any JSON value: non-strings (numbers, null, objects) are pending.
    fn decode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(Self::parse).unwrap_or(Self::Pending))
    }
}

/// Status of a single Task node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task known but not started. Also the fallback for unknown values.
    #[default]
    Pending,
    /// Task is executing.
    Running,
    /// Task finished successfully.
    Completed,
    /// Task failed.
    Failed,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Lenient mapping used for wire values; anything unrecognized is pending.
    pub fn from_wire(value: &str) -> Self {
        WireStatus::parse(value).into()
    }
}

impl From<WireStatus> for TaskStatus {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Pending => Self::Pending,
            WireStatus::Running => Self::Running,
            WireStatus::Completed => Self::Completed,
            WireStatus::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    /// Strict parsing for user input (CLI filters).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::InvalidInput(format!(
                "unknown task status '{other}'"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireStatus::decode(deserializer).map(Self::from)
    }
}

/// Workflow-level status reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    /// Workflow accepted but nothing started.
    #[default]
    Pending,
    /// Workflow is executing.
    Running,
    /// Workflow finished successfully.
    Completed,
    /// Workflow failed or was cancelled.
    Failed,
}

impl WorkflowState {
    /// Returns true if no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl From<WireStatus> for WorkflowState {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Pending => Self::Pending,
            WireStatus::Running => Self::Running,
            WireStatus::Completed => Self::Completed,
            WireStatus::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WorkflowState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireStatus::decode(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_task_status_is_pending() {
        let status: TaskStatus = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(status, TaskStatus::Pending);

        let status: TaskStatus = serde_json::from_str("null").unwrap();
        assert_eq!(status, TaskStatus::Pending);
    }

    #[test]
    fn test_task_status_wire_names() {
        assert_eq!(serde_json::to_string(&TaskStatus::Running).unwrap(), "\"running\"");
        let status: TaskStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, TaskStatus::Completed);
    }

    #[test]
    fn test_strict_parse_rejects_unknown() {
        assert_eq!("Failed".parse::<TaskStatus>().unwrap(), TaskStatus::Failed);
        assert!("queued".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_non_string_status_is_pending() {
        let status: TaskStatus = serde_json::from_str("3").unwrap();
        assert_eq!(status, TaskStatus::Pending);

        let state: WorkflowState = serde_json::from_str("{\"phase\": 1}").unwrap();
        assert_eq!(state, WorkflowState::Pending);
    }

    #[test]
    fn test_workflow_state_ignores_case() {
        let state: WorkflowState = serde_json::from_str("\" Completed \"").unwrap();
        assert_eq!(state, WorkflowState::Completed);

        let status: TaskStatus = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(status, TaskStatus::Running);
    }

    #[test]
    fn test_numeric_task_status_keeps_snapshot_decodable() {
        let task: crate::Task = serde_json::from_str(
            r#"{"id": "t1", "name": "T1", "type": "x", "status": 3}"#,
        )
        .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(WorkflowState::Failed.is_terminal());
        assert!(!WorkflowState::Pending.is_terminal());
    }
}
