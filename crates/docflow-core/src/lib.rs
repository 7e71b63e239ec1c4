//! Docflow Core Domain Types
//!
//! This crate contains the pure domain of Docflow with no dependencies on:
//! - Network/HTTP
//! - Async runtimes
//! - Terminal rendering
//!
//! It owns the workflow task tree, the reconciler that merges incremental
//! task updates into it, and the statistics derived from it.

pub mod error;
pub mod ids;
pub mod job;
pub mod reconcile;
pub mod stats;
pub mod status;
pub mod task;
pub mod timeline;
pub mod tree;
pub mod update;
pub mod view;
pub mod workflow;

mod wire;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{JobId, TaskId, WorkflowId};
pub use job::{JobStage, JobStatus};
pub use reconcile::reconcile;
pub use stats::{aggregate, overall_progress, WorkflowStatistics};
pub use status::{TaskStatus, WorkflowState};
pub use task::{clone_forest, Task};
pub use timeline::{demo_timeline, TimelineStep};
pub use tree::TaskTree;
pub use update::{CompletionPatch, ProgressPatch, TaskUpdate};
pub use workflow::{StatusUpdate, WorkflowStatus, WorkflowTracker};
