//! The conversion-task seam.
//!
//! The media-transformation algorithm is an external collaborator: workers
//! only see this trait. A task receives the opaque request payload and either
//! yields artifact bytes to persist or a failure to record on the job.

use async_trait::async_trait;
use uuid::Uuid;

/// Artifact produced by a successful conversion.
#[derive(Debug)]
pub struct TaskOutput {
    /// Caller-meaningful base name; the storage gateway derives the final
    /// collision-free filename from it.
    pub base_name: String,
    pub bytes: Vec<u8>,
    /// Human-readable completion message surfaced in the job result.
    pub message: String,
}

/// Failure reported by the external conversion step.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    pub message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ConversionTask: Send + Sync {
    async fn run(&self, job_id: Uuid, payload: &serde_json::Value)
        -> Result<TaskOutput, TaskError>;
}
