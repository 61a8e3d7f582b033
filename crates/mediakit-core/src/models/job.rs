//! Job domain model and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Job lifecycle status.
///
/// Transitions are one-directional: `Queued -> Running -> {Done, Error}`.
/// `Done` and `Error` are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Done)
                | (JobStatus::Running, JobStatus::Error)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful conversion outcome: an artifact reference plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobResult {
    pub filename: String,
    pub download_url: String,
    pub message: String,
}

/// Timing fields reported to callers for terminal jobs, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobTimings {
    pub queue_time: f64,
    pub run_time: f64,
    pub total_time: f64,
}

/// A unit of asynchronous work created by submission.
///
/// Mutated only by the worker pool (status, timestamps, result) and the
/// webhook dispatcher (delivery-attempted marker); never deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Globally unique opaque identifier, assigned at submission, immutable.
    pub job_id: Uuid,
    /// Monotonically increasing enqueue-order marker; never reused.
    pub queue_id: u64,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Original conversion parameters, opaque to the engine.
    pub request_payload: serde_json::Value,
    /// Present only when `status == Done`.
    pub result: Option<JobResult>,
    /// Present only when `status == Error`.
    pub error_message: Option<String>,
    /// Set at submission, immutable.
    pub webhook_url: Option<String>,
    /// Identifier of the worker process that executed the job.
    pub process_id: Option<u32>,
    /// Set once by the webhook dispatcher when a delivery sequence starts.
    #[serde(default)]
    pub webhook_dispatched: bool,
}

impl Job {
    /// Create a freshly submitted job in the `Queued` state.
    pub fn queued(
        job_id: Uuid,
        queue_id: u64,
        request_payload: serde_json::Value,
        webhook_url: Option<String>,
    ) -> Self {
        Self {
            job_id,
            queue_id,
            status: JobStatus::Queued,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            request_payload,
            result: None,
            error_message: None,
            webhook_url,
            process_id: None,
            webhook_dispatched: false,
        }
    }

    /// Timings derived from the recorded timestamps.
    ///
    /// `queue_time` is available once the job started; `run_time` and
    /// `total_time` once it reached a terminal state.
    pub fn timings(&self) -> Option<JobTimings> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        let queue_time = (started - self.submitted_at).num_milliseconds() as f64 / 1000.0;
        let run_time = (completed - started).num_milliseconds() as f64 / 1000.0;
        Some(JobTimings {
            queue_time,
            run_time,
            total_time: queue_time + run_time,
        })
    }
}
