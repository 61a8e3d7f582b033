//! Status-response envelope shared by the HTTP status endpoint and the
//! webhook dispatcher. The webhook payload is structurally identical to the
//! status-query response, so idempotent consumers can treat the payload as
//! the source of truth.

use crate::models::{Job, JobStatus};
use serde_json::{json, Value};

/// Build the caller-visible status payload for a job.
///
/// `queue_length` is only reported while the job is non-terminal.
pub fn job_status_payload(job: &Job, queue_length: usize) -> Value {
    match job.status {
        JobStatus::Queued | JobStatus::Running => json!({
            "code": 200,
            "response": {
                "job_status": job.status.as_str(),
                "job_id": job.job_id,
                "queue_id": job.queue_id,
                "process_id": job.process_id,
                "response": null,
            },
            "queue_length": queue_length,
        }),
        JobStatus::Done => {
            let timings = job.timings();
            json!({
                "code": 200,
                "response": {
                    "job_status": "done",
                    "job_id": job.job_id,
                    "queue_id": job.queue_id,
                    "process_id": job.process_id,
                    "response": job.result,
                },
                "run_time": timings.map(|t| t.run_time),
                "queue_time": timings.map(|t| t.queue_time),
                "total_time": timings.map(|t| t.total_time),
            })
        }
        JobStatus::Error => json!({
            "code": 200,
            "response": {
                "job_status": "error",
                "job_id": job.job_id,
                "queue_id": job.queue_id,
                "process_id": job.process_id,
                "error": job.error_message,
            },
        }),
    }
}
