//! Durable key-value store of job records.
//!
//! The store is the single source of truth for job state: the backlog of
//! `queued`/`running` jobs is reconstructible from it after a restart. All
//! status transitions go through the store so the state machine is enforced
//! in one place.

mod file;
mod memory;
mod table;

pub use file::FileJobStore;
pub use memory::MemoryJobStore;

use async_trait::async_trait;
use mediakit_core::models::{Job, JobResult};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: &'static str,
        to: &'static str,
    },

    #[error("Failed to persist job record: {0}")]
    PersistFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Status Store contract.
///
/// `get` is side-effect-free and safely repeatable at arbitrary frequency;
/// mutations are concurrency-safe against simultaneous reads. The engine
/// guarantees a single writer per job (§ worker claim), the store guarantees
/// snapshot isolation on each record.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a new `queued` job, assigning its unique id and the next
    /// strictly-increasing queue id.
    async fn create(
        &self,
        request_payload: serde_json::Value,
        webhook_url: Option<String>,
    ) -> StoreResult<Job>;

    /// Immutable snapshot of the current record.
    async fn get(&self, job_id: Uuid) -> StoreResult<Job>;

    /// Exclusive claim: atomically performs the `queued -> running` write.
    ///
    /// Returns `None` when the job is not claimable (already claimed or
    /// terminal), so a job id seen twice executes at most once.
    async fn claim(&self, job_id: Uuid, process_id: u32) -> StoreResult<Option<Job>>;

    /// `running -> done` with the artifact reference.
    async fn complete(&self, job_id: Uuid, result: JobResult) -> StoreResult<Job>;

    /// `running -> error` with the captured failure message.
    async fn fail(&self, job_id: Uuid, error_message: String) -> StoreResult<Job>;

    /// Test-and-set delivery marker; returns `true` only for the caller that
    /// sets it first. At most one webhook delivery sequence starts per job.
    async fn mark_webhook_dispatched(&self, job_id: Uuid) -> StoreResult<bool>;

    /// Jobs still `queued`, FIFO by queue id. Used for restart recovery.
    async fn queued_jobs(&self) -> StoreResult<Vec<Job>>;

    /// Jobs durably `running` (e.g. left behind by a crashed worker).
    async fn running_jobs(&self) -> StoreResult<Vec<Job>>;

    /// Number of `queued` jobs.
    async fn queue_length(&self) -> StoreResult<usize>;
}
