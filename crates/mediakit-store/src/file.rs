//! File-backed durable store: one JSON record per job.
//!
//! Records live under `<storage_root>/jobs/<job_id>.json` and are written
//! atomically (temp file then rename), so a crash mid-write never leaves a
//! torn record. On open the full set of records is reloaded, which makes the
//! backlog of `queued`/`running` jobs survive process restarts.

use async_trait::async_trait;
use mediakit_core::models::{Job, JobResult, JobStatus};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::table::JobTable;
use crate::{JobStore, StoreError, StoreResult};

pub struct FileJobStore {
    table: RwLock<JobTable>,
    jobs_dir: PathBuf,
}

impl FileJobStore {
    /// Open (or create) the store under `<storage_root>/jobs`.
    pub async fn open(storage_root: impl Into<PathBuf>) -> StoreResult<Self> {
        let jobs_dir = storage_root.into().join("jobs");
        fs::create_dir_all(&jobs_dir).await.map_err(|e| {
            StoreError::PersistFailed(format!(
                "Failed to create jobs directory {}: {}",
                jobs_dir.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&jobs_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = match fs::read(&path).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable job record");
                    continue;
                }
            };
            match serde_json::from_slice::<Job>(&data) {
                Ok(job) => records.push(job),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt job record");
                }
            }
        }

        tracing::info!(
            jobs_dir = %jobs_dir.display(),
            records = records.len(),
            "Job store opened"
        );

        Ok(Self {
            table: RwLock::new(JobTable::from_records(records)),
            jobs_dir,
        })
    }

    /// Atomic write: temp file in the same directory, fsync, rename.
    async fn persist(&self, job: &Job) -> StoreResult<()> {
        let final_path = self.jobs_dir.join(format!("{}.json", job.job_id));
        let tmp_path = self.jobs_dir.join(format!(".{}.json.tmp", job.job_id));
        let data = serde_json::to_vec_pretty(job)?;

        let mut file = fs::File::create(&tmp_path).await.map_err(|e| {
            StoreError::PersistFailed(format!(
                "Failed to create {}: {}",
                tmp_path.display(),
                e
            ))
        })?;
        file.write_all(&data).await.map_err(|e| {
            StoreError::PersistFailed(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StoreError::PersistFailed(format!("Failed to sync {}: {}", tmp_path.display(), e))
        })?;
        drop(file);

        fs::rename(&tmp_path, &final_path).await.map_err(|e| {
            StoreError::PersistFailed(format!(
                "Failed to rename {} to {}: {}",
                tmp_path.display(),
                final_path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(
        &self,
        request_payload: serde_json::Value,
        webhook_url: Option<String>,
    ) -> StoreResult<Job> {
        // The write lock is held across the persist so the durable record
        // exists before the queue id can be observed by anyone else.
        let mut table = self.table.write().await;
        let job = table.insert_new(request_payload, webhook_url);
        if let Err(e) = self.persist(&job).await {
            // No durable record means no job; a ghost entry would inflate
            // the queue length without ever being dispatched
            table.remove(job.job_id);
            return Err(e);
        }
        Ok(job)
    }

    async fn get(&self, job_id: Uuid) -> StoreResult<Job> {
        self.table.read().await.get(job_id)
    }

    async fn claim(&self, job_id: Uuid, process_id: u32) -> StoreResult<Option<Job>> {
        // Claim and the queued->running status write are a single atomic step.
        let mut table = self.table.write().await;
        match table.claim(job_id, process_id)? {
            Some(job) => {
                if let Err(e) = self.persist(&job).await {
                    table.release_claim(job_id);
                    return Err(e);
                }
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn complete(&self, job_id: Uuid, result: JobResult) -> StoreResult<Job> {
        let mut table = self.table.write().await;
        let job = table.complete(job_id, result)?;
        self.persist(&job).await?;
        Ok(job)
    }

    async fn fail(&self, job_id: Uuid, error_message: String) -> StoreResult<Job> {
        let mut table = self.table.write().await;
        let job = table.fail(job_id, error_message)?;
        self.persist(&job).await?;
        Ok(job)
    }

    async fn mark_webhook_dispatched(&self, job_id: Uuid) -> StoreResult<bool> {
        let mut table = self.table.write().await;
        let (first, job) = table.mark_webhook_dispatched(job_id)?;
        if first {
            self.persist(&job).await?;
        }
        Ok(first)
    }

    async fn queued_jobs(&self) -> StoreResult<Vec<Job>> {
        Ok(self.table.read().await.with_status(JobStatus::Queued))
    }

    async fn running_jobs(&self) -> StoreResult<Vec<Job>> {
        Ok(self.table.read().await.with_status(JobStatus::Running))
    }

    async fn queue_length(&self) -> StoreResult<usize> {
        Ok(self.table.read().await.count_with_status(JobStatus::Queued))
    }
}
