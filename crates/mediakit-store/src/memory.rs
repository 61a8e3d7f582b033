//! In-memory store, used in tests and for ephemeral deployments.

use async_trait::async_trait;
use mediakit_core::models::{Job, JobResult, JobStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::table::JobTable;
use crate::{JobStore, StoreResult};

#[derive(Default)]
pub struct MemoryJobStore {
    table: RwLock<JobTable>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(JobTable::new()),
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(
        &self,
        request_payload: serde_json::Value,
        webhook_url: Option<String>,
    ) -> StoreResult<Job> {
        let mut table = self.table.write().await;
        Ok(table.insert_new(request_payload, webhook_url))
    }

    async fn get(&self, job_id: Uuid) -> StoreResult<Job> {
        self.table.read().await.get(job_id)
    }

    async fn claim(&self, job_id: Uuid, process_id: u32) -> StoreResult<Option<Job>> {
        self.table.write().await.claim(job_id, process_id)
    }

    async fn complete(&self, job_id: Uuid, result: JobResult) -> StoreResult<Job> {
        self.table.write().await.complete(job_id, result)
    }

    async fn fail(&self, job_id: Uuid, error_message: String) -> StoreResult<Job> {
        self.table.write().await.fail(job_id, error_message)
    }

    async fn mark_webhook_dispatched(&self, job_id: Uuid) -> StoreResult<bool> {
        let (first, _) = self.table.write().await.mark_webhook_dispatched(job_id)?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_job_is_retrievable_as_queued() {
        let store = MemoryJobStore::new();
        let job = store
            .create(serde_json::json!({"image_url": "https://x/y.jpg"}), None)
            .await
            .unwrap();

        let snapshot = store.get(job.job_id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.job_id, job.job_id);
        assert_eq!(store.queue_length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_submissions_get_unique_increasing_queue_ids() {
        let store = std::sync::Arc::new(MemoryJobStore::new());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create(serde_json::json!({}), None)
                    .await
                    .unwrap()
                    .queue_id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 50, "queue ids must never repeat");
    }

    #[tokio::test]
    async fn concurrent_claims_grant_exactly_one() {
        let store = std::sync::Arc::new(MemoryJobStore::new());
        let job = store.create(serde_json::json!({}), None).await.unwrap();

        let mut handles = Vec::new();
        for pid in 0..10u32 {
            let store = store.clone();
            let job_id = job.job_id;
            handles.push(tokio::spawn(
                async move { store.claim(job_id, pid).await.unwrap() },
            ));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1, "exactly one worker may claim a job");
    }

    #[tokio::test]
    async fn terminal_snapshot_is_stable_across_reads() {
        let store = MemoryJobStore::new();
        let job = store.create(serde_json::json!({}), None).await.unwrap();
        store.claim(job.job_id, 7).await.unwrap();
        store
            .fail(job.job_id, "conversion failed".to_string())
            .await
            .unwrap();

        let first = store.get(job.job_id).await.unwrap();
        let second = store.get(job.job_id).await.unwrap();
        assert_eq!(first.error_message, second.error_message);
        assert_eq!(first.completed_at, second.completed_at);
        assert_eq!(first.status, JobStatus::Error);
    }
}
