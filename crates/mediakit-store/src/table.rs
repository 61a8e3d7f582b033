//! In-memory job table shared by both store implementations.
//!
//! All transition rules live here; the file-backed store adds persistence on
//! top of the same table.

use mediakit_core::models::{Job, JobResult, JobStatus};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{StoreError, StoreResult};

pub(crate) struct JobTable {
    jobs: HashMap<Uuid, Job>,
    next_queue_id: u64,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub(crate) fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            next_queue_id: 1,
        }
    }

    /// Rebuild the table from previously persisted records.
    pub(crate) fn from_records(records: Vec<Job>) -> Self {
        let next_queue_id = records.iter().map(|j| j.queue_id).max().unwrap_or(0) + 1;
        let jobs = records.into_iter().map(|j| (j.job_id, j)).collect();
        Self {
            jobs,
            next_queue_id,
        }
    }

    pub(crate) fn insert_new(
        &mut self,
        request_payload: serde_json::Value,
        webhook_url: Option<String>,
    ) -> Job {
        let queue_id = self.next_queue_id;
        self.next_queue_id += 1;
        let job = Job::queued(Uuid::new_v4(), queue_id, request_payload, webhook_url);
        self.jobs.insert(job.job_id, job.clone());
        job
    }

    pub(crate) fn get(&self, job_id: Uuid) -> StoreResult<Job> {
        self.jobs
            .get(&job_id)
            .cloned()
            .ok_or(StoreError::NotFound(job_id))
    }

    pub(crate) fn claim(&mut self, job_id: Uuid, process_id: u32) -> StoreResult<Option<Job>> {
        let job = self
            .jobs
            .get_mut(&job_id)
            .ok_or(StoreError::NotFound(job_id))?;
        if job.status != JobStatus::Queued {
            return Ok(None);
        }
        job.status = JobStatus::Running;
        job.started_at = Some(chrono::Utc::now());
        job.process_id = Some(process_id);
        Ok(Some(job.clone()))
    }

    pub(crate) fn complete(&mut self, job_id: Uuid, result: JobResult) -> StoreResult<Job> {
        let job = self.running_mut(job_id, "done")?;
        job.status = JobStatus::Done;
        job.result = Some(result);
        job.completed_at = Some(chrono::Utc::now());
        Ok(job.clone())
    }

    pub(crate) fn fail(&mut self, job_id: Uuid, error_message: String) -> StoreResult<Job> {
        let job = self.running_mut(job_id, "error")?;
        job.status = JobStatus::Error;
        job.error_message = Some(error_message);
        job.completed_at = Some(chrono::Utc::now());
        Ok(job.clone())
    }

    pub(crate) fn mark_webhook_dispatched(&mut self, job_id: Uuid) -> StoreResult<(bool, Job)> {
        let job = self
            .jobs
            .get_mut(&job_id)
            .ok_or(StoreError::NotFound(job_id))?;
        if job.webhook_dispatched {
            return Ok((false, job.clone()));
        }
        job.webhook_dispatched = true;
        Ok((true, job.clone()))
    }

    /// Drop a record whose durable write never happened.
    pub(crate) fn remove(&mut self, job_id: Uuid) -> Option<Job> {
        self.jobs.remove(&job_id)
    }

    /// Undo a claim whose durable write failed; the job returns to `queued`.
    pub(crate) fn release_claim(&mut self, job_id: Uuid) {
        if let Some(job) = self.jobs.get_mut(&job_id) {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Queued;
                job.started_at = None;
                job.process_id = None;
            }
        }
    }

    pub(crate) fn with_status(&self, status: JobStatus) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.queue_id);
        jobs
    }

    pub(crate) fn count_with_status(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|j| j.status == status).count()
    }

    fn running_mut(&mut self, job_id: Uuid, to: &'static str) -> StoreResult<&mut Job> {
        let job = self
            .jobs
            .get_mut(&job_id)
            .ok_or(StoreError::NotFound(job_id))?;
        if job.status != JobStatus::Running {
            return Err(StoreError::InvalidTransition {
                job_id,
                from: job.status.as_str(),
                to,
            });
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> serde_json::Value {
        serde_json::json!({"image_url": "https://x/y.jpg"})
    }

    #[test]
    fn queue_ids_strictly_increase() {
        let mut table = JobTable::new();
        let a = table.insert_new(payload(), None);
        let b = table.insert_new(payload(), None);
        let c = table.insert_new(payload(), None);
        assert!(a.queue_id < b.queue_id && b.queue_id < c.queue_id);
    }

    #[test]
    fn claim_is_exclusive() {
        let mut table = JobTable::new();
        let job = table.insert_new(payload(), None);
        assert!(table.claim(job.job_id, 1).unwrap().is_some());
        // Second claim for the same job observes `running` and backs off
        assert!(table.claim(job.job_id, 2).unwrap().is_none());
    }

    #[test]
    fn complete_requires_running() {
        let mut table = JobTable::new();
        let job = table.insert_new(payload(), None);
        let result = JobResult {
            filename: "f.mp4".to_string(),
            download_url: "http://localhost/f.mp4".to_string(),
            message: "ok".to_string(),
        };
        assert!(matches!(
            table.complete(job.job_id, result.clone()),
            Err(StoreError::InvalidTransition { .. })
        ));

        table.claim(job.job_id, 1).unwrap();
        let done = table.complete(job.job_id, result).unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn terminal_jobs_reject_further_transitions() {
        let mut table = JobTable::new();
        let job = table.insert_new(payload(), None);
        table.claim(job.job_id, 1).unwrap();
        table.fail(job.job_id, "boom".to_string()).unwrap();

        assert!(table.claim(job.job_id, 2).unwrap().is_none());
        assert!(table.fail(job.job_id, "again".to_string()).is_err());
    }

    #[test]
    fn webhook_marker_is_test_and_set() {
        let mut table = JobTable::new();
        let job = table.insert_new(payload(), Some("http://cb".to_string()));
        let (first, _) = table.mark_webhook_dispatched(job.job_id).unwrap();
        let (second, _) = table.mark_webhook_dispatched(job.job_id).unwrap();
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn queue_id_counter_restored_from_records() {
        let mut table = JobTable::new();
        table.insert_new(payload(), None);
        let last = table.insert_new(payload(), None);

        let records: Vec<Job> = table.with_status(JobStatus::Queued);
        let mut restored = JobTable::from_records(records);
        let next = restored.insert_new(payload(), None);
        assert!(next.queue_id > last.queue_id);
    }
}
