//! Job queue and worker pool.
//!
//! Submission records the job durably, then pushes its id onto a bounded
//! backlog channel. The dispatch loop claims each job through the store (a
//! single atomic `queued -> running` step, strictly in dequeue order) and
//! hands it to a fixed-size worker pool, which runs the external conversion
//! task outside any lock, persists the artifact through the storage gateway,
//! and marks the job terminal. The terminal transition is published to the
//! webhook dispatcher and never blocks on delivery.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use mediakit_core::models::{Job, JobResult};
use mediakit_core::ConversionTask;
use mediakit_storage::LocalStorage;
use mediakit_store::{JobStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct JobQueueConfig {
    /// Maximum number of concurrently executing jobs.
    pub max_workers: usize,
    /// Bound of the backlog channel; submission waits when it is full.
    pub queue_size: usize,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            queue_size: 1000,
        }
    }
}

/// What a submitter gets back immediately.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub job_id: Uuid,
    pub queue_id: u64,
    pub queue_length: usize,
}

pub struct JobQueue {
    store: Arc<dyn JobStore>,
    tx: mpsc::Sender<Uuid>,
}

impl JobQueue {
    /// Create the queue and spawn its worker pool.
    ///
    /// `terminal_tx` receives the id of every job that reaches a terminal
    /// state; the webhook dispatcher owns the other end.
    pub fn new(
        store: Arc<dyn JobStore>,
        storage: Arc<LocalStorage>,
        task: Arc<dyn ConversionTask>,
        terminal_tx: mpsc::Sender<Uuid>,
        config: JobQueueConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));

        let pool_store = store.clone();
        tokio::spawn(async move {
            Self::worker_pool(rx, pool_store, storage, task, terminal_tx, config.max_workers).await;
        });

        Self { store, tx }
    }

    /// Submit a new job: durable `queued` record first, then the backlog.
    ///
    /// Fails only when the backing store is unavailable. A job that was
    /// recorded but could not be pushed (engine shutting down) is still
    /// recovered from the store on the next start.
    #[tracing::instrument(skip(self, payload, webhook_url))]
    pub async fn submit(
        &self,
        payload: serde_json::Value,
        webhook_url: Option<String>,
    ) -> StoreResult<SubmitReceipt> {
        let job = self.store.create(payload, webhook_url).await?;
        let queue_length = self.store.queue_length().await?;

        tracing::info!(
            job_id = %job.job_id,
            queue_id = job.queue_id,
            queue_length,
            "Job queued"
        );

        if self.tx.send(job.job_id).await.is_err() {
            tracing::warn!(
                job_id = %job.job_id,
                "Backlog channel closed; job stays durable and will be recovered on restart"
            );
        }

        Ok(SubmitReceipt {
            job_id: job.job_id,
            queue_id: job.queue_id,
            queue_length,
        })
    }

    /// Rebuild the in-memory backlog from the durable store after a restart.
    ///
    /// `queued` jobs are re-enqueued in FIFO order. Jobs left `running` by a
    /// crashed worker are marked `error` permanently: the conversion task is
    /// not known to be idempotent, so a possibly partially-executed job is
    /// surfaced to the caller instead of silently re-run.
    pub async fn recover(&self, terminal_tx: &mpsc::Sender<Uuid>) -> Result<(), StoreError> {
        let stale = self.store.running_jobs().await?;
        for job in stale {
            tracing::warn!(
                job_id = %job.job_id,
                queue_id = job.queue_id,
                process_id = ?job.process_id,
                "Marking job abandoned by a previous process as failed"
            );
            self.store
                .fail(
                    job.job_id,
                    "Worker terminated before the job completed".to_string(),
                )
                .await?;
            let _ = terminal_tx.send(job.job_id).await;
        }

        let backlog = self.store.queued_jobs().await?;
        let recovered = backlog.len();
        for job in backlog {
            if self.tx.send(job.job_id).await.is_err() {
                tracing::error!(job_id = %job.job_id, "Backlog channel closed during recovery");
                break;
            }
        }
        if recovered > 0 {
            tracing::info!(recovered, "Re-enqueued persisted backlog");
        }

        Ok(())
    }

    pub async fn queue_length(&self) -> StoreResult<usize> {
        self.store.queue_length().await
    }

    async fn worker_pool(
        mut rx: mpsc::Receiver<Uuid>,
        store: Arc<dyn JobStore>,
        storage: Arc<LocalStorage>,
        task: Arc<dyn ConversionTask>,
        terminal_tx: mpsc::Sender<Uuid>,
        max_workers: usize,
    ) {
        tracing::info!(max_workers, "Worker pool started");
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));

        while let Some(job_id) = rx.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // Claim here, not in the spawned task, so jobs enter `running`
            // strictly in dequeue order. A duplicate id in the backlog
            // executes nobody.
            let job = match store.claim(job_id, std::process::id()).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    tracing::debug!(job_id = %job_id, "Job not claimable, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to claim job");
                    continue;
                }
            };
            tracing::info!(job_id = %job_id, queue_id = job.queue_id, "Job claimed");

            let store = store.clone();
            let storage = storage.clone();
            let task = task.clone();
            let terminal_tx = terminal_tx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(job, store, storage, task, terminal_tx).await;
            });
        }

        tracing::info!("Worker pool stopped");
    }

    #[tracing::instrument(skip_all, fields(job.id = %job.job_id))]
    async fn execute_job(
        job: Job,
        store: Arc<dyn JobStore>,
        storage: Arc<LocalStorage>,
        task: Arc<dyn ConversionTask>,
        terminal_tx: mpsc::Sender<Uuid>,
    ) {
        let job_id = job.job_id;
        let start = Instant::now();

        // The task runs in its own spawned task so a panic is captured as a
        // JoinError and absorbed into the job record, never past the worker.
        let payload = job.request_payload.clone();
        let run_task = task.clone();
        let outcome =
            tokio::spawn(async move { run_task.run(job_id, &payload).await }).await;

        let terminal = match outcome {
            Ok(Ok(output)) => Self::finish_success(&store, &storage, &job, output).await,
            Ok(Err(task_err)) => Self::finish_failure(&store, &job, task_err.to_string()).await,
            Err(join_err) => {
                Self::finish_failure(&store, &job, format!("Conversion task panicked: {}", join_err))
                    .await
            }
        };

        let elapsed = start.elapsed();
        tracing::info!(
            job_id = %job_id,
            duration_ms = elapsed.as_millis() as u64,
            terminal,
            "Job finished"
        );

        if terminal {
            // Fire-and-forget relative to the completion path
            let _ = terminal_tx.send(job_id).await;
        }
    }

    async fn finish_success(
        store: &Arc<dyn JobStore>,
        storage: &Arc<LocalStorage>,
        job: &Job,
        output: mediakit_core::TaskOutput,
    ) -> bool {
        let stored = match storage.store(&output.base_name, &output.bytes).await {
            Ok(stored) => stored,
            Err(e) => {
                return Self::finish_failure(
                    store,
                    job,
                    format!("Failed to persist artifact: {}", e),
                )
                .await;
            }
        };

        let result = JobResult {
            filename: stored.filename,
            download_url: stored.download_url,
            message: output.message,
        };

        match store.complete(job.job_id, result).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(job_id = %job.job_id, error = %e, "Failed to mark job done");
                false
            }
        }
    }

    async fn finish_failure(store: &Arc<dyn JobStore>, job: &Job, message: String) -> bool {
        tracing::warn!(job_id = %job.job_id, error = %message, "Job failed");
        match store.fail(job.job_id, message).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(job_id = %job.job_id, error = %e, "Failed to mark job failed");
                false
            }
        }
    }
}

impl Clone for JobQueue {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tx: self.tx.clone(),
        }
    }
}
