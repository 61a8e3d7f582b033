//! Webhook delivery on terminal job transitions.
//!
//! The dispatcher owns the receiving end of the terminal-event channel. For
//! each event it re-reads the job, starts at most one delivery sequence per
//! job (test-and-set marker in the store) and posts the same JSON payload the
//! status endpoint would return. Delivery runs detached from the completion
//! path; retries use exponential backoff and exhaustion is logged, never
//! written back into the job record.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use mediakit_core::wire::job_status_payload;
use mediakit_store::JobStore;

const MAX_RETRY_BACKOFF_SECS: u64 = 300;

#[derive(Clone)]
pub struct WebhookConfig {
    pub max_attempts: u32,
    pub timeout_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            timeout_seconds: 30,
        }
    }
}

pub struct WebhookDispatcher {
    tx: mpsc::Sender<Uuid>,
}

impl WebhookDispatcher {
    /// Spawn the dispatch loop. The returned handle hands out senders for the
    /// terminal-event channel.
    pub fn spawn(store: Arc<dyn JobStore>, config: WebhookConfig) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel(256);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        tokio::spawn(async move {
            Self::run(rx, store, client, config).await;
        });

        Ok(Self { tx })
    }

    pub fn sender(&self) -> mpsc::Sender<Uuid> {
        self.tx.clone()
    }

    async fn run(
        mut rx: mpsc::Receiver<Uuid>,
        store: Arc<dyn JobStore>,
        client: reqwest::Client,
        config: WebhookConfig,
    ) {
        tracing::debug!("Webhook dispatcher started");

        while let Some(job_id) = rx.recv().await {
            let job = match store.get(job_id).await {
                Ok(job) => job,
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to load job for webhook");
                    continue;
                }
            };

            let url = match (&job.webhook_url, job.status.is_terminal()) {
                (Some(url), true) => url.clone(),
                _ => continue,
            };

            // First caller wins; a duplicate terminal event starts nothing
            match store.mark_webhook_dispatched(job_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(job_id = %job_id, "Webhook already dispatched, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to mark webhook dispatched");
                    continue;
                }
            }

            let queue_length = store.queue_length().await.unwrap_or(0);
            let payload = job_status_payload(&job, queue_length);
            let client = client.clone();
            let max_attempts = config.max_attempts;

            tokio::spawn(async move {
                deliver(client, job_id, url, payload, max_attempts).await;
            });
        }

        tracing::debug!("Webhook dispatcher stopped");
    }
}

async fn deliver(
    client: reqwest::Client,
    job_id: Uuid,
    url: String,
    payload: serde_json::Value,
    max_attempts: u32,
) {
    for attempt in 1..=max_attempts {
        match client.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(
                    job_id = %job_id,
                    url = %url,
                    attempt,
                    "Webhook delivered"
                );
                return;
            }
            Ok(response) => {
                tracing::warn!(
                    job_id = %job_id,
                    url = %url,
                    attempt,
                    status = %response.status(),
                    "Webhook rejected by receiver"
                );
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    url = %url,
                    attempt,
                    error = %e,
                    "Webhook request failed"
                );
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(Duration::from_secs(compute_retry_backoff_seconds(attempt))).await;
        }
    }

    tracing::error!(
        job_id = %job_id,
        url = %url,
        max_attempts,
        "Webhook delivery exhausted all attempts"
    );
}

/// Exponential backoff, capped so a long outage does not produce hour-long
/// sleeps between attempts.
fn compute_retry_backoff_seconds(attempt: u32) -> u64 {
    let exp = 2u64.saturating_pow(attempt);
    exp.min(MAX_RETRY_BACKOFF_SECS)
}
