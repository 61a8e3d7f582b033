//! Application wiring: store, storage, engine, routes, server.

pub mod routes;
pub mod server;

use crate::state::AppState;
use crate::task_impl::ImageToVideoTask;
use anyhow::Result;
use axum::Router;
use mediakit_core::Config;
use mediakit_engine::{JobQueue, JobQueueConfig, WebhookConfig, WebhookDispatcher};
use mediakit_storage::LocalStorage;
use mediakit_store::FileJobStore;
use std::sync::Arc;

/// Build every component and wire them into a router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router)> {
    let store = Arc::new(FileJobStore::open(&config.storage_path).await?);

    let download_base = format!(
        "{}/v1/storage/download",
        config.api_base_url.trim_end_matches('/')
    );
    let storage = Arc::new(LocalStorage::new(&config.storage_path, download_base).await?);
    tracing::info!(storage_root = %storage.root().display(), "Storage gateway ready");

    let task = Arc::new(ImageToVideoTask::new(config.ffmpeg_path.clone())?);

    let dispatcher = WebhookDispatcher::spawn(
        store.clone(),
        WebhookConfig {
            max_attempts: config.webhook_max_attempts,
            timeout_seconds: config.webhook_timeout_seconds,
        },
    )?;
    let terminal_tx = dispatcher.sender();

    let queue = JobQueue::new(
        store.clone(),
        storage.clone(),
        task,
        terminal_tx.clone(),
        JobQueueConfig {
            max_workers: config.worker_pool_size,
            queue_size: config.job_queue_size,
        },
    );

    // Pick up whatever a previous process left behind
    queue.recover(&terminal_tx).await?;

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        storage,
        queue,
    });

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
