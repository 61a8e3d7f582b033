//! Shared application state.

use mediakit_core::Config;
use mediakit_engine::JobQueue;
use mediakit_storage::LocalStorage;
use mediakit_store::JobStore;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn JobStore>,
    pub storage: Arc<LocalStorage>,
    pub queue: JobQueue,
}
