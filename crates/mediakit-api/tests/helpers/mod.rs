use async_trait::async_trait;
use axum_test::TestServer;
use mediakit_api::setup::routes::setup_routes;
use mediakit_api::state::AppState;
use mediakit_core::{Config, ConversionTask, TaskError, TaskOutput};
use mediakit_engine::{JobQueue, JobQueueConfig, WebhookConfig, WebhookDispatcher};
use mediakit_storage::LocalStorage;
use mediakit_store::MemoryJobStore;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_BASE_URL: &str = "http://localhost:8080";

/// Task that instantly produces a fixed artifact.
pub struct InstantTask;

#[async_trait]
impl ConversionTask for InstantTask {
    async fn run(&self, job_id: Uuid, _payload: &Value) -> Result<TaskOutput, TaskError> {
        Ok(TaskOutput {
            base_name: format!("{}.mp4", job_id),
            bytes: b"fake mp4 bytes".to_vec(),
            message: "Video conversion completed successfully".to_string(),
        })
    }
}

/// Task that always fails with a fixed message.
pub struct FailingTask;

#[async_trait]
impl ConversionTask for FailingTask {
    async fn run(&self, _job_id: Uuid, _payload: &Value) -> Result<TaskOutput, TaskError> {
        Err(TaskError::new("source image could not be decoded"))
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<MemoryJobStore>,
    pub storage: Arc<LocalStorage>,
    pub _temp_dir: TempDir,
}

fn test_config(storage_path: PathBuf) -> Config {
    Config {
        server_port: 0,
        api_key: TEST_API_KEY.to_string(),
        api_base_url: TEST_BASE_URL.to_string(),
        storage_path,
        worker_pool_size: 2,
        job_queue_size: 100,
        webhook_max_attempts: 2,
        webhook_timeout_seconds: 5,
        ffmpeg_path: "ffmpeg".to_string(),
        cors_origins: vec![],
        environment: "test".to_string(),
    }
}

/// Build the app against in-memory components and the given task.
pub async fn setup_test_app(task: Arc<dyn ConversionTask>) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(temp_dir.path().to_path_buf());

    let store = Arc::new(MemoryJobStore::new());
    let storage = Arc::new(
        LocalStorage::new(
            temp_dir.path(),
            format!("{}/v1/storage/download", TEST_BASE_URL),
        )
        .await
        .expect("Failed to create local storage"),
    );

    let dispatcher = WebhookDispatcher::spawn(
        store.clone(),
        WebhookConfig {
            max_attempts: config.webhook_max_attempts,
            timeout_seconds: config.webhook_timeout_seconds,
        },
    )
    .expect("Failed to spawn webhook dispatcher");

    let queue = JobQueue::new(
        store.clone(),
        storage.clone(),
        task,
        dispatcher.sender(),
        JobQueueConfig {
            max_workers: config.worker_pool_size,
            queue_size: config.job_queue_size,
        },
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        store: store.clone(),
        storage: storage.clone(),
        queue,
    });

    let app = setup_routes(&config, state).expect("Failed to build routes");
    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp {
        server,
        store,
        storage,
        _temp_dir: temp_dir,
    }
}

/// Poll the status endpoint until the job is terminal.
pub async fn poll_until_terminal(app: &TestApp, job_id: &str) -> Value {
    for _ in 0..200 {
        let response = app
            .server
            .post("/v1/toolkit/job/status")
            .add_header("X-API-Key", TEST_API_KEY)
            .json(&serde_json::json!({ "job_id": job_id }))
            .await;
        assert_eq!(response.status_code(), 200);

        let body: Value = response.json();
        let status = body["response"]["job_status"].as_str().unwrap().to_string();
        if status == "done" || status == "error" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}
