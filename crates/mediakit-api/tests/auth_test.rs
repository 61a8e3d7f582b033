mod helpers;

use helpers::{setup_test_app, InstantTask, TEST_API_KEY};
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn protected_routes_require_api_key() {
    let app = setup_test_app(Arc::new(InstantTask)).await;

    let submit = app
        .server
        .post("/v1/image/convert/video")
        .json(&json!({ "image_url": "https://example.com/photo.jpg" }))
        .await;
    assert_eq!(submit.status_code(), 401);

    let status = app
        .server
        .post("/v1/toolkit/job/status")
        .json(&json!({ "job_id": "anything" }))
        .await;
    assert_eq!(status.status_code(), 401);

    let download = app.server.get("/v1/storage/download/clip.mp4").await;
    assert_eq!(download.status_code(), 401);

    let list = app.server.get("/v1/storage/list").await;
    assert_eq!(list.status_code(), 401);
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let app = setup_test_app(Arc::new(InstantTask)).await;

    let response = app
        .server
        .get("/v1/storage/list")
        .add_header("X-API-Key", "wrong-key")
        .await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn auth_check_runs_before_filename_validation() {
    let app = setup_test_app(Arc::new(InstantTask)).await;

    // An unsafe filename without a key is a 401, not a 400
    let response = app
        .server
        .get("/v1/storage/download/..%2F..%2Fetc%2Fpasswd")
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn health_is_public() {
    let app = setup_test_app(Arc::new(InstantTask)).await;

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn valid_key_passes() {
    let app = setup_test_app(Arc::new(InstantTask)).await;

    let response = app
        .server
        .get("/v1/storage/list")
        .add_header("X-API-Key", TEST_API_KEY)
        .await;
    assert_eq!(response.status_code(), 200);
}
