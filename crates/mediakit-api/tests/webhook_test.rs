mod helpers;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use helpers::{poll_until_terminal, setup_test_app, InstantTask, TEST_API_KEY};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone)]
struct Received {
    count: Arc<AtomicUsize>,
    last: Arc<tokio::sync::Mutex<Option<Value>>>,
}

async fn start_receiver() -> (String, Received) {
    let received = Received {
        count: Arc::new(AtomicUsize::new(0)),
        last: Arc::new(tokio::sync::Mutex::new(None)),
    };
    let state = received.clone();
    let app = Router::new()
        .route(
            "/callback",
            post(
                |State(state): State<Received>, Json(body): Json<Value>| async move {
                    state.count.fetch_add(1, Ordering::SeqCst);
                    *state.last.lock().await = Some(body);
                    "ok"
                },
            ),
        )
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/callback", addr), received)
}

#[tokio::test]
async fn terminal_job_triggers_exactly_one_webhook() {
    let (callback_url, received) = start_receiver().await;
    let app = setup_test_app(Arc::new(InstantTask)).await;

    let response = app
        .server
        .post("/v1/image/convert/video")
        .add_header("X-API-Key", TEST_API_KEY)
        .json(&json!({
            "image_url": "https://example.com/photo.jpg",
            "webhook_url": callback_url,
        }))
        .await;
    assert_eq!(response.status_code(), 202);
    let job_id = response.json::<Value>()["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    let status_body = poll_until_terminal(&app, &job_id).await;
    assert_eq!(status_body["response"]["job_status"], "done");

    for _ in 0..200 {
        if received.count.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(received.count.load(Ordering::SeqCst), 1);

    // The delivered payload is the same envelope the status endpoint returns
    let delivered = received.last.lock().await.clone().unwrap();
    assert_eq!(delivered["response"]["job_status"], "done");
    assert_eq!(delivered["response"]["job_id"], job_id);
    assert_eq!(
        delivered["response"]["response"]["filename"],
        status_body["response"]["response"]["filename"]
    );

    // Further polling never re-triggers delivery
    for _ in 0..5 {
        let response = app
            .server
            .post("/v1/toolkit/job/status")
            .add_header("X-API-Key", TEST_API_KEY)
            .json(&json!({ "job_id": job_id }))
            .await;
        assert_eq!(response.status_code(), 200);
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(received.count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn job_without_webhook_url_completes_silently() {
    let (_callback_url, received) = start_receiver().await;
    let app = setup_test_app(Arc::new(InstantTask)).await;

    let response = app
        .server
        .post("/v1/image/convert/video")
        .add_header("X-API-Key", TEST_API_KEY)
        .json(&json!({ "image_url": "https://example.com/photo.jpg" }))
        .await;
    let job_id = response.json::<Value>()["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    poll_until_terminal(&app, &job_id).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(received.count.load(Ordering::SeqCst), 0);
}
