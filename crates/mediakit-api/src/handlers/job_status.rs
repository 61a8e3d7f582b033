//! Job status polling.
//!
//! Side-effect free and safe to call at arbitrary frequency; the response is
//! the same envelope the webhook dispatcher delivers.

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use mediakit_core::wire::job_status_payload;
use mediakit_store::StoreError;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct JobStatusRequest {
    pub job_id: String,
}

fn not_found(job_id: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Job not found",
            "job_id": job_id,
        })),
    )
}

#[utoipa::path(
    post,
    path = "/v1/toolkit/job/status",
    tag = "jobs",
    request_body = JobStatusRequest,
    responses(
        (status = 200, description = "Current job status envelope"),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 404, description = "Unknown job id")
    ),
    security(("api_key" = []))
)]
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<JobStatusRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    // An unparseable id names no job, same as an unknown one
    let job_id = match Uuid::parse_str(request.job_id.trim()) {
        Ok(id) => id,
        Err(_) => return Ok(not_found(&request.job_id).into_response()),
    };

    let job = match state.store.get(job_id).await {
        Ok(job) => job,
        Err(StoreError::NotFound(_)) => {
            return Ok(not_found(&request.job_id).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let queue_length = state.store.queue_length().await?;
    let payload = job_status_payload(&job, queue_length);

    Ok((StatusCode::OK, Json(payload)).into_response())
}
