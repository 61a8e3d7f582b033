//! Job submission: accepts conversion parameters and returns immediately
//! with the identifiers needed to poll for the result.

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use mediakit_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

const DEFAULT_LENGTH_SECONDS: f64 = 5.0;
const DEFAULT_FRAME_RATE: u32 = 30;
const DEFAULT_ZOOM_SPEED: f64 = 3.0;

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct ConvertRequest {
    /// Source image to animate.
    #[validate(url(message = "image_url must be a valid URL"))]
    pub image_url: String,

    /// Output video length in seconds.
    #[validate(range(min = 0.1, max = 400.0, message = "length must be between 0.1 and 400"))]
    pub length: Option<f64>,

    /// Output frame rate.
    #[validate(range(min = 15, max = 60, message = "frame_rate must be between 15 and 60"))]
    pub frame_rate: Option<u32>,

    /// Zoom-in speed percentage.
    #[validate(range(min = 0.0, max = 100.0, message = "zoom_speed must be between 0 and 100"))]
    pub zoom_speed: Option<f64>,

    /// Callback invoked once the job reaches a terminal state.
    #[validate(url(message = "webhook_url must be a valid URL"))]
    pub webhook_url: Option<String>,

    /// Opaque caller correlation id, echoed in the response.
    pub id: Option<serde_json::Value>,
}

impl ConvertRequest {
    /// The parameters handed to the conversion task, defaults applied.
    fn task_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "image_url": self.image_url,
            "length": self.length.unwrap_or(DEFAULT_LENGTH_SECONDS),
            "frame_rate": self.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
            "zoom_speed": self.zoom_speed.unwrap_or(DEFAULT_ZOOM_SPEED),
        })
    }
}

#[utoipa::path(
    post,
    path = "/v1/image/convert/video",
    tag = "jobs",
    request_body = ConvertRequest,
    responses(
        (status = 202, description = "Job accepted and queued"),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn submit_conversion(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ConvertRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request
        .validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let receipt = state
        .queue
        .submit(request.task_payload(), request.webhook_url.clone())
        .await?;

    let body = serde_json::json!({
        "code": 202,
        "id": request.id,
        "job_id": receipt.job_id,
        "message": "Job queued successfully",
        "pid": std::process::id(),
        "queue_id": receipt.queue_id,
        "queue_length": receipt.queue_length,
        "run_time": 0.0,
        "queue_time": 0.0,
        "total_time": 0.0,
    });

    Ok((StatusCode::ACCEPTED, Json(body)))
}
