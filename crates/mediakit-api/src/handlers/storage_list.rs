//! Storage-root listing.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/v1/storage/list",
    tag = "storage",
    responses(
        (status = 200, description = "Stored files, newest first"),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let files = state.storage.list().await?;

    let body = serde_json::json!({
        "response": {
            "total_files": files.len(),
            "files": files,
            "storage_path": state.storage.root().display().to_string(),
        }
    });

    Ok(Json(body))
}
