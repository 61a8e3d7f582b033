//! Streamed artifact download.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use mediakit_core::AppError;
use percent_encoding::percent_decode_str;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/v1/storage/download/{filename}",
    tag = "storage",
    params(
        ("filename" = String, Path, description = "Stored artifact filename")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 400, description = "Unsafe filename", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn download_file(
    Path(filename): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let filename = percent_decode_str(&filename)
        .decode_utf8()
        .map_err(|_| AppError::InvalidInput("Filename is not valid UTF-8".to_string()))?
        .into_owned();

    let (file, stream) = state.storage.open_download(&filename).await?;

    tracing::debug!(filename = %file.filename, size = file.size, "Streaming file download");

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.mime_type)
        .header(header::CONTENT_LENGTH, file.size)
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&file.filename),
        )
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(response)
}

/// Quoted-string filenames must not contain `"`, which would let a stored
/// name break out of the header value. Backslashes never reach this point;
/// the storage layer rejects them as path separators.
fn attachment_disposition(filename: &str) -> String {
    let safe = filename.replace('"', "'");
    format!("attachment; filename=\"{}\"", safe)
}
