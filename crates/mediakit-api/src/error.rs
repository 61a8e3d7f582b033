//! HTTP error response conversion.
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors
//! convert into `AppError` and render consistently (status code, JSON body,
//! logging) through the `ErrorMetadata` trait.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mediakit_core::{AppError, ErrorMetadata, LogLevel};
use mediakit_storage::StorageError;
use mediakit_store::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
}

/// Wrapper type for AppError to implement IntoResponse.
/// Necessary because of the orphan rule: IntoResponse is external and
/// AppError lives in mediakit-core.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::InvalidFilename(msg) => {
                AppError::InvalidInput(format!("Invalid filename: {}", msg))
            }
            StorageError::NotFound(name) => AppError::NotFound(format!("File not found: {}", name)),
            other => AppError::Storage(other.to_string()),
        };
        HttpAppError(app)
    }
}

impl From<StoreError> for HttpAppError {
    fn from(err: StoreError) -> Self {
        let app = match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("Job not found: {}", id)),
            other => AppError::Internal(other.to_string()),
        };
        HttpAppError(app)
    }
}

/// JSON body deserialization failures become a 400 in our ErrorResponse shape.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that renders deserialization failures as a 400 in our
/// ErrorResponse shape instead of axum's default 422.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ValidatedJson(value))
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let err = self.0;

        match err.log_level() {
            LogLevel::Debug => tracing::debug!(error = %err.detailed_message(), "Request failed"),
            LogLevel::Warn => tracing::warn!(error = %err.detailed_message(), "Request failed"),
            LogLevel::Error => tracing::error!(error = %err.detailed_message(), "Request failed"),
        }

        let details = if err.is_sensitive() {
            None
        } else {
            Some(err.detailed_message())
        };

        let body = ErrorResponse {
            error: err.client_message(),
            details,
            error_type: Some(err.error_type().to_string()),
            code: err.error_code().to_string(),
            recoverable: err.is_recoverable(),
        };

        let status = StatusCode::from_u16(err.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filename_maps_to_400() {
        let err: HttpAppError =
            StorageError::InvalidFilename("path traversal".to_string()).into();
        assert_eq!(err.0.http_status_code(), 400);
    }

    #[test]
    fn missing_file_maps_to_404() {
        let err: HttpAppError = StorageError::NotFound("x.mp4".to_string()).into();
        assert_eq!(err.0.http_status_code(), 404);
    }

    #[test]
    fn store_io_maps_to_500() {
        let err: HttpAppError = StoreError::PersistFailed("disk full".to_string()).into();
        assert_eq!(err.0.http_status_code(), 500);
    }
}
