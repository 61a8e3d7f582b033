//! API-key authentication middleware.
//!
//! Keys are compared in constant time so the comparison leaks no timing
//! signal about the stored key. The check runs before any engine logic.

use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use mediakit_core::AppError;
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Seam for key verification; the engine never sees credentials.
pub trait ApiKeyVerifier: Send + Sync {
    fn verify(&self, presented: &str) -> bool;
}

/// Verifier backed by the single key from configuration.
pub struct StaticKeyVerifier {
    key: String,
}

impl StaticKeyVerifier {
    pub fn new(key: String) -> Self {
        Self { key }
    }
}

impl ApiKeyVerifier for StaticKeyVerifier {
    fn verify(&self, presented: &str) -> bool {
        secure_compare(presented, &self.key)
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

pub async fn require_api_key(
    State(verifier): State<Arc<dyn ApiKeyVerifier>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if verifier.verify(key) => next.run(request).await,
        Some(_) => {
            tracing::debug!("Rejected request with invalid API key");
            HttpAppError(AppError::Unauthorized("Invalid API key".to_string())).into_response()
        }
        None => {
            tracing::debug!("Rejected request without API key");
            HttpAppError(AppError::Unauthorized(format!(
                "Missing {} header",
                API_KEY_HEADER
            )))
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_key_matches() {
        let verifier = StaticKeyVerifier::new("test-api-key".to_string());
        assert!(verifier.verify("test-api-key"));
    }

    #[test]
    fn wrong_key_rejected() {
        let verifier = StaticKeyVerifier::new("test-api-key".to_string());
        assert!(!verifier.verify("test-api-keY"));
        assert!(!verifier.verify(""));
    }

    #[test]
    fn prefix_of_key_rejected() {
        let verifier = StaticKeyVerifier::new("test-api-key".to_string());
        assert!(!verifier.verify("test-api"));
        assert!(!verifier.verify("test-api-key-extra"));
    }
}
