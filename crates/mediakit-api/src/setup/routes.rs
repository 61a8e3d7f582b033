//! Route configuration.
//!
//! `/health` and the OpenAPI document are public; everything under `/v1`
//! sits behind the API-key middleware.

use crate::api_doc::ApiDoc;
use crate::auth::{require_api_key, ApiKeyVerifier, StaticKeyVerifier};
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use mediakit_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;
    let verifier: Arc<dyn ApiKeyVerifier> =
        Arc::new(StaticKeyVerifier::new(config.api_key.clone()));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );

    let protected_routes = Router::new()
        .route(
            "/v1/image/convert/video",
            post(handlers::convert::submit_conversion),
        )
        .route(
            "/v1/toolkit/job/status",
            post(handlers::job_status::job_status),
        )
        .route(
            "/v1/storage/download/{filename}",
            get(handlers::storage_download::download_file),
        )
        .route("/v1/storage/list", get(handlers::storage_list::list_files))
        .layer(axum::middleware::from_fn_with_state(
            verifier,
            require_api_key,
        ));

    let app = public_routes
        .merge(protected_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    };
    Ok(cors)
}
