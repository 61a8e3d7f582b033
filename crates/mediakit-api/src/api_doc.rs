//! OpenAPI document aggregate.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ErrorResponse;
use crate::handlers::convert::ConvertRequest;
use crate::handlers::job_status::JobStatusRequest;
use mediakit_core::models::{JobResult, JobStatus, JobTimings};
use mediakit_storage::StoredFile;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::convert::submit_conversion,
        crate::handlers::job_status::job_status,
        crate::handlers::storage_download::download_file,
        crate::handlers::storage_list::list_files,
        crate::handlers::health::health,
    ),
    components(schemas(
        ConvertRequest,
        JobStatusRequest,
        JobStatus,
        JobResult,
        JobTimings,
        StoredFile,
        ErrorResponse,
    )),
    tags(
        (name = "jobs", description = "Asynchronous conversion jobs"),
        (name = "storage", description = "Artifact storage gateway"),
        (name = "health", description = "Service health"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    crate::auth::API_KEY_HEADER,
                ))),
            );
        }
    }
}
