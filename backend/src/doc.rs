//! OpenAPI documentation configuration.
//!
//! This module defines the [`ApiDoc`] struct which generates the OpenAPI
//! specification for the REST API: the health probes plus the generic error
//! payload schema. The generated document is exported via
//! `cargo run --bin openapi-dump` for external tooling.

use utoipa::OpenApi;

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Discwatch backend API",
        description = "HTTP interface for request-correlated health probes."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::api::health::health,
        crate::api::health::ready,
    ),
    components(schemas(
        crate::api::error::ErrorBody,
        crate::api::health::HealthPayload,
    )),
    tags(
        (name = "health", description = "Identity and readiness probes")
    )
)]
pub struct ApiDoc;
