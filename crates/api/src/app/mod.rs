//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage backend selection
//! - `version.rs`: per-resource API version dispatch
//! - `schema.rs`: body/query validation
//! - `routes/`: HTTP routes + versioned handlers (one folder per resource)
//! - `dto.rs`: body decoding and JSON response shapes
//! - `errors.rs`: consistent error responses, including unrouted paths

use std::sync::Arc;

use axum::{Extension, Router, extract::Request, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod schema;
pub mod services;
pub mod version;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    let versioned = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::version_middleware));

    Router::new()
        .route(
            "/health",
            get(routes::system::health).fallback(routes::method_not_allowed),
        )
        .merge(versioned)
        .fallback(routes::not_found)
        .layer(axum::middleware::from_fn(middleware::require_json))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http().make_span_with(
            |req: &Request| {
                tracing::info_span!(
                    "http_request",
                    request_id = %uuid::Uuid::now_v7(),
                    method = %req.method(),
                    uri = %req.uri(),
                )
            },
        )))
}
