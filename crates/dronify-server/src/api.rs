//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `contacts` - Customers, pilots and pilot authorizations
//! - `drones` - Drone fleet
//! - `packages` - Packages and their flight assignment
//! - `flights` - Flights, package assignment and lifecycle actions
//! - `estimate` - Standalone consumption estimate
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod contacts;
pub mod drones;
pub mod error;
pub mod estimate;
pub mod flights;
pub mod health;
pub mod openapi;
pub mod packages;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /contacts          - Contacts and pilot authorizations
/// ├── /drones            - Drones and their authorized pilots
/// ├── /packages          - Packages
/// ├── /flights           - Flights, attachments and lifecycle actions
/// ├── /estimate          - Consumption estimate
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/estimate", get(estimate::get_estimate))
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/contacts", contacts::router())
                .nest("/drones", drones::router())
                .nest("/packages", packages::router())
                .nest("/flights", flights::router()),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
