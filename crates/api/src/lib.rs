//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - The `/submit` crash submission route
//! - The streaming multipart payload decoder
//! - Health endpoints

pub mod payload;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use crashbay_core::pipeline::{Coordinator, Governor};
use crashbay_core::publish::Announcer;
use crashbay_shared::config::LimitsConfig;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Per-submission pipeline orchestrator.
    pub coordinator: Arc<Coordinator>,
    /// Announcer, exposed for dead-letter inspection.
    pub announcer: Arc<Announcer>,
    /// Admission governor.
    pub governor: Arc<Governor>,
    /// Payload size limits and response prefix.
    pub limits: LimitsConfig,
    /// Configured store provider name, surfaced by the health endpoint.
    pub store_provider: &'static str,
}

/// Creates the main application router.
///
/// The framework body limit is disabled: the payload decoder enforces the
/// configured attachment/body ceilings incrementally while streaming.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
