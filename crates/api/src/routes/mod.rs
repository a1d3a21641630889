//! API route modules.

pub mod health;
pub mod submit;

use axum::Router;

use crate::AppState;

/// Combines all API routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(submit::routes())
}
