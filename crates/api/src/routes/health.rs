//! Liveness endpoint.
//!
//! Answers even when the store or channel is degraded: a crash collector
//! that stops accepting probes gets drained exactly when crashes spike.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;

/// Snapshot returned by `GET /health`.
#[derive(Serialize)]
pub struct HealthSnapshot {
    /// Always "ok" while the process can answer at all.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Configured object-store provider ("s3" or "local").
    pub storage_provider: &'static str,
    /// Submissions currently in flight.
    pub in_flight: usize,
    /// Announcements that exhausted their retries since startup.
    pub dead_letters: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(HealthSnapshot {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage_provider: state.store_provider,
        in_flight: state.governor.in_flight(),
        dead_letters: state.announcer.dead_letters().len(),
    })
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use crashbay_core::pipeline::{Coordinator, Governor};
    use crashbay_core::publish::{Announcer, NoopTransport};
    use crashbay_core::storage::CrashStore;
    use crashbay_shared::config::{LimitsConfig, RetryConfig, StorageProvider};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_pipeline_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(
            CrashStore::from_config(
                &StorageProvider::local_fs(dir.path()),
                Duration::from_secs(5),
            )
            .expect("fs store"),
        );
        let announcer = Arc::new(Announcer::new(
            Arc::new(NoopTransport),
            "crash-ids",
            RetryConfig::default(),
            Duration::from_secs(1),
        ));
        let state = AppState {
            coordinator: Arc::new(Coordinator::new(
                store,
                announcer.clone(),
                RetryConfig::default(),
            )),
            announcer,
            governor: Arc::new(Governor::new(4, 1024)),
            limits: LimitsConfig::default(),
            store_provider: "local",
        };
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["status"], "ok");
        assert_eq!(doc["storage_provider"], "local");
        assert_eq!(doc["in_flight"], 0);
        assert_eq!(doc["dead_letters"], 0);
    }
}
