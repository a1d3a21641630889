//! Crashbay collector
//!
//! Main entry point for the crash report collection service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crashbay_api::{AppState, create_router};
use crashbay_core::pipeline::{Coordinator, Governor};
use crashbay_core::publish::{Announcer, HttpPushTransport, NoopTransport, PublishTransport};
use crashbay_core::storage::CrashStore;
use crashbay_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crashbay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Open the crash store
    let store = CrashStore::from_config(&config.storage, config.timeouts.store_op())?;
    info!(
        provider = config.storage.name(),
        bucket = config.storage.bucket(),
        "Crash store ready"
    );

    // Wire the announcement channel
    let transport: Arc<dyn PublishTransport> = match &config.publish.endpoint {
        Some(endpoint) => {
            info!(endpoint = %endpoint, topic = %config.publish.topic, "Publishing over HTTP push");
            Arc::new(HttpPushTransport::new(endpoint.clone()))
        }
        None => {
            info!("No publish endpoint configured; announcements are dropped");
            Arc::new(NoopTransport)
        }
    };
    let announcer = Arc::new(Announcer::new(
        transport,
        config.publish.topic.clone(),
        config.publish_retry.clone(),
        config.timeouts.publish_op(),
    ));

    // Create application state
    let state = AppState {
        coordinator: Arc::new(Coordinator::new(
            Arc::new(store),
            announcer.clone(),
            config.store_retry.clone(),
        )),
        announcer,
        governor: Arc::new(Governor::new(
            config.governor.max_in_flight,
            config.governor.max_buffered_bytes,
        )),
        limits: config.limits.clone(),
        store_provider: config.storage.name(),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
