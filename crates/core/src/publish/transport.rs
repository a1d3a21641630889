//! Publish transports.
//!
//! The channel itself is pluggable behind [`PublishTransport`]. The
//! shipped transport pushes ids over HTTP; a deployment without a
//! downstream queue runs the no-op transport.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::error::PublishError;

/// Seam between the announcer and the concrete channel.
///
/// `send` must return `Ok` only after the channel has confirmed receipt,
/// not merely accepted the message locally.
#[async_trait]
pub trait PublishTransport: Send + Sync {
    /// Delivers one message on `topic` and waits for the channel's ack.
    async fn send(&self, topic: &str, crash_id: &str) -> Result<(), PublishError>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}

/// HTTP push transport: POSTs the crash id to `{endpoint}/{topic}` and
/// treats a 2xx response as the ack.
pub struct HttpPushTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPushTransport {
    /// Create a push transport for the given channel endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PublishTransport for HttpPushTransport {
    async fn send(&self, topic: &str, crash_id: &str) -> Result<(), PublishError> {
        let url = format!("{}/{topic}", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({ "crash_id": crash_id }))
            .send()
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            Err(PublishError::Unavailable(format!(
                "channel returned {status}"
            )))
        } else {
            Err(PublishError::Rejected(format!("channel returned {status}")))
        }
    }

    fn name(&self) -> &'static str {
        "http_push"
    }
}

/// No-op transport: acknowledges every message without delivering it.
/// Used when no channel endpoint is configured.
#[derive(Debug, Default)]
pub struct NoopTransport;

#[async_trait]
impl PublishTransport for NoopTransport {
    async fn send(&self, topic: &str, crash_id: &str) -> Result<(), PublishError> {
        debug!(topic, crash_id, "no-op publish");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
