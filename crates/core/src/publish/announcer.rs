//! The announcer: publish with bounded retry and dead-letter records.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crashbay_shared::CrashId;
use crashbay_shared::config::RetryConfig;
use tracing::{info, warn};

use super::error::PublishError;
use super::transport::PublishTransport;

/// Record of a publish that exhausted its retries.
///
/// The crash itself is already durable; losing the announcement loses
/// liveness of downstream processing, not data.
#[derive(Debug, Clone)]
pub struct PublishRecord {
    /// The id that could not be announced.
    pub crash_id: CrashId,
    /// How many delivery attempts were made.
    pub attempt_count: u32,
    /// The last error observed.
    pub last_error: String,
}

/// Publishes finalized crash ids, owning the retry/backoff policy and
/// dead-letter handling for the announce stage.
pub struct Announcer {
    transport: Arc<dyn PublishTransport>,
    topic: String,
    retry: RetryConfig,
    op_timeout: Duration,
    dead_letters: Mutex<Vec<PublishRecord>>,
}

impl Announcer {
    /// Create an announcer over the given transport.
    #[must_use]
    pub fn new(
        transport: Arc<dyn PublishTransport>,
        topic: impl Into<String>,
        retry: RetryConfig,
        op_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            topic: topic.into(),
            retry,
            op_timeout,
            dead_letters: Mutex::new(Vec::new()),
        }
    }

    /// Announces one finalized crash id.
    ///
    /// Transient channel failures retry with capped exponential backoff;
    /// every retry reuses the same id, so consumers may see duplicates
    /// (at-least-once). After exhausting retries, or on a permanent
    /// rejection, the id moves to a dead-letter record and the error is
    /// returned - the caller must not fail the submission over it.
    pub async fn announce(&self, crash_id: CrashId) -> Result<(), PublishError> {
        let id = crash_id.to_string();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(
                self.op_timeout,
                self.transport.send(&self.topic, &id),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PublishError::Unavailable("publish timed out".into())),
            };

            match result {
                Ok(()) => {
                    info!(crash_id = %crash_id, transport = self.transport.name(), "announced");
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    tokio::time::sleep(self.retry.backoff_for(attempt - 1)).await;
                }
                Err(e) => {
                    warn!(
                        crash_id = %crash_id,
                        attempts = attempt,
                        error = %e,
                        "stored, not announced; dead-lettering"
                    );
                    self.dead_letters
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .push(PublishRecord {
                            crash_id,
                            attempt_count: attempt,
                            last_error: e.to_string(),
                        });
                    return Err(e);
                }
            }
        }
    }

    /// Snapshot of dead-lettered publishes.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<PublishRecord> {
        self.dead_letters
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}
