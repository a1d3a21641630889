//! Publish channel error types.

use thiserror::Error;

/// Publish operation errors.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Channel temporarily unreachable (network, 5xx, timeout). Retryable.
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// Channel refused the message (auth, bad topic). Not retryable.
    #[error("channel rejected publish: {0}")]
    Rejected(String),

    /// Transport configuration error.
    #[error("publish configuration error: {0}")]
    Configuration(String),
}

impl PublishError {
    /// Whether the announcer's retry policy applies.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
