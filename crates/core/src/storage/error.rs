//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store temporarily unreachable (network, 5xx, timeout). Retryable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Storage quota exhausted. Not retryable.
    #[error("store quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Credentials rejected or access denied. Not retryable.
    #[error("store permission denied: {0}")]
    PermissionDenied(String),

    /// Object not found.
    #[error("object not found: {key}")]
    NotFound {
        /// Storage key that was not found.
        key: String,
    },

    /// Provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// Metadata document could not be encoded or decoded.
    #[error("metadata serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether the coordinator's retry policy applies.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<opendal::Error> for StoreError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                key: err.to_string(),
            },
            opendal::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            opendal::ErrorKind::ConfigInvalid | opendal::ErrorKind::Unsupported => {
                Self::Configuration(err.to_string())
            }
            // Everything else (rate limiting, 5xx, connection trouble) is
            // worth a bounded retry.
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_split() {
        assert!(StoreError::Unavailable(String::new()).is_transient());
        assert!(!StoreError::QuotaExceeded(String::new()).is_transient());
        assert!(!StoreError::PermissionDenied(String::new()).is_transient());
        assert!(!StoreError::not_found("k").is_transient());
        assert!(!StoreError::configuration("bad").is_transient());
    }
}
