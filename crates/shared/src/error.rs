//! Application-wide error taxonomy.
//!
//! Submission failures fall into four classes: client errors (rejected,
//! never retried), transient infrastructure errors (retried with bounded
//! backoff, escalating once exhausted), permanent infrastructure errors
//! (surfaced immediately), and busy (admission refused before any work).
//! Announcement failures are deliberately absent: they never surface to
//! the caller, since the crash is already durable by the time an
//! announcement can fail.

use thiserror::Error;

/// Application error types, each mapping to one HTTP outcome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    /// Malformed submission. Rejected with the given reason code, never
    /// retried.
    #[error("client error: {0}")]
    Client(&'static str),

    /// Submission exceeding a configured size limit. Rejected with the
    /// given reason code, never retried.
    #[error("oversized submission: {0}")]
    Oversized(&'static str),

    /// Store temporarily unavailable. Retried per stage policy, bounded;
    /// escalates to a server error once exhausted.
    #[error("transient infrastructure error: {0}")]
    TransientInfrastructure(String),

    /// Auth, quota, or permission failure. Not retried.
    #[error("permanent infrastructure error: {0}")]
    PermanentInfrastructure(String),

    /// Admission refused because a concurrency ceiling is reached.
    #[error("server busy: {0}")]
    Busy(&'static str),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Client(_) => 400,
            Self::Oversized(_) => 413,
            Self::Busy(_) => 503,
            Self::TransientInfrastructure(_) | Self::PermanentInfrastructure(_) => 500,
        }
    }

    /// Returns the short reason code for API responses.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::Client(reason) | Self::Oversized(reason) => reason,
            Self::TransientInfrastructure(_) => "storage_unavailable",
            Self::PermanentInfrastructure(_) => "storage_error",
            Self::Busy(_) => "busy",
        }
    }
}
