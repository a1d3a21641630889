//! Typed crash identifier.
//!
//! A `CrashId` is a UUID v4: 122 bits of randomness, URL-safe in its
//! hyphenated form, and never derived from request content so a client
//! cannot predict or force one. It is assigned exactly once per report,
//! before any storage write, and never reused even after a failure.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a crash report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrashId(pub Uuid);

impl CrashId {
    /// Creates a new random crash id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a crash id from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for CrashId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CrashId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CrashId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
