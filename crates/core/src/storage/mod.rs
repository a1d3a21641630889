//! Durable object-store adapter.
//!
//! Reports are written in two phases: `stage` constructs every object
//! under staging keys, then `finalize` atomically promotes them to their
//! final keys. A downstream reader can therefore never observe a final
//! key with incomplete contents.

pub mod error;
pub mod keys;
pub mod service;

use async_trait::async_trait;

pub use error::StoreError;
pub use keys::KeySet;
pub use service::{CrashStore, FinalizedHandle, StagedHandle};

use crate::report::CrashReport;

/// Storage seam for the coordinator.
///
/// Implementations must be safe for concurrent use by many submissions;
/// no cross-submission locking is required since every report owns a
/// distinct key set.
#[async_trait]
pub trait CrashStorage: Send + Sync {
    /// Writes the metadata document and every attachment to staging keys.
    ///
    /// Staging keys are private to this process; nothing downstream reads
    /// them. A retried stage rewrites the same keys from scratch.
    async fn stage(&self, report: &CrashReport) -> Result<StagedHandle, StoreError>;

    /// Promotes every staged object to its final key, then removes the
    /// staging copies. Idempotent: re-invoking after a partial failure
    /// (copy done, staging cleanup lost) succeeds and leaves the store in
    /// the same final state.
    async fn finalize(&self, staged: &StagedHandle) -> Result<FinalizedHandle, StoreError>;

    /// Reads back the finalized metadata document, for verification.
    async fn fetch_metadata(&self, keys: &KeySet) -> Result<serde_json::Value, StoreError>;

    /// Reads back a finalized attachment by name, for verification.
    async fn fetch_attachment(&self, keys: &KeySet, name: &str) -> Result<Vec<u8>, StoreError>;
}
