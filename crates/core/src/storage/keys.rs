//! Storage key derivation.
//!
//! Keys are derived deterministically from the crash id and a date
//! partition taken from the receive time:
//!
//! - staging: `v1/stage/{crash_id}/...`
//! - final:   `v1/crash/{YYYYMMDD}/{crash_id}/...`
//!
//! Staging and final keys are always distinct, and staging keys are only
//! ever touched by the process that created them.

use chrono::{DateTime, Utc};
use crashbay_shared::CrashId;

/// Name of the metadata document object under a report's key root.
pub const METADATA_OBJECT: &str = "metadata.json";

/// Key layout for one crash report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    crash_id: CrashId,
    date_partition: String,
}

impl KeySet {
    /// Derives the key set for a report received at `received_at`.
    #[must_use]
    pub fn new(crash_id: CrashId, received_at: DateTime<Utc>) -> Self {
        Self {
            crash_id,
            date_partition: received_at.format("%Y%m%d").to_string(),
        }
    }

    /// The crash id these keys belong to.
    #[must_use]
    pub const fn crash_id(&self) -> CrashId {
        self.crash_id
    }

    /// The `YYYYMMDD` partition component.
    #[must_use]
    pub fn date_partition(&self) -> &str {
        &self.date_partition
    }

    /// Staging key for the metadata document.
    #[must_use]
    pub fn staging_metadata(&self) -> String {
        format!("v1/stage/{}/{METADATA_OBJECT}", self.crash_id)
    }

    /// Final key for the metadata document.
    #[must_use]
    pub fn final_metadata(&self) -> String {
        format!(
            "v1/crash/{}/{}/{METADATA_OBJECT}",
            self.date_partition, self.crash_id
        )
    }

    /// Staging key for a named attachment.
    #[must_use]
    pub fn staging_attachment(&self, name: &str) -> String {
        format!("v1/stage/{}/dumps/{name}", self.crash_id)
    }

    /// Final key for a named attachment.
    #[must_use]
    pub fn final_attachment(&self, name: &str) -> String {
        format!(
            "v1/crash/{}/{}/dumps/{name}",
            self.date_partition, self.crash_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn keys_at(y: i32, m: u32, d: u32) -> KeySet {
        let at = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        KeySet::new(CrashId::new(), at)
    }

    #[test]
    fn test_date_partition_format() {
        let keys = keys_at(2026, 3, 7);
        assert_eq!(keys.date_partition(), "20260307");
        assert!(keys.final_metadata().contains("/20260307/"));
    }

    #[test]
    fn test_staging_and_final_are_distinct() {
        let keys = keys_at(2026, 1, 1);
        assert_ne!(keys.staging_metadata(), keys.final_metadata());
        assert_ne!(
            keys.staging_attachment("upload_file_minidump"),
            keys.final_attachment("upload_file_minidump")
        );
        assert!(keys.staging_metadata().starts_with("v1/stage/"));
        assert!(keys.final_metadata().starts_with("v1/crash/"));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let id = CrashId::new();
        let at = Utc.with_ymd_and_hms(2026, 8, 24, 3, 4, 5).unwrap();
        assert_eq!(KeySet::new(id, at), KeySet::new(id, at));
    }

    proptest! {
        // Distinct crash ids can never collide on any derived key.
        #[test]
        fn prop_keys_isolated_per_report(name in "[a-z0-9_.-]{1,30}") {
            let at = Utc::now();
            let a = KeySet::new(CrashId::new(), at);
            let b = KeySet::new(CrashId::new(), at);
            prop_assert_ne!(a.staging_attachment(&name), b.staging_attachment(&name));
            prop_assert_ne!(a.final_attachment(&name), b.final_attachment(&name));
        }
    }
}
