//! Crash report types and submission state machine.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use crashbay_shared::CrashId;
use tracing::debug;

use crate::id::new_crash_id;

/// A named binary blob attached to a crash submission, usually a minidump.
///
/// The content is never interpreted; only its name, size, and checksum
/// matter to the pipeline.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Sanitized attachment name (form field name in the submission).
    pub name: String,
    /// Raw attachment bytes.
    pub data: Bytes,
}

impl Attachment {
    /// Creates an attachment from a name and its bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Size of the attachment in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Whether the attachment is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decoded submission content, before an identifier is assigned.
#[derive(Debug, Clone, Default)]
pub struct DecodedPayload {
    /// Key/value crash annotations. Keys are lowercased at decode time.
    pub metadata: HashMap<String, String>,
    /// Binary attachments in submission order.
    pub attachments: Vec<Attachment>,
}

/// Submission lifecycle states.
///
/// `Failed` is reachable from any state before `Finalized`; once a report
/// finalizes, an announcement failure does not revert it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    /// Accepted by the governor, body not yet decoded.
    Received,
    /// Payload decoded into metadata and attachments.
    Decoded,
    /// All objects written to staging keys.
    Staged,
    /// Atomically promoted to final keys; durable and discoverable.
    Finalized,
    /// Crash id delivered to the publish channel.
    Announced,
    /// Terminal failure before finalization.
    Failed,
}

impl ReportState {
    /// Lowercase name for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Decoded => "decoded",
            Self::Staged => "staged",
            Self::Finalized => "finalized",
            Self::Announced => "announced",
            Self::Failed => "failed",
        }
    }
}

/// The unit of work flowing through the pipeline.
///
/// The coordinator exclusively owns state transitions; the store adapter
/// and announcer only ever read from the report.
#[derive(Debug)]
pub struct CrashReport {
    /// Assigned exactly once, before any storage write, never reused.
    pub crash_id: CrashId,
    /// When the submission was accepted.
    pub received_at: DateTime<Utc>,
    /// Crash annotations, lowercased keys.
    pub metadata: HashMap<String, String>,
    /// Binary attachments in submission order.
    pub attachments: Vec<Attachment>,
    state: ReportState,
}

impl CrashReport {
    /// Builds a report from a decoded payload, assigning a fresh crash id
    /// and stamping the receive time.
    #[must_use]
    pub fn from_payload(payload: DecodedPayload) -> Self {
        Self {
            crash_id: new_crash_id(),
            received_at: Utc::now(),
            metadata: payload.metadata,
            attachments: payload.attachments,
            state: ReportState::Decoded,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ReportState {
        self.state
    }

    /// Advances the lifecycle state, emitting an observability event.
    pub fn set_state(&mut self, state: ReportState) {
        debug!(crash_id = %self.crash_id, from = self.state.as_str(), to = state.as_str(), "state transition");
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_with(meta: &[(&str, &str)]) -> DecodedPayload {
        DecodedPayload {
            metadata: meta
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            attachments: vec![Attachment::new("upload_file_minidump", vec![1u8, 2, 3])],
        }
    }

    #[test]
    fn test_from_payload_assigns_id_and_state() {
        let report = CrashReport::from_payload(payload_with(&[("productname", "Test")]));
        assert_eq!(report.state(), ReportState::Decoded);
        assert_eq!(report.metadata["productname"], "Test");
        assert_eq!(report.attachments.len(), 1);
        assert_eq!(report.attachments[0].len(), 3);
    }

    #[test]
    fn test_ids_differ_across_reports() {
        let a = CrashReport::from_payload(DecodedPayload::default());
        let b = CrashReport::from_payload(DecodedPayload::default());
        assert_ne!(a.crash_id, b.crash_id);
    }

    #[test]
    fn test_state_transitions() {
        let mut report = CrashReport::from_payload(DecodedPayload::default());
        report.set_state(ReportState::Staged);
        report.set_state(ReportState::Finalized);
        assert_eq!(report.state(), ReportState::Finalized);
        assert_eq!(report.state().as_str(), "finalized");
    }
}
