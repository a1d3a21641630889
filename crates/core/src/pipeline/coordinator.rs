//! The ingestion coordinator: one submission's path from decoded payload
//! to durable, announced crash report.
//!
//! State machine per submission:
//! `Received -> Decoded -> Staged -> Finalized -> Announced`, with
//! `Failed` reachable from any state before `Finalized`. Stage and
//! finalize are retried as a pair on transient store errors (staging is
//! cheap to redo; a partial stage is never resumed). Announcement failure
//! never fails the submission - the crash is already durable.

use std::sync::Arc;

use chrono::SecondsFormat;
use crashbay_shared::config::RetryConfig;
use crashbay_shared::{AppError, CrashId};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info};

use crate::publish::Announcer;
use crate::report::{CrashReport, DecodedPayload, ReportState};
use crate::storage::{CrashStorage, FinalizedHandle, KeySet, StoreError};

/// Attachment name breakpad clients use for the main minidump.
pub const MINIDUMP_FIELD: &str = "upload_file_minidump";

/// Submission failure visible to the caller. Only failures before
/// finalization ever surface; an unannounced-but-stored crash reports
/// success.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The store could not durably accept the report.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Store(e) if e.is_transient() => {
                Self::TransientInfrastructure(e.to_string())
            }
            IngestError::Store(e) => Self::PermanentInfrastructure(e.to_string()),
        }
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The assigned crash id, returned to the caller.
    pub crash_id: CrashId,
    /// Whether the announcement went through. A `false` here is
    /// "stored, not announced" - success as far as the client knows.
    pub announced: bool,
    /// Final key layout, for read-back.
    pub keys: KeySet,
}

/// A report made durable at its final keys, awaiting announcement.
///
/// The caller already has everything the client needs (the crash id);
/// announcing can happen after the response is written.
#[derive(Debug)]
pub struct PersistedReport {
    report: CrashReport,
    keys: KeySet,
}

impl PersistedReport {
    /// The assigned crash id.
    #[must_use]
    pub const fn crash_id(&self) -> CrashId {
        self.report.crash_id
    }

    /// Final key layout, for read-back.
    #[must_use]
    pub const fn keys(&self) -> &KeySet {
        &self.keys
    }
}

/// Orchestrates the pipeline stages for each submission.
pub struct Coordinator {
    store: Arc<dyn CrashStorage>,
    announcer: Arc<Announcer>,
    store_retry: RetryConfig,
}

impl Coordinator {
    /// Create a coordinator over a store and an announcer.
    #[must_use]
    pub fn new(
        store: Arc<dyn CrashStorage>,
        announcer: Arc<Announcer>,
        store_retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            announcer,
            store_retry,
        }
    }

    /// Runs one decoded submission through assign-id, stage, and
    /// finalize. The returned report is durable; announcing it is a
    /// separate step so the caller can respond to the client first.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] only when the report could not be made
    /// durable; by then no final key is visible downstream.
    pub async fn persist(&self, payload: DecodedPayload) -> Result<PersistedReport, IngestError> {
        let mut report = CrashReport::from_payload(payload);
        self.stamp(&mut report);
        info!(crash_id = %report.crash_id, attachments = report.attachments.len(), "ingesting");

        let finalized = match self.save(&mut report).await {
            Ok(handle) => handle,
            Err(e) => {
                report.set_state(ReportState::Failed);
                error!(crash_id = %report.crash_id, error = %e, "save failed");
                return Err(e.into());
            }
        };
        report.set_state(ReportState::Finalized);
        info!(crash_id = %report.crash_id, "saved");

        let keys = finalized.keys().clone();
        Ok(PersistedReport { report, keys })
    }

    /// Announces a persisted report, consuming it. Announcement failure
    /// is dead-lettered inside the announcer and reported as
    /// `announced: false`; the submission already succeeded.
    pub async fn announce(&self, persisted: PersistedReport) -> IngestOutcome {
        let mut report = persisted.report;
        let announced = match self.announcer.announce(report.crash_id).await {
            Ok(()) => {
                report.set_state(ReportState::Announced);
                true
            }
            Err(_) => false,
        };

        IngestOutcome {
            crash_id: report.crash_id,
            announced,
            keys: persisted.keys,
        }
    }

    /// Persist then announce, back to back. Callers that answer a client
    /// in between use [`Coordinator::persist`] and
    /// [`Coordinator::announce`] directly.
    pub async fn ingest(&self, payload: DecodedPayload) -> Result<IngestOutcome, IngestError> {
        let persisted = self.persist(payload).await?;
        Ok(self.announce(persisted).await)
    }

    /// Stamps server-side metadata: submission timestamp and attachment
    /// checksums. A resubmitted `dump_checksums` field was already
    /// stripped at decode time.
    fn stamp(&self, report: &mut CrashReport) {
        report.metadata.insert(
            "submitted_timestamp".to_string(),
            report
                .received_at
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        );

        let checksums: std::collections::BTreeMap<&str, String> = report
            .attachments
            .iter()
            .map(|a| (a.name.as_str(), format!("{:x}", Sha256::digest(&a.data))))
            .collect();

        if let Some(minidump_hash) = checksums.get(MINIDUMP_FIELD) {
            report
                .metadata
                .insert("minidump_sha256_hash".to_string(), minidump_hash.clone());
        }
        if let Ok(encoded) = serde_json::to_string(&checksums) {
            report
                .metadata
                .insert("dump_checksums".to_string(), encoded);
        }
    }

    /// Stage-then-finalize, retried as a pair with capped backoff on
    /// transient store errors. Re-staging rewrites the same keys, so a
    /// retried save can never produce duplicate finalized artifacts.
    async fn save(&self, report: &mut CrashReport) -> Result<FinalizedHandle, StoreError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.stage_and_finalize(report).await {
                Ok(handle) => return Ok(handle),
                Err(e) if e.is_transient() && attempt < self.store_retry.max_attempts => {
                    info!(
                        crash_id = %report.crash_id,
                        attempt,
                        error = %e,
                        "transient store error, retrying save"
                    );
                    tokio::time::sleep(self.store_retry.backoff_for(attempt - 1)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn stage_and_finalize(
        &self,
        report: &mut CrashReport,
    ) -> Result<FinalizedHandle, StoreError> {
        let staged = self.store.stage(report).await?;
        report.set_state(ReportState::Staged);
        self.store.finalize(&staged).await
    }
}
