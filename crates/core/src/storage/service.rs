//! Two-phase crash store implementation using Apache OpenDAL.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use crashbay_shared::CrashId;
use crashbay_shared::config::StorageProvider;
use opendal::{Operator, services};
use tracing::debug;

use super::error::StoreError;
use super::keys::KeySet;
use super::CrashStorage;
use crate::report::CrashReport;

/// One staged object and the final key it will be promoted to.
#[derive(Debug, Clone)]
pub struct StagedObject {
    /// Staging location, private to this process.
    pub staging_key: String,
    /// Final, downstream-visible location.
    pub final_key: String,
}

/// Proof that a report's objects are fully written to staging keys.
#[derive(Debug, Clone)]
pub struct StagedHandle {
    keys: KeySet,
    objects: Vec<StagedObject>,
}

impl StagedHandle {
    /// The crash id this handle belongs to.
    #[must_use]
    pub const fn crash_id(&self) -> CrashId {
        self.keys.crash_id()
    }

    /// Key layout for the report.
    #[must_use]
    pub const fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// The staged objects and their promotion targets.
    #[must_use]
    pub fn objects(&self) -> &[StagedObject] {
        &self.objects
    }
}

/// Proof that a report is durable and discoverable at its final keys.
#[derive(Debug, Clone)]
pub struct FinalizedHandle {
    keys: KeySet,
}

impl FinalizedHandle {
    /// The crash id this handle belongs to.
    #[must_use]
    pub const fn crash_id(&self) -> CrashId {
        self.keys.crash_id()
    }

    /// Key layout for the report.
    #[must_use]
    pub const fn keys(&self) -> &KeySet {
        &self.keys
    }
}

/// Object-store adapter for crash reports.
///
/// Safe for concurrent use: every submission owns a distinct key set, so
/// no cross-submission coordination is needed.
pub struct CrashStore {
    operator: Operator,
    provider_name: &'static str,
    op_timeout: Duration,
}

impl CrashStore {
    /// Create a crash store from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(
        provider: &StorageProvider,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let operator = Self::create_operator(provider)?;
        Ok(Self {
            operator,
            provider_name: provider.name(),
            op_timeout,
        })
    }

    /// Create an OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StoreError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Ok(Operator::new(builder)
                    .map_err(|e| StoreError::configuration(e.to_string()))?
                    .finish())
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StoreError::configuration("invalid path"))?,
                );

                Ok(Operator::new(builder)
                    .map_err(|e| StoreError::configuration(e.to_string()))?
                    .finish())
            }
        }
    }

    /// Get the storage provider name.
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        self.provider_name
    }

    /// Check whether an object exists.
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.bounded(self.operator.stat(key)).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run a store operation under the per-operation timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, opendal::Error>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StoreError::from(e)),
            Err(_) => Err(StoreError::Unavailable("store operation timed out".into())),
        }
    }

    /// Promote one staged object. Idempotent: a missing staging copy with
    /// an existing final copy means an earlier finalize got as far as the
    /// copy before losing the staging cleanup.
    async fn promote(&self, object: &StagedObject) -> Result<(), StoreError> {
        match self
            .bounded(self.operator.copy(&object.staging_key, &object.final_key))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                if self.exists(&object.final_key).await? {
                    debug!(key = %object.final_key, "already promoted, skipping");
                    Ok(())
                } else {
                    Err(StoreError::not_found(object.staging_key.clone()))
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CrashStorage for CrashStore {
    async fn stage(&self, report: &CrashReport) -> Result<StagedHandle, StoreError> {
        let keys = KeySet::new(report.crash_id, report.received_at);
        let mut objects = Vec::with_capacity(report.attachments.len() + 1);

        let doc = serde_json::to_vec(&report.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.bounded(self.operator.write(&keys.staging_metadata(), doc))
            .await?;
        objects.push(StagedObject {
            staging_key: keys.staging_metadata(),
            final_key: keys.final_metadata(),
        });

        for attachment in &report.attachments {
            self.bounded(
                self.operator
                    .write(&keys.staging_attachment(&attachment.name), attachment.data.clone()),
            )
            .await?;
            objects.push(StagedObject {
                staging_key: keys.staging_attachment(&attachment.name),
                final_key: keys.final_attachment(&attachment.name),
            });
        }

        debug!(crash_id = %report.crash_id, objects = objects.len(), "staged");
        Ok(StagedHandle { keys, objects })
    }

    async fn finalize(&self, staged: &StagedHandle) -> Result<FinalizedHandle, StoreError> {
        // Copy everything first, delete staging second: a failure between
        // the two leaves staging intact so a retried finalize converges on
        // the same final state.
        for object in &staged.objects {
            self.promote(object).await?;
        }

        for object in &staged.objects {
            match self.bounded(self.operator.delete(&object.staging_key)).await {
                Ok(()) | Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        debug!(crash_id = %staged.crash_id(), "finalized");
        Ok(FinalizedHandle {
            keys: staged.keys.clone(),
        })
    }

    async fn fetch_metadata(&self, keys: &KeySet) -> Result<serde_json::Value, StoreError> {
        let buf = self.bounded(self.operator.read(&keys.final_metadata())).await?;
        serde_json::from_slice(&buf.to_vec())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn fetch_attachment(&self, keys: &KeySet, name: &str) -> Result<Vec<u8>, StoreError> {
        let buf = self
            .bounded(self.operator.read(&keys.final_attachment(name)))
            .await?;
        Ok(buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Attachment, CrashReport, DecodedPayload};
    use std::collections::HashMap;

    fn fs_store(root: &std::path::Path) -> CrashStore {
        let provider = StorageProvider::local_fs(root);
        CrashStore::from_config(&provider, Duration::from_secs(5)).expect("fs store")
    }

    fn sample_report() -> CrashReport {
        let mut metadata = HashMap::new();
        metadata.insert("productname".to_string(), "TestProduct".to_string());
        metadata.insert("version".to_string(), "1.0".to_string());
        CrashReport::from_payload(DecodedPayload {
            metadata,
            attachments: vec![Attachment::new(
                "upload_file_minidump",
                vec![0xABu8; 10 * 1024],
            )],
        })
    }

    #[tokio::test]
    async fn test_stage_writes_staging_keys_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fs_store(dir.path());
        let report = sample_report();

        let staged = store.stage(&report).await.expect("stage");
        assert_eq!(staged.objects().len(), 2);
        assert!(store.exists(&staged.keys().staging_metadata()).await.unwrap());
        assert!(!store.exists(&staged.keys().final_metadata()).await.unwrap());
    }

    #[tokio::test]
    async fn test_finalize_promotes_and_cleans_staging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fs_store(dir.path());
        let report = sample_report();

        let staged = store.stage(&report).await.expect("stage");
        let finalized = store.finalize(&staged).await.expect("finalize");

        assert!(store.exists(&finalized.keys().final_metadata()).await.unwrap());
        assert!(
            store
                .exists(&finalized.keys().final_attachment("upload_file_minidump"))
                .await
                .unwrap()
        );
        assert!(!store.exists(&staged.keys().staging_metadata()).await.unwrap());
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fs_store(dir.path());
        let report = sample_report();

        let staged = store.stage(&report).await.expect("stage");
        store.finalize(&staged).await.expect("first finalize");
        // Staging is gone, final objects are present: the re-invoke must
        // succeed without touching final state.
        let again = store.finalize(&staged).await.expect("second finalize");

        let doc = store.fetch_metadata(again.keys()).await.expect("read back");
        assert_eq!(doc["productname"], "TestProduct");
    }

    #[tokio::test]
    async fn test_round_trip_fidelity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fs_store(dir.path());
        let report = sample_report();
        let original = report.attachments[0].data.clone();

        let staged = store.stage(&report).await.expect("stage");
        let finalized = store.finalize(&staged).await.expect("finalize");

        let bytes = store
            .fetch_attachment(finalized.keys(), "upload_file_minidump")
            .await
            .expect("read back");
        assert_eq!(bytes, original.to_vec());

        let doc = store.fetch_metadata(finalized.keys()).await.expect("doc");
        assert_eq!(doc["version"], "1.0");
    }

    #[tokio::test]
    async fn test_restage_then_finalize_yields_one_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fs_store(dir.path());
        let report = sample_report();

        // A retried stage rewrites the same staging keys; the final tree
        // must hold exactly one copy.
        store.stage(&report).await.expect("first stage");
        let staged = store.stage(&report).await.expect("second stage");
        let finalized = store.finalize(&staged).await.expect("finalize");

        let partition_dir = dir
            .path()
            .join("v1/crash")
            .join(finalized.keys().date_partition());
        let entries: Vec<_> = std::fs::read_dir(&partition_dir)
            .expect("partition dir")
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
