//! Application configuration management.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object store configuration.
    #[serde(default)]
    pub storage: StorageProvider,
    /// Publish channel configuration.
    #[serde(default)]
    pub publish: PublishConfig,
    /// Payload size limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Concurrency ceilings.
    #[serde(default)]
    pub governor: GovernorConfig,
    /// Retry policy for store writes.
    #[serde(default)]
    pub store_retry: RetryConfig,
    /// Retry policy for channel publishes.
    #[serde(default = "RetryConfig::publish_default")]
    pub publish_retry: RetryConfig,
    /// Per-stage timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Object store provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: AWS S3, Cloudflare R2, MinIO.
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Region.
        region: String,
    },
    /// Local filesystem (development and tests only).
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
}

impl StorageProvider {
    /// Create an S3-compatible provider.
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Create a local filesystem provider.
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Provider name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::LocalFs { .. } => "local",
        }
    }

    /// Bucket or root this provider writes into.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } => bucket,
            Self::LocalFs { root } => root.to_str().unwrap_or("local"),
        }
    }
}

impl Default for StorageProvider {
    fn default() -> Self {
        Self::local_fs("./crash_store")
    }
}

/// Publish channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    /// Channel endpoint URL. When absent, announcements are logged and
    /// dropped (no-op transport), matching a collector deployed without a
    /// downstream queue.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Topic to publish crash ids on.
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String {
    "crash-ids".to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            topic: default_topic(),
        }
    }
}

/// Payload size limits, enforced incrementally while the body streams in.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum size of a single attachment in bytes.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
    /// Maximum cumulative submission size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
    /// Cap on a single metadata value; longer values are truncated.
    #[serde(default = "default_max_metadata_value_bytes")]
    pub max_metadata_value_bytes: usize,
    /// Maximum number of metadata fields accepted.
    #[serde(default = "default_max_metadata_fields")]
    pub max_metadata_fields: usize,
    /// Prefix prepended to crash ids in submission responses.
    #[serde(default = "default_dump_id_prefix")]
    pub dump_id_prefix: String,
}

fn default_max_attachment_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_body_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_max_metadata_value_bytes() -> usize {
    8 * 1024
}

fn default_max_metadata_fields() -> usize {
    256
}

fn default_dump_id_prefix() -> String {
    "bp-".to_string()
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: default_max_attachment_bytes(),
            max_body_bytes: default_max_body_bytes(),
            max_metadata_value_bytes: default_max_metadata_value_bytes(),
            max_metadata_fields: default_max_metadata_fields(),
            dump_id_prefix: default_dump_id_prefix(),
        }
    }
}

/// Concurrency ceilings for the admission governor.
#[derive(Debug, Clone, Deserialize)]
pub struct GovernorConfig {
    /// Maximum number of submissions in flight at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Maximum total bytes buffered across all in-flight submissions.
    #[serde(default = "default_max_buffered_bytes")]
    pub max_buffered_bytes: u64,
}

fn default_max_in_flight() -> usize {
    32
}

fn default_max_buffered_bytes() -> u64 {
    256 * 1024 * 1024
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            max_buffered_bytes: default_max_buffered_bytes(),
        }
    }
}

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts before giving up (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Ceiling on the delay between retries, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    2000
}

impl RetryConfig {
    fn publish_default() -> Self {
        Self::default()
    }

    /// Backoff delay for a given zero-based retry index.
    #[must_use]
    pub fn backoff_for(&self, retry_index: u32) -> Duration {
        let exp = self
            .initial_backoff_ms
            .saturating_mul(1u64 << retry_index.min(16));
        Duration::from_millis(exp.min(self.max_backoff_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Per-stage timeouts, distinct from any overall request timeout.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for a single object-store operation, in seconds.
    #[serde(default = "default_store_op_secs")]
    pub store_op_secs: u64,
    /// Timeout for a single channel publish, in seconds.
    #[serde(default = "default_publish_op_secs")]
    pub publish_op_secs: u64,
}

fn default_store_op_secs() -> u64 {
    30
}

fn default_publish_op_secs() -> u64 {
    10
}

impl TimeoutConfig {
    /// Store operation timeout as a [`Duration`].
    #[must_use]
    pub fn store_op(&self) -> Duration {
        Duration::from_secs(self.store_op_secs)
    }

    /// Publish operation timeout as a [`Duration`].
    #[must_use]
    pub fn publish_op(&self) -> Duration {
        Duration::from_secs(self.publish_op_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store_op_secs: default_store_op_secs(),
            publish_op_secs: default_publish_op_secs(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CRASHBAY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.limits.dump_id_prefix, "bp-");
        assert_eq!(config.governor.max_in_flight, 32);
        assert!(config.publish.endpoint.is_none());
        assert_eq!(config.storage.name(), "local");
    }

    #[rstest]
    #[case(0, 50)]
    #[case(1, 100)]
    #[case(2, 200)]
    #[case(3, 300)] // capped
    #[case(10, 300)]
    fn test_backoff_grows_and_caps(#[case] retry_index: u32, #[case] expected_ms: u64) {
        let retry = RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 300,
        };
        assert_eq!(
            retry.backoff_for(retry_index),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn test_backoff_shift_does_not_overflow() {
        let retry = RetryConfig {
            max_attempts: 64,
            initial_backoff_ms: u64::MAX / 2,
            max_backoff_ms: 1000,
        };
        assert_eq!(retry.backoff_for(63), Duration::from_millis(1000));
    }

    #[test]
    fn test_storage_provider_names() {
        let s3 = StorageProvider::s3("http://localhost:9000", "crashes", "ak", "sk", "auto");
        assert_eq!(s3.name(), "s3");
        assert_eq!(s3.bucket(), "crashes");

        let fs = StorageProvider::local_fs("./crash_store");
        assert_eq!(fs.name(), "local");
    }
}
