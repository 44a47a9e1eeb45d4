//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base URL presented in signed download links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Enable the /metrics endpoint for Prometheus scraping.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_url: default_base_url(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Signed download link configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Secret for the link HMAC. Must be identical across replicas.
    pub secret: String,
    /// Link lifetime in seconds.
    #[serde(default = "default_link_expire_secs")]
    pub expire_secs: u64,
}

fn default_link_expire_secs() -> u64 {
    86400 // 24 hours
}

impl DownloadConfig {
    /// Get the link lifetime as a Duration.
    pub fn expire(&self) -> Duration {
        let secs = i64::try_from(self.expire_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for artifact payloads.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// Force path-style URLs. Required for MinIO and some
        /// S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database file.
    Sqlite { path: PathBuf },
}

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub download: DownloadConfig,
}

impl AppConfig {
    /// Create a test configuration rooted at a temporary directory.
    ///
    /// **For testing only.** The download secret is fixed and well known.
    pub fn for_testing(root: &std::path::Path) -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::Filesystem {
                path: root.join("storage"),
            },
            metadata: MetadataConfig::Sqlite {
                path: root.join("metadata.db"),
            },
            download: DownloadConfig {
                secret: "test-download-secret".to_string(),
                expire_secs: default_link_expire_secs(),
            },
        }
    }
}
