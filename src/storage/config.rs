use std::path::PathBuf;

use crate::storage::RetryConfig;

/// Configuration for the RocksDB-backed counter store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the RocksDB files.
    pub data_dir: PathBuf,
    /// Backoff applied when an optimistic advance loses a write conflict.
    pub retry: RetryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            retry: RetryConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Creates a StoreConfig from environment variables.
    ///
    /// `DOCSEQ_DATA_DIR` selects the data directory (default: `./data`);
    /// retry settings are read by [`RetryConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("DOCSEQ_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::default().data_dir),
            retry: RetryConfig::from_env(),
        }
    }

    /// Returns the default config rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }
}
