//! Retry configuration for optimistic write conflicts.

use backon::ExponentialBuilder;
use std::time::Duration;

/// Configuration for conflict retries with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 32,
            initial_delay_ms: 1,
            max_delay_ms: 50,
        }
    }
}

impl RetryConfig {
    /// Creates a RetryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DOCSEQ_CONFLICT_MAX_RETRIES`: Maximum retry attempts (default: 32)
    /// - `DOCSEQ_CONFLICT_RETRY_INITIAL_MS`: Initial backoff delay in ms (default: 1)
    /// - `DOCSEQ_CONFLICT_RETRY_MAX_MS`: Maximum backoff delay in ms (default: 50)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_retries: std::env::var("DOCSEQ_CONFLICT_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_retries),
            initial_delay_ms: std::env::var("DOCSEQ_CONFLICT_RETRY_INITIAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.initial_delay_ms),
            max_delay_ms: std::env::var("DOCSEQ_CONFLICT_RETRY_MAX_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_delay_ms),
        }
    }

    /// Creates an exponential backoff builder with jitter.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}
