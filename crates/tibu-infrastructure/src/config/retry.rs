use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for transient collection failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds (default: 1000ms)
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds (default: 10000ms)
    pub max_backoff_ms: u64,
    /// Backoff multiplier (default: 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based). Exponential with cap.
    pub fn backoff(&self, retry: u32) -> Duration {
        let mut backoff_ms = self.initial_backoff_ms;
        for _ in 1..retry {
            backoff_ms = ((backoff_ms as f64 * self.backoff_multiplier) as u64)
                .min(self.max_backoff_ms);
        }
        Duration::from_millis(backoff_ms.min(self.max_backoff_ms))
    }
}
