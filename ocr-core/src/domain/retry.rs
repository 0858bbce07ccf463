use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { base_delay_ms: 1_000, max_delay_ms: 30_000, backoff_multiplier: 2.0, jitter_ms: 100 }
    }
}

impl RetryConfig {
    /// Backoff before retry number `retry_count` (1-based), capped at `max_delay_ms`.
    pub fn delay_for_retry(&self, retry_count: u32) -> u64 {
        let exponent = retry_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = (self.base_delay_ms as f64) * self.backoff_multiplier.powi(exponent);
        (base.min(self.max_delay_ms as f64)) as u64
    }

    /// `delay_for_retry` plus a caller-supplied jitter sample, clamped to `jitter_ms`.
    pub fn jittered_delay(&self, retry_count: u32, jitter_sample_ms: u64) -> Duration {
        Duration::from_millis(self.delay_for_retry(retry_count).saturating_add(jitter_sample_ms.min(self.jitter_ms)))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms == 0 {
            return Err("retry.base_delay_ms must be > 0".to_string());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("retry.max_delay_ms must be >= retry.base_delay_ms".to_string());
        }
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0) {
            return Err("retry.backoff_multiplier must be >= 1.0".to_string());
        }
        Ok(())
    }
}
