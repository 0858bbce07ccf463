use crate::domain::RetryConfig;
use crate::foundation::util::time::millis_to_nanos;
use crate::foundation::{DEFAULT_INBOX_CAPACITY, NANOS_PER_SECOND};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATA_DIR: &str = ".ocr";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub config_sync: ConfigSyncConfig,
    #[serde(default)]
    pub transmission: TransmissionConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Keys come from the deployment's keyring setup, never from this file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    pub data_dir: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self { data_dir: DEFAULT_DATA_DIR.to_string() }
    }
}

impl NodeSection {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub data_source_timeout_ms: u64,
    pub chain_timeout_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self { data_source_timeout_ms: 2_000, chain_timeout_ms: 5_000 }
    }
}

impl TimeoutsConfig {
    pub fn data_source_timeout(&self) -> Duration {
        Duration::from_millis(self.data_source_timeout_ms)
    }

    pub fn chain_timeout(&self) -> Duration {
        Duration::from_millis(self.chain_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigSyncConfig {
    pub poll_interval_ms: u64,
    /// Re-subscribe period for the config-change stream.
    pub subscribe_interval_ms: u64,
    /// Blocks a config change must be buried under before it is adopted.
    pub confirmations: u64,
}

impl Default for ConfigSyncConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 15_000, subscribe_interval_ms: 120_000, confirmations: 1 }
    }
}

impl ConfigSyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn subscribe_interval(&self) -> Duration {
        Duration::from_millis(self.subscribe_interval_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransmissionConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    pub poll_interval_ms: u64,
    pub confirm_timeout_ms: u64,
    pub pending_retention_secs: u64,
    pub gc_interval_secs: u64,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            poll_interval_ms: 500,
            confirm_timeout_ms: 30_000,
            pending_retention_secs: 86_400,
            gc_interval_secs: 600,
        }
    }
}

impl TransmissionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    /// Pending transmissions created before `now_nanos - retention` are garbage.
    pub fn retention_cutoff_nanos(&self, now_nanos: u64) -> u64 {
        now_nanos.saturating_sub(self.pending_retention_secs.saturating_mul(NANOS_PER_SECOND))
    }

    pub fn confirm_timeout_nanos(&self) -> u64 {
        millis_to_nanos(self.confirm_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub inbox_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { inbox_capacity: DEFAULT_INBOX_CAPACITY }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter string passed to `init_logger`, e.g. `info,ocr_core=debug`.
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), log_dir: None }
    }
}
