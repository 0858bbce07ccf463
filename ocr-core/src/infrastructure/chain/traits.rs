use crate::domain::{ContractConfig, SignatureShare, TransmissionDetails};
use crate::foundation::{ConfigDigest, OcrError};
use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub type Result<T> = std::result::Result<T, OcrError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxHandle(pub String);

/// Where the latest config was set, as reported by the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigDetails {
    pub changed_in_block: u64,
    pub config_digest: ConfigDigest,
}

/// Push notifications of config changes. Ends when the underlying subscription drops.
pub type ConfigSubscription = BoxStream<'static, ConfigDetails>;

/// Submits reports. Callers apply their own deadline with `tokio::time::timeout`.
#[async_trait]
pub trait ContractTransmitter: Send + Sync {
    async fn transmit(&self, report: &[u8], shares: &[SignatureShare]) -> Result<TxHandle>;
    async fn latest_transmission_details(&self) -> Result<TransmissionDetails>;
}

#[async_trait]
pub trait ConfigTracker: Send + Sync {
    /// `None` until a config has ever been set.
    async fn latest_config_details(&self) -> Result<Option<ConfigDetails>>;
    async fn config_from_logs(&self, changed_in_block: u64) -> Result<ContractConfig>;
    async fn latest_block_height(&self) -> Result<u64>;
    async fn subscribe(&self) -> Result<ConfigSubscription>;
}
