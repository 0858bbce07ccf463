use super::traits::{ConfigDetails, ConfigSubscription, ConfigTracker, ContractTransmitter, Result, TxHandle};
use crate::domain::{ContractConfig, OnchainVerifier, Report, SignatureShare, TransmissionDetails};
use crate::foundation::{now_nanos, OcrError, OracleId};
use crate::infrastructure::keys::SignerSetVerifier;
use async_trait::async_trait;
use log::{debug, info};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

const CONFIG_NOTIFY_CAPACITY: usize = 16;

/// A report the contract accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedTransmission {
    pub report: Report,
    pub signers: Vec<OracleId>,
    pub block: u64,
}

#[derive(Default)]
struct ChainInner {
    block_height: u64,
    configs: Vec<(u64, ContractConfig)>,
    latest: TransmissionDetails,
    accepted: Vec<AcceptedTransmission>,
    attempts: u64,
    fail_next_transmits: u32,
    fail_details: bool,
}

/// Contract double: verifies digests and shares, reverts stale reports, supports failure injection.
pub struct MockChain {
    inner: Mutex<ChainInner>,
    notify: broadcast::Sender<ConfigDetails>,
}

impl MockChain {
    pub fn new() -> Self {
        Self { inner: Mutex::new(ChainInner::default()), notify: broadcast::channel(CONFIG_NOTIFY_CAPACITY).0 }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, ChainInner>> {
        self.inner.lock().map_err(|_| OcrError::chain("mock chain lock", "poisoned"))
    }

    /// Emits a config-set event in a new block.
    pub fn set_config(&self, config: ContractConfig) -> Result<ConfigDetails> {
        let details = {
            let mut inner = self.lock_inner()?;
            inner.block_height += 1;
            let block = inner.block_height;
            let details = ConfigDetails { changed_in_block: block, config_digest: config.config_digest };
            inner.configs.push((block, config));
            details
        };
        info!("mock chain config set config_digest={:#x} block={}", details.config_digest, details.changed_in_block);
        let _ = self.notify.send(details);
        Ok(details)
    }

    pub fn advance_blocks(&self, blocks: u64) -> Result<u64> {
        let mut inner = self.lock_inner()?;
        inner.block_height = inner.block_height.saturating_add(blocks);
        Ok(inner.block_height)
    }

    /// The next `count` transmit calls fail before reaching the contract.
    pub fn fail_next_transmits(&self, count: u32) -> Result<()> {
        self.lock_inner()?.fail_next_transmits = count;
        Ok(())
    }

    pub fn set_fail_details(&self, fail: bool) -> Result<()> {
        self.lock_inner()?.fail_details = fail;
        Ok(())
    }

    pub fn accepted(&self) -> Result<Vec<AcceptedTransmission>> {
        Ok(self.lock_inner()?.accepted.clone())
    }

    pub fn transmit_attempts(&self) -> Result<u64> {
        Ok(self.lock_inner()?.attempts)
    }

    fn current_config(inner: &ChainInner) -> Result<&ContractConfig> {
        inner.configs.last().map(|(_, config)| config).ok_or_else(|| OcrError::chain("transmit", "contract not configured"))
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContractTransmitter for MockChain {
    async fn transmit(&self, report_bytes: &[u8], shares: &[SignatureShare]) -> Result<TxHandle> {
        let mut inner = self.lock_inner()?;
        inner.attempts += 1;
        if inner.fail_next_transmits > 0 {
            inner.fail_next_transmits -= 1;
            return Err(OcrError::chain("transmit", "injected failure"));
        }
        let report = Report::decode(report_bytes).map_err(|err| OcrError::chain("transmit", err))?;
        let config = Self::current_config(&inner)?;
        if report.key.config_digest != config.config_digest {
            return Err(OcrError::chain("transmit", format!("config digest mismatch report={:#x}", report.key.config_digest)));
        }

        let verifier = SignerSetVerifier::from_config(config);
        let report_hash = report.hash();
        let mut signers = BTreeSet::new();
        for share in shares {
            if !verifier.verify_share(&report_hash, share) {
                return Err(OcrError::chain("transmit", format!("invalid share signer={}", share.signer)));
            }
            if !signers.insert(share.signer) {
                return Err(OcrError::chain("transmit", format!("duplicate signer={}", share.signer)));
            }
        }
        let required = usize::from(config.threshold) + 1;
        if signers.len() < required {
            return Err(OcrError::chain("transmit", format!("insufficient signatures required={} got={}", required, signers.len())));
        }
        if inner.latest.supersedes(&report.key) {
            return Err(OcrError::chain("transmit", format!("stale report key={} latest={}", report.key, inner.latest.round_key())));
        }

        inner.block_height += 1;
        inner.latest = TransmissionDetails {
            config_digest: report.key.config_digest,
            epoch: report.key.epoch,
            round: report.key.round,
            latest_answer: report.median,
            latest_timestamp_nanos: now_nanos(),
        };
        debug!("mock chain accepted report key={} median={} block={}", report.key, report.median, inner.block_height);
        let block = inner.block_height;
        inner.accepted.push(AcceptedTransmission { report, signers: signers.into_iter().collect(), block });
        Ok(TxHandle(report_hash.to_string()))
    }

    async fn latest_transmission_details(&self) -> Result<TransmissionDetails> {
        let inner = self.lock_inner()?;
        if inner.fail_details {
            return Err(OcrError::chain("latest_transmission_details", "injected failure"));
        }
        Ok(inner.latest.clone())
    }
}

#[async_trait]
impl ConfigTracker for MockChain {
    async fn latest_config_details(&self) -> Result<Option<ConfigDetails>> {
        let inner = self.lock_inner()?;
        Ok(inner.configs.last().map(|(block, config)| ConfigDetails { changed_in_block: *block, config_digest: config.config_digest }))
    }

    async fn config_from_logs(&self, changed_in_block: u64) -> Result<ContractConfig> {
        let inner = self.lock_inner()?;
        inner
            .configs
            .iter()
            .find(|(block, _)| *block == changed_in_block)
            .map(|(_, config)| config.clone())
            .ok_or_else(|| OcrError::chain("config_from_logs", format!("no config set in block {changed_in_block}")))
    }

    async fn latest_block_height(&self) -> Result<u64> {
        Ok(self.lock_inner()?.block_height)
    }

    async fn subscribe(&self) -> Result<ConfigSubscription> {
        let mut receiver = self.notify.subscribe();
        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(details) => yield details,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
