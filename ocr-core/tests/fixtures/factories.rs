#![allow(dead_code)]

use crate::fixtures::{NetworkBuilder, TEST_POLL_INTERVAL, TEST_PROGRESS_TIMEOUT};
use ocr_core::application::{OracleDeps, ProtocolObserver};
use ocr_core::domain::{
    ContractConfig, OnchainSigner, OnchainVerifier, Report, RoundKey, SharedConfig, SignatureShare, SignedObservation,
};
use ocr_core::foundation::{ConfigDigest, Epoch, OcrError, OracleId};
use ocr_core::infrastructure::chain::MockChain;
use ocr_core::infrastructure::config::NodeConfig;
use ocr_core::infrastructure::datasource::DataSource;
use ocr_core::infrastructure::keys::{ConfigKeyVerifier, Ed25519Keyring, Secp256k1Keyring, SignerSetVerifier};
use ocr_core::infrastructure::storage::Database;
use ocr_core::infrastructure::transport::MockHub;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct OracleKeys {
    pub offchain: Ed25519Keyring,
    pub onchain: Secp256k1Keyring,
}

pub fn oracle_keys(index: usize) -> OracleKeys {
    let tag = u8::try_from(index).expect("small index");
    OracleKeys {
        offchain: Ed25519Keyring::from_seed([tag + 1; 32]),
        onchain: Secp256k1Keyring::from_seed([tag + 0x41; 32]).expect("valid secp256k1 seed"),
    }
}

pub fn peer_id(index: usize) -> String {
    format!("peer-{index}")
}

pub struct TestNetwork {
    pub keys: Vec<OracleKeys>,
    pub contract: ContractConfig,
    pub shared: SharedConfig,
}

impl TestNetwork {
    pub fn digest(&self) -> ConfigDigest {
        self.contract.config_digest
    }

    pub fn quorum(&self) -> usize {
        self.shared.quorum()
    }

    pub fn key(&self, epoch: Epoch, round: u8) -> RoundKey {
        RoundKey::new(self.digest(), epoch, round)
    }

    pub fn offchain_verifier(&self) -> ConfigKeyVerifier {
        ConfigKeyVerifier::from_config(&self.shared.offchain).expect("verifier")
    }

    pub fn onchain_verifier(&self) -> SignerSetVerifier {
        SignerSetVerifier::from_config(&self.contract)
    }

    /// Observation `values[i]` signed by oracle `i`.
    pub fn observations(&self, key: &RoundKey, values: &[i128]) -> Vec<SignedObservation> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| SignedObservation::sign(key, OracleId(i as u8), *value, &self.keys[i].offchain))
            .collect()
    }

    pub fn report(&self, key: RoundKey, values: &[i128]) -> Report {
        Report::from_observations(key, &self.observations(&key, values)).expect("report")
    }

    pub fn share(&self, signer: usize, report: &Report) -> SignatureShare {
        self.keys[signer].onchain.sign_report(OracleId(signer as u8), &report.hash()).expect("share")
    }

    pub fn deps(
        &self,
        index: usize,
        hub: &Arc<MockHub>,
        chain: &Arc<MockChain>,
        database: Arc<dyn Database>,
        data_source: Arc<dyn DataSource>,
        observer: Arc<dyn ProtocolObserver>,
    ) -> OracleDeps {
        OracleDeps {
            database,
            transport_factory: Arc::new(hub.clone()),
            transmitter: chain.clone(),
            config_tracker: chain.clone(),
            data_source,
            offchain_signer: Arc::new(self.keys[index].offchain.clone()),
            onchain_signer: Arc::new(self.keys[index].onchain.clone()),
            announcer: None,
            observer,
        }
    }
}

pub fn test_network() -> TestNetwork {
    NetworkBuilder::default().build()
}

/// Node settings with short intervals so tests observe progress quickly.
pub fn fast_node_settings() -> NodeConfig {
    let mut settings = NodeConfig::default();
    settings.config_sync.poll_interval_ms = 100;
    settings.config_sync.subscribe_interval_ms = 500;
    settings.timeouts.data_source_timeout_ms = 500;
    settings.timeouts.chain_timeout_ms = 1_000;
    settings.transmission.poll_interval_ms = 20;
    settings.transmission.confirm_timeout_ms = 2_000;
    settings.transmission.retry.base_delay_ms = 50;
    settings.transmission.retry.max_delay_ms = 200;
    settings.transmission.retry.jitter_ms = 10;
    settings
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObservedEvent {
    EpochStarted { config_digest: ConfigDigest, epoch: Epoch, leader: OracleId },
    ReportFinalized { key: RoundKey, median: i128 },
    TransmissionConfirmed { key: RoundKey },
    TransmitFailed { key: RoundKey },
    TransmissionAbandoned { key: RoundKey, reason: String },
    ConfigChanged { previous: Option<ConfigDigest>, current: ConfigDigest },
    PersistenceFailure { operation: String },
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: ObservedEvent) {
        self.events.lock().expect("observer lock").push(event);
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().expect("observer lock").clone()
    }

    pub fn epochs_started(&self, digest: &ConfigDigest) -> Vec<Epoch> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::EpochStarted { config_digest, epoch, .. } if config_digest == *digest => Some(epoch),
                _ => None,
            })
            .collect()
    }

    pub fn finalized(&self) -> Vec<(RoundKey, i128)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::ReportFinalized { key, median } => Some((key, median)),
                _ => None,
            })
            .collect()
    }

    pub fn confirmed(&self) -> Vec<RoundKey> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::TransmissionConfirmed { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn transmit_failures(&self, key: &RoundKey) -> usize {
        self.events().iter().filter(|event| matches!(event, ObservedEvent::TransmitFailed { key: failed } if failed == key)).count()
    }

    pub fn abandoned(&self) -> Vec<(RoundKey, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::TransmissionAbandoned { key, reason } => Some((key, reason)),
                _ => None,
            })
            .collect()
    }

    pub fn persistence_failures(&self) -> usize {
        self.events().iter().filter(|event| matches!(event, ObservedEvent::PersistenceFailure { .. })).count()
    }
}

impl ProtocolObserver for RecordingObserver {
    fn on_epoch_started(&self, config_digest: &ConfigDigest, epoch: Epoch, leader: OracleId) {
        self.record(ObservedEvent::EpochStarted { config_digest: *config_digest, epoch, leader });
    }

    fn on_report_finalized(&self, key: &RoundKey, median: i128) {
        self.record(ObservedEvent::ReportFinalized { key: *key, median });
    }

    fn on_transmission_confirmed(&self, key: &RoundKey) {
        self.record(ObservedEvent::TransmissionConfirmed { key: *key });
    }

    fn on_transmit_failed(&self, key: &RoundKey, _reason: &str) {
        self.record(ObservedEvent::TransmitFailed { key: *key });
    }

    fn on_transmission_abandoned(&self, key: &RoundKey, reason: &str) {
        self.record(ObservedEvent::TransmissionAbandoned { key: *key, reason: reason.to_string() });
    }

    fn on_config_changed(&self, previous: Option<&ConfigDigest>, current: &ConfigDigest) {
        self.record(ObservedEvent::ConfigChanged { previous: previous.copied(), current: *current });
    }

    fn on_persistence_failure(&self, operation: &str, _error: &OcrError) {
        self.record(ObservedEvent::PersistenceFailure { operation: operation.to_string() });
    }
}

/// Polls `condition` until it holds or `TEST_PROGRESS_TIMEOUT` elapses.
pub async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    wait_until_for(what, TEST_PROGRESS_TIMEOUT, &mut condition).await
}

pub async fn wait_until_for<F>(what: &str, timeout: Duration, condition: &mut F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(TEST_POLL_INTERVAL).await;
    }
}

/// Verifies every share in `shares` against `network`.
pub fn all_shares_valid(network: &TestNetwork, report: &Report, shares: &[SignatureShare]) -> bool {
    let verifier = network.onchain_verifier();
    shares.iter().all(|share| verifier.verify_share(&report.hash(), share))
}
