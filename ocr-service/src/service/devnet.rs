//! In-process network: N oracles and a bootstrapper sharing one mock chain and one mock overlay.

use log::{debug, info, warn};
use ocr_core::application::{BootstrapNode, OracleDeps, OracleNode, ProtocolObserver};
use ocr_core::domain::{ContractConfig, OffchainConfig, OffchainSigner, OnchainSigner};
use ocr_core::foundation::{OcrError, DEFAULT_MAX_EPOCH_JUMP, MAX_ORACLES, OFFCHAIN_CONFIG_VERSION};
use ocr_core::infrastructure::chain::{AcceptedTransmission, MockChain};
use ocr_core::infrastructure::config::NodeConfig;
use ocr_core::infrastructure::datasource::RandomWalkDataSource;
use ocr_core::infrastructure::keys::{Ed25519Keyring, Secp256k1Keyring};
use ocr_core::infrastructure::storage::{Database, MemoryStorage, RocksStorage};
use ocr_core::infrastructure::transport::{MockHub, PeerAnnouncer, PeerDirectory};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const REPORT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const RANDOM_WALK_START: i128 = 1_000_000;
const RANDOM_WALK_MAX_STEP: i64 = 500;

#[derive(Clone, Debug)]
pub struct DevnetOptions {
    pub oracles: usize,
    pub threshold: u8,
    /// Keys and data sources derive from this seed, so a devnet is reproducible.
    pub seed: u64,
    /// RocksDB under `<data_dir>/oracle-<i>` when set, in-memory storage otherwise.
    pub data_dir: Option<PathBuf>,
    pub delta_progress_ms: u64,
    pub delta_resend_ms: u64,
    pub delta_round_ms: u64,
    pub delta_stage_ms: u64,
    pub r_max: u8,
}

impl Default for DevnetOptions {
    fn default() -> Self {
        Self {
            oracles: 4,
            threshold: 1,
            seed: 7,
            data_dir: None,
            delta_progress_ms: 3_000,
            delta_resend_ms: 500,
            delta_round_ms: 1_000,
            delta_stage_ms: 300,
            r_max: 5,
        }
    }
}

impl DevnetOptions {
    pub fn validate(&self) -> Result<(), OcrError> {
        if self.oracles == 0 || self.oracles > MAX_ORACLES {
            return Err(OcrError::ConfigError(format!("oracles must be in 1..={MAX_ORACLES}, got {}", self.oracles)));
        }
        if usize::from(self.threshold) + 1 > self.oracles {
            return Err(OcrError::ConfigError(format!("threshold {} needs more than {} oracles", self.threshold, self.oracles)));
        }
        Ok(())
    }
}

struct OracleKeys {
    offchain: Ed25519Keyring,
    onchain: Secp256k1Keyring,
}

fn derive_keys(seed: u64, count: usize) -> Result<Vec<OracleKeys>, OcrError> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut offchain_seed = [0u8; 32];
            let mut onchain_seed = [0u8; 32];
            rng.fill_bytes(&mut offchain_seed);
            rng.fill_bytes(&mut onchain_seed);
            Ok(OracleKeys { offchain: Ed25519Keyring::from_seed(offchain_seed), onchain: Secp256k1Keyring::from_seed(onchain_seed)? })
        })
        .collect()
}

pub fn peer_id_for(index: usize) -> String {
    format!("oracle-{index}")
}

fn open_storage(data_dir: Option<&PathBuf>, name: &str) -> Result<Arc<dyn Database>, OcrError> {
    match data_dir {
        Some(dir) => Ok(Arc::new(RocksStorage::open_in_dir(dir.join(name))?)),
        None => Ok(Arc::new(MemoryStorage::new())),
    }
}

pub struct Devnet {
    chain: Arc<MockChain>,
    hub: Arc<MockHub>,
    bootstrap: BootstrapNode,
    nodes: Vec<OracleNode>,
    config: ContractConfig,
}

impl Devnet {
    /// Creates every participant and publishes the initial config on the mock chain. Nothing runs until `start`.
    pub fn build(options: &DevnetOptions, settings: &NodeConfig, observer: Arc<dyn ProtocolObserver>) -> Result<Self, OcrError> {
        options.validate()?;
        let keys = derive_keys(options.seed, options.oracles)?;
        let peer_ids: Vec<String> = (0..options.oracles).map(peer_id_for).collect();
        let offchain = OffchainConfig {
            offchain_public_keys: keys.iter().map(|k| k.offchain.public_key()).collect(),
            peer_ids: peer_ids.clone(),
            delta_progress_ms: options.delta_progress_ms,
            delta_resend_ms: options.delta_resend_ms,
            delta_round_ms: options.delta_round_ms,
            delta_stage_ms: options.delta_stage_ms,
            r_max: options.r_max,
            max_epoch_jump: DEFAULT_MAX_EPOCH_JUMP,
        };
        let config = ContractConfig::new(
            1,
            keys.iter().map(|k| k.onchain.public_key()).collect(),
            peer_ids.iter().map(|peer| format!("transmitter-{peer}")).collect(),
            options.threshold,
            OFFCHAIN_CONFIG_VERSION,
            offchain.encode()?,
        );

        let chain = Arc::new(MockChain::new());
        chain.set_config(config.clone())?;
        let hub = Arc::new(MockHub::with_inbox_capacity(settings.transport.inbox_capacity));
        let directory = Arc::new(PeerDirectory::new());
        let bootstrap = BootstrapNode::new(
            open_storage(options.data_dir.as_ref(), "bootstrap")?,
            chain.clone(),
            directory.clone(),
            settings.clone(),
            observer.clone(),
        );

        let mut nodes = Vec::with_capacity(options.oracles);
        for (index, keyring) in keys.into_iter().enumerate() {
            let deps = OracleDeps {
                database: open_storage(options.data_dir.as_ref(), &peer_ids[index])?,
                transport_factory: Arc::new(hub.clone()),
                transmitter: chain.clone(),
                config_tracker: chain.clone(),
                data_source: Arc::new(RandomWalkDataSource::new(
                    RANDOM_WALK_START,
                    RANDOM_WALK_MAX_STEP,
                    options.seed.wrapping_add(index as u64),
                )),
                offchain_signer: Arc::new(keyring.offchain),
                onchain_signer: Arc::new(keyring.onchain),
                announcer: Some(directory.clone() as Arc<dyn PeerAnnouncer>),
                observer: observer.clone(),
            };
            nodes.push(OracleNode::new(deps, settings.clone(), peer_ids[index].clone()));
        }
        info!(
            "devnet built oracles={} threshold={} config_digest={:#x} persistent={}",
            options.oracles,
            options.threshold,
            config.config_digest,
            options.data_dir.is_some()
        );
        Ok(Self { chain, hub, bootstrap, nodes, config })
    }

    pub fn chain(&self) -> Arc<MockChain> {
        self.chain.clone()
    }

    pub fn hub(&self) -> Arc<MockHub> {
        self.hub.clone()
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[OracleNode] {
        &self.nodes
    }

    pub fn start(&self) -> Result<(), OcrError> {
        self.bootstrap.start()?;
        for node in &self.nodes {
            node.start()?;
        }
        info!("devnet started oracles={}", self.nodes.len());
        Ok(())
    }

    /// Waits until the chain accepted at least `count` reports.
    pub async fn wait_for_reports(&self, count: usize, timeout: Duration) -> Result<Vec<AcceptedTransmission>, OcrError> {
        let deadline = Instant::now() + timeout;
        loop {
            let accepted = self.chain.accepted()?;
            if accepted.len() >= count {
                return Ok(accepted);
            }
            if Instant::now() >= deadline {
                return Err(OcrError::Timeout {
                    operation: format!("waiting for {count} reports (have {})", accepted.len()),
                    timeout_ms: timeout.as_millis().try_into().unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(REPORT_POLL_INTERVAL).await;
        }
    }

    /// Closes every participant; errors are logged and the first one returned.
    pub async fn shutdown(&self) -> Result<(), OcrError> {
        let mut first_error = None;
        for node in &self.nodes {
            if let Err(err) = node.close().await {
                warn!("oracle close failed peer_id={} error={}", node.peer_id(), err);
                first_error.get_or_insert(err);
            }
        }
        if let Err(err) = self.bootstrap.close().await {
            warn!("bootstrap close failed error={}", err);
            first_error.get_or_insert(err);
        }
        debug!("devnet shut down");
        first_error.map_or(Ok(()), Err)
    }
}
