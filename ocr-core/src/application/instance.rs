//! One oracle protocol instance bound to a single configuration.

use crate::application::observer::ProtocolObserver;
use crate::application::runtime::AbortOnDrop;
use crate::application::tasks::aggregator::Aggregator;
use crate::application::tasks::cosigner::Cosigner;
use crate::application::tasks::observation::ObservationTask;
use crate::application::tasks::router::Router;
use crate::application::tasks::scheduler::{Scheduler, SchedulerLinks, SchedulerSetup};
use crate::application::tasks::transmitter::Transmitter;
use crate::domain::{OffchainSigner, OffchainVerifier, OnchainSigner, OnchainVerifier, Pacemaker, SharedConfig};
use crate::foundation::{ConfigDigest, Epoch, OcrError, OracleId, TASK_CHANNEL_CAPACITY};
use crate::infrastructure::chain::{ConfigTracker, ContractTransmitter};
use crate::infrastructure::config::NodeConfig;
use crate::infrastructure::datasource::DataSource;
use crate::infrastructure::keys::{ConfigKeyVerifier, SignerSetVerifier};
use crate::infrastructure::storage::Database;
use crate::infrastructure::transport::{filter_stream, MessageFilter, Outbound, PeerAnnouncer, TransportFactory};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Collaborators of an oracle node.
#[derive(Clone)]
pub struct OracleDeps {
    pub database: Arc<dyn Database>,
    pub transport_factory: Arc<dyn TransportFactory>,
    pub transmitter: Arc<dyn ContractTransmitter>,
    pub config_tracker: Arc<dyn ConfigTracker>,
    pub data_source: Arc<dyn DataSource>,
    pub offchain_signer: Arc<dyn OffchainSigner>,
    pub onchain_signer: Arc<dyn OnchainSigner>,
    pub announcer: Option<Arc<dyn PeerAnnouncer>>,
    pub observer: Arc<dyn ProtocolObserver>,
}

pub(crate) struct OracleContext {
    pub deps: OracleDeps,
    pub settings: NodeConfig,
    pub peer_id: String,
}

/// Running tasks of one configuration. Dropping it aborts all of them.
pub struct OracleInstance {
    config_digest: ConfigDigest,
    oracle_id: OracleId,
    epoch: Epoch,
    tasks: Vec<AbortOnDrop>,
}

impl OracleInstance {
    pub fn config_digest(&self) -> ConfigDigest {
        self.config_digest
    }

    pub fn oracle_id(&self) -> OracleId {
        self.oracle_id
    }

    /// Epoch the instance started in.
    pub fn starting_epoch(&self) -> Epoch {
        self.epoch
    }

    /// Aborts every task and waits until none of them can write state again.
    pub async fn shutdown(self) {
        for task in self.tasks {
            task.shutdown().await;
        }
    }

    /// Resolves our oracle id, persists a fresh epoch above `floor` and spawns the protocol tasks.
    pub(crate) fn start(ctx: &OracleContext, shared: SharedConfig, floor: Epoch) -> Result<Self, OcrError> {
        let shared = Arc::new(shared);
        let digest = shared.digest();
        let deps = &ctx.deps;

        let oracle_id = resolve_oracle_id(&shared, deps, &ctx.peer_id)?;
        let offchain_verifier: Arc<dyn OffchainVerifier> = Arc::new(ConfigKeyVerifier::from_config(&shared.offchain)?);
        let onchain_verifier: Arc<dyn OnchainVerifier> = Arc::new(SignerSetVerifier::from_config(&shared.contract));

        let stored = deps.database.read_state(&digest)?;
        let pacemaker = Pacemaker::restart(stored, floor, shared.n(), shared.quorum(), oracle_id, shared.offchain.max_epoch_jump);
        deps.database.write_state(&digest, pacemaker.state())?;
        let epoch = pacemaker.epoch();

        let transport = deps.transport_factory.open(&ctx.peer_id, &shared.offchain.peer_ids)?;
        let subscription = transport.receive()?;
        if let Some(announcer) = deps.announcer.as_ref() {
            if let Err(err) = announcer.announce(digest, oracle_id, ctx.peer_id.clone()) {
                warn!("peer announcement failed config_digest={:#x} error={}", digest, err);
            }
        }
        let outbound = Arc::new(Outbound::new(transport, deps.offchain_signer.clone(), digest, oracle_id));
        let inbound = filter_stream(MessageFilter::new(digest, shared.n(), offchain_verifier.clone()), subscription);

        let (scheduler_tx, scheduler_rx) = mpsc::channel(TASK_CHANNEL_CAPACITY);
        let (observe_tx, observe_rx) = mpsc::channel(TASK_CHANNEL_CAPACITY);
        let (aggregator_tx, aggregator_rx) = mpsc::channel(TASK_CHANNEL_CAPACITY);
        let (cosigner_tx, cosigner_rx) = mpsc::channel(TASK_CHANNEL_CAPACITY);
        let (transmitter_tx, transmitter_rx) = mpsc::channel(TASK_CHANNEL_CAPACITY);

        let transmitter = Transmitter {
            shared: shared.clone(),
            self_id: oracle_id,
            database: deps.database.clone(),
            chain: deps.transmitter.clone(),
            settings: ctx.settings.transmission.clone(),
            chain_timeout: ctx.settings.timeouts.chain_timeout(),
            observer: deps.observer.clone(),
        };
        let cosigner = Cosigner {
            config_digest: digest,
            self_id: oracle_id,
            quorum: shared.quorum(),
            oracle_count: shared.n(),
            signer: deps.onchain_signer.clone(),
            verifier: onchain_verifier,
            outbound: outbound.clone(),
            scheduler: scheduler_tx.clone(),
            transmitter: transmitter_tx,
            observer: deps.observer.clone(),
        };
        let aggregator = Aggregator {
            quorum: shared.quorum(),
            oracle_count: shared.n(),
            verifier: offchain_verifier.clone(),
            scheduler: scheduler_tx.clone(),
        };
        let observation = ObservationTask {
            self_id: oracle_id,
            data_source: deps.data_source.clone(),
            signer: deps.offchain_signer.clone(),
            outbound: outbound.clone(),
            timeout: ctx.settings.timeouts.data_source_timeout(),
            observer: deps.observer.clone(),
        };
        let router = Router { scheduler: scheduler_tx.clone(), aggregator: aggregator_tx.clone(), cosigner: cosigner_tx.clone() };
        let links = SchedulerLinks { events: scheduler_tx, observe: observe_tx, aggregator: aggregator_tx, cosigner: cosigner_tx };
        let scheduler = Scheduler::new(SchedulerSetup {
            shared: shared.clone(),
            self_id: oracle_id,
            pacemaker,
            database: deps.database.clone(),
            outbound,
            verifier: offchain_verifier,
            links,
            observer: deps.observer.clone(),
        });

        let tasks = vec![
            AbortOnDrop::spawn(transmitter.run(transmitter_rx)),
            AbortOnDrop::spawn(cosigner.run(cosigner_rx)),
            AbortOnDrop::spawn(aggregator.run(aggregator_rx)),
            AbortOnDrop::spawn(observation.run(observe_rx)),
            AbortOnDrop::spawn(scheduler.run(scheduler_rx)),
            AbortOnDrop::spawn(router.run(inbound)),
        ];
        info!("oracle instance started config_digest={:#x} oracle_id={} epoch={} floor={}", digest, oracle_id, epoch, floor);
        Ok(Self { config_digest: digest, oracle_id, epoch, tasks })
    }
}

/// Our index in `shared`: the on-chain key picks the slot, the off-chain key and peer id must match it.
fn resolve_oracle_id(shared: &SharedConfig, deps: &OracleDeps, peer_id: &str) -> Result<OracleId, OcrError> {
    let not_in_config = || OcrError::NotInConfig { config_digest: shared.digest().to_string() };
    let oracle_id = shared.contract.oracle_for_signer(&deps.onchain_signer.public_key()).ok_or_else(not_in_config)?;
    if shared.offchain.offchain_public_keys.get(oracle_id.index()) != Some(&deps.offchain_signer.public_key()) {
        return Err(not_in_config());
    }
    if shared.peer_id(oracle_id) != Some(peer_id) {
        return Err(not_in_config());
    }
    Ok(oracle_id)
}
