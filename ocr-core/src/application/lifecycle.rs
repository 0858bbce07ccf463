//! Start-once / close-once wrappers around the two node roles.

use crate::application::config_sync::ConfigSync;
use crate::application::instance::{OracleContext, OracleDeps, OracleInstance};
use crate::application::observer::ProtocolObserver;
use crate::application::runtime::AbortOnDrop;
use crate::domain::{floor_state, ContractConfig, SharedConfig};
use crate::foundation::{ConfigDigest, Epoch, ErrorCode, OcrError, TASK_CHANNEL_CAPACITY};
use crate::infrastructure::chain::ConfigTracker;
use crate::infrastructure::config::NodeConfig;
use crate::infrastructure::storage::Database;
use crate::infrastructure::transport::PeerDirectory;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Guards shared by both roles: `start` succeeds once, `close` succeeds once.
struct LifecycleGuard {
    started: AtomicBool,
    closed: AtomicBool,
    tasks: Mutex<Vec<AbortOnDrop>>,
}

impl LifecycleGuard {
    fn new() -> Self {
        Self { started: AtomicBool::new(false), closed: AtomicBool::new(false), tasks: Mutex::new(Vec::new()) }
    }

    /// Panics on a second start.
    fn begin_start(&self, role: &str) -> Result<(), OcrError> {
        if self.started.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            panic!("{role} node started twice");
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(OcrError::NodeClosed);
        }
        Ok(())
    }

    fn install(&self, tasks: Vec<AbortOnDrop>) -> Result<(), OcrError> {
        let mut guard = self.tasks.lock().map_err(|_| OcrError::Message("lifecycle lock poisoned".to_string()))?;
        guard.extend(tasks);
        Ok(())
    }

    async fn close(&self) -> Result<(), OcrError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(OcrError::NodeClosed);
        }
        let tasks = match self.tasks.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for task in tasks {
            task.shutdown().await;
        }
        Ok(())
    }
}

/// Full protocol participant.
pub struct OracleNode {
    ctx: Arc<OracleContext>,
    lifecycle: LifecycleGuard,
    current: Arc<watch::Sender<Option<ConfigDigest>>>,
}

impl OracleNode {
    pub fn new(deps: OracleDeps, settings: NodeConfig, peer_id: impl Into<String>) -> Self {
        Self {
            ctx: Arc::new(OracleContext { deps, settings, peer_id: peer_id.into() }),
            lifecycle: LifecycleGuard::new(),
            current: Arc::new(watch::channel(None).0),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.ctx.peer_id
    }

    /// Digest of the config the node currently runs, if any.
    pub fn current_config_digest(&self) -> Option<ConfigDigest> {
        *self.current.borrow()
    }

    /// Spawns config sync and the instance supervisor. Must run inside a tokio runtime.
    ///
    /// # Panics
    /// When called a second time.
    pub fn start(&self) -> Result<(), OcrError> {
        self.lifecycle.begin_start("oracle")?;
        let persisted = self.ctx.deps.database.read_config()?;
        let (changes_tx, changes_rx) = mpsc::channel(TASK_CHANNEL_CAPACITY);
        let sync = ConfigSync::new(
            self.ctx.deps.config_tracker.clone(),
            self.ctx.settings.config_sync.clone(),
            self.ctx.settings.timeouts.chain_timeout(),
            persisted.as_ref().map(|config| config.config_digest),
            changes_tx,
        );
        let supervisor = Supervisor { ctx: self.ctx.clone(), current: self.current.clone() };
        info!("oracle node starting peer_id={} persisted_config={}", self.ctx.peer_id, persisted.is_some());
        self.lifecycle.install(vec![AbortOnDrop::spawn(supervisor.run(persisted, changes_rx)), AbortOnDrop::spawn(sync.run())])
    }

    /// Aborts all tasks. A second call returns `NodeClosed`.
    pub async fn close(&self) -> Result<(), OcrError> {
        self.lifecycle.close().await?;
        self.current.send_replace(None);
        info!("oracle node closed peer_id={}", self.ctx.peer_id);
        Ok(())
    }
}

/// Owns the running instance and replaces it on every confirmed config change.
struct Supervisor {
    ctx: Arc<OracleContext>,
    current: Arc<watch::Sender<Option<ConfigDigest>>>,
}

/// Work the supervisor still owes the latest config. Each step is retried until it succeeds.
enum Step {
    /// Raise the config's stored epochs to `floor`, then persist the config itself.
    Persist { config: ContractConfig, floor: Epoch },
    Start { shared: SharedConfig, floor: Epoch },
}

impl Supervisor {
    async fn run(self, persisted: Option<ContractConfig>, mut changes: mpsc::Receiver<ContractConfig>) {
        let mut instance: Option<OracleInstance> = None;
        // Digest of the last config seen, including rejected ones and ones we are not part of.
        let mut latest: Option<ConfigDigest> = persisted.as_ref().map(|config| config.config_digest);
        // Highest epoch known to be used under any config so far.
        let mut high_water = self.epoch_floor(latest.as_ref());
        let mut pending = persisted.and_then(|config| self.prepare(config, high_water));

        let mut retry = tokio::time::interval(self.ctx.settings.config_sync.poll_interval());
        retry.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            if let Some(Step::Persist { config, floor }) = pending.take() {
                match self.persist(&config, floor) {
                    Ok(()) => pending = self.prepare(config, floor),
                    Err(err) => {
                        self.ctx.deps.observer.on_persistence_failure("persist_config", &err);
                        pending = Some(Step::Persist { config, floor });
                    }
                }
            }
            if let Some(Step::Start { shared, floor }) = pending.take() {
                match OracleInstance::start(&self.ctx, shared.clone(), floor) {
                    Ok(started) => {
                        self.current.send_replace(Some(started.config_digest()));
                        instance = Some(started);
                    }
                    Err(err) if err.code() == ErrorCode::NotInConfig => {
                        info!("node is not part of config config_digest={:#x}; staying passive", shared.digest());
                    }
                    Err(err) if err.is_persistence_failure() => {
                        self.ctx.deps.observer.on_persistence_failure("start_instance", &err);
                        pending = Some(Step::Start { shared, floor });
                    }
                    Err(err) => warn!("instance start failed config_digest={:#x} error={}", shared.digest(), err),
                }
            }

            tokio::select! {
                change = changes.recv() => {
                    let Some(config) = change else {
                        debug!("supervisor stopping: config sync closed");
                        return;
                    };
                    // The old instance must be stopped before its epoch is read as the floor.
                    if let Some(old) = instance.take() {
                        old.shutdown().await;
                    }
                    high_water = high_water.max(self.epoch_floor(latest.as_ref()));
                    self.current.send_replace(None);
                    self.ctx.deps.observer.on_config_changed(latest.as_ref(), &config.config_digest);
                    latest = Some(config.config_digest);
                    pending = Some(Step::Persist { config, floor: high_water });
                }
                _ = retry.tick(), if pending.is_some() => {
                    debug!("retrying config step");
                }
            }
        }
    }

    /// Makes `floor` durable under the new digest before the config that points at it.
    fn persist(&self, config: &ContractConfig, floor: Epoch) -> Result<(), OcrError> {
        let database = &self.ctx.deps.database;
        let stored = database.read_state(&config.config_digest)?;
        if let Some(state) = floor_state(stored.as_ref(), config.oracle_count(), floor) {
            database.write_state(&config.config_digest, &state)?;
        }
        database.write_config(config)
    }

    fn prepare(&self, config: ContractConfig, floor: Epoch) -> Option<Step> {
        let digest = config.config_digest;
        match SharedConfig::from_contract(config) {
            Ok(shared) => Some(Step::Start { shared, floor }),
            Err(err) => {
                warn!("rejecting config config_digest={:#x} floor={} error={}", digest, floor, err);
                None
            }
        }
    }

    /// Highest epoch stored under `digest`.
    fn epoch_floor(&self, digest: Option<&ConfigDigest>) -> Epoch {
        let Some(digest) = digest else {
            return 0;
        };
        match self.ctx.deps.database.read_state(digest) {
            Ok(state) => state.map(|state| state.max_epoch()).unwrap_or(0),
            Err(err) => {
                self.ctx.deps.observer.on_persistence_failure("read_state", &err);
                0
            }
        }
    }
}

/// Overlay-only participant: follows config changes and keeps the peer directory current.
pub struct BootstrapNode {
    database: Arc<dyn Database>,
    tracker: Arc<dyn ConfigTracker>,
    directory: Arc<PeerDirectory>,
    settings: NodeConfig,
    observer: Arc<dyn ProtocolObserver>,
    lifecycle: LifecycleGuard,
}

impl BootstrapNode {
    pub fn new(
        database: Arc<dyn Database>,
        tracker: Arc<dyn ConfigTracker>,
        directory: Arc<PeerDirectory>,
        settings: NodeConfig,
        observer: Arc<dyn ProtocolObserver>,
    ) -> Self {
        Self { database, tracker, directory, settings, observer, lifecycle: LifecycleGuard::new() }
    }

    pub fn directory(&self) -> Arc<PeerDirectory> {
        self.directory.clone()
    }

    /// # Panics
    /// When called a second time.
    pub fn start(&self) -> Result<(), OcrError> {
        self.lifecycle.begin_start("bootstrap")?;
        let persisted = self.database.read_config()?.map(|config| config.config_digest);
        let (changes_tx, mut changes_rx) = mpsc::channel::<ContractConfig>(TASK_CHANNEL_CAPACITY);
        let sync = ConfigSync::new(
            self.tracker.clone(),
            self.settings.config_sync.clone(),
            self.settings.timeouts.chain_timeout(),
            persisted,
            changes_tx,
        );
        let database = self.database.clone();
        let directory = self.directory.clone();
        let observer = self.observer.clone();
        let follower = async move {
            let mut previous = persisted;
            while let Some(config) = changes_rx.recv().await {
                let digest = config.config_digest;
                observer.on_config_changed(previous.as_ref(), &digest);
                if let Err(err) = database.write_config(&config) {
                    observer.on_persistence_failure("write_config", &err);
                }
                if let Err(err) = directory.retain_only(&digest) {
                    warn!("peer directory prune failed error={}", err);
                }
                previous = Some(digest);
            }
        };
        info!("bootstrap node starting persisted_config={}", persisted.is_some());
        self.lifecycle.install(vec![AbortOnDrop::spawn(follower), AbortOnDrop::spawn(sync.run())])
    }

    pub async fn close(&self) -> Result<(), OcrError> {
        self.lifecycle.close().await?;
        info!("bootstrap node closed");
        Ok(())
    }
}
