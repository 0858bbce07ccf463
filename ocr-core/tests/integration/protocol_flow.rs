use crate::fixtures::{fast_node_settings, peer_id, test_network, wait_until, NetworkBuilder, RecordingObserver, TestNetwork};
use ocr_core::application::OracleNode;
use ocr_core::domain::{leader, PersistentState};
use ocr_core::foundation::{ConfigDigest, OracleId};
use ocr_core::infrastructure::chain::{AcceptedTransmission, MockChain};
use ocr_core::infrastructure::datasource::StaticDataSource;
use ocr_core::infrastructure::storage::{Database, MemoryStorage};
use ocr_core::infrastructure::transport::MockHub;
use std::sync::Arc;

struct Cluster {
    chain: Arc<MockChain>,
    hub: Arc<MockHub>,
    storages: Vec<MemoryStorage>,
    observer: Arc<RecordingObserver>,
    nodes: Vec<OracleNode>,
}

impl Cluster {
    fn new(network: &TestNetwork) -> Self {
        let chain = Arc::new(MockChain::new());
        chain.set_config(network.contract.clone()).expect("config");
        let storages = (0..network.shared.n()).map(|_| MemoryStorage::new()).collect();
        Self { chain, hub: Arc::new(MockHub::new()), storages, observer: RecordingObserver::new(), nodes: Vec::new() }
    }

    /// Starts one node per storage. Restarting reuses the storages, as a process restart would.
    fn start(&mut self, network: &TestNetwork) {
        self.nodes = (0..self.storages.len())
            .map(|i| {
                let deps = network.deps(
                    i,
                    &self.hub,
                    &self.chain,
                    Arc::new(self.storages[i].clone()),
                    Arc::new(StaticDataSource(100 + i as i128)),
                    self.observer.clone(),
                );
                let node = OracleNode::new(deps, fast_node_settings(), peer_id(i));
                node.start().expect("start");
                node
            })
            .collect();
    }

    async fn stop(&mut self) {
        for node in self.nodes.drain(..) {
            node.close().await.expect("close");
        }
    }

    fn accepted(&self) -> Vec<AcceptedTransmission> {
        self.chain.accepted().expect("accepted")
    }

    fn accepted_for(&self, digest: &ConfigDigest) -> usize {
        self.accepted().iter().filter(|entry| entry.report.key.config_digest == *digest).count()
    }

    fn state(&self, index: usize, digest: &ConfigDigest) -> Option<PersistentState> {
        self.storages[index].read_state(digest).expect("read state")
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_network_when_running_then_reports_land_once_in_strictly_increasing_order() {
    let network = test_network();
    let mut cluster = Cluster::new(&network);
    cluster.start(&network);

    wait_until("three accepted reports", || cluster.accepted().len() >= 3).await;
    cluster.stop().await;

    let accepted = cluster.accepted();
    assert!(accepted.windows(2).all(|pair| pair[0].report.key < pair[1].report.key), "keys must strictly increase");
    for entry in &accepted {
        assert_eq!(entry.report.key.config_digest, network.digest());
        assert!(entry.signers.len() >= network.quorum());
        assert!((100..=103).contains(&entry.report.median), "median {} outside observed values", entry.report.median);
        assert!(entry.report.observers.len() >= network.quorum());
    }

    let finalized = cluster.observer.finalized();
    for entry in &accepted {
        assert!(finalized.iter().any(|(key, median)| *key == entry.report.key && *median == entry.report.median));
    }
    // Every node staggered its attempt, so no key reached the chain twice and nothing stale was accepted.
    assert!(cluster.chain.transmit_attempts().expect("attempts") >= accepted.len() as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_network_when_restarted_then_epochs_resume_above_persisted_state() {
    let network = test_network();
    let digest = network.digest();
    let mut cluster = Cluster::new(&network);
    cluster.start(&network);
    wait_until("first report", || !cluster.accepted().is_empty()).await;
    cluster.stop().await;

    let before: Vec<u32> = (0..network.shared.n()).map(|i| cluster.state(i, &digest).map_or(0, |state| state.max_epoch())).collect();
    let reports_before = cluster.accepted().len();

    cluster.start(&network);
    wait_until("restarted epochs above persisted ones", || {
        (0..before.len()).all(|i| cluster.state(i, &digest).is_some_and(|state| state.epoch >= before[i] + 2))
    })
    .await;
    wait_until("report after restart", || cluster.accepted().len() > reports_before).await;
    cluster.stop().await;

    let restarted_epochs = cluster.observer.epochs_started(&digest);
    let highest_before = before.iter().copied().max().unwrap_or(0);
    assert!(restarted_epochs.iter().any(|epoch| *epoch > highest_before));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_network_when_config_changes_then_new_digest_starts_above_old_epochs() {
    let first = test_network();
    let second = NetworkBuilder::default().config_count(2).build();
    let mut cluster = Cluster::new(&first);
    cluster.start(&first);
    wait_until("report under first config", || cluster.accepted_for(&first.digest()) > 0).await;

    cluster.chain.set_config(second.contract.clone()).expect("new config");
    wait_until("report under second config", || cluster.accepted_for(&second.digest()) > 0).await;
    for i in 0..second.shared.n() {
        wait_until("node moved to second config", || cluster.state(i, &second.digest()).is_some()).await;
    }
    cluster.stop().await;

    for i in 0..second.shared.n() {
        let old = cluster.state(i, &first.digest()).expect("old state");
        let new = cluster.state(i, &second.digest()).expect("new state");
        assert!(new.epoch > old.max_epoch(), "node {i}: new epoch {} not above old {}", new.epoch, old.max_epoch());
        assert_eq!(cluster.storages[i].read_config().expect("config").map(|config| config.config_digest), Some(second.digest()));
    }
    let accepted = cluster.accepted();
    let switch = accepted.iter().position(|entry| entry.report.key.config_digest == second.digest()).expect("second config report");
    assert!(accepted[switch..].iter().all(|entry| entry.report.key.config_digest == second.digest()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_network_when_one_node_cannot_persist_then_others_progress_and_it_recovers() {
    let network = test_network();
    let digest = network.digest();
    let mut cluster = Cluster::new(&network);
    cluster.storages[0].set_fail_writes(true);
    cluster.start(&network);

    wait_until("reports without node 0", || cluster.accepted().len() >= 2).await;
    assert!(cluster.observer.persistence_failures() > 0);
    assert!(cluster.state(0, &digest).is_none());

    cluster.storages[0].set_fail_writes(false);
    wait_until("node 0 instance started", || cluster.state(0, &digest).is_some()).await;
    cluster.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_network_when_first_leader_is_cut_off_then_reports_land_under_a_later_leader() {
    let network = test_network();
    let mut cluster = Cluster::new(&network);
    // Every node starts fresh at epoch 2, whose leader is oracle 2.
    let silent = OracleId(2);
    assert_eq!(leader(2, network.shared.n()), silent);
    cluster.hub.isolate(&peer_id(2));
    cluster.start(&network);

    wait_until("report without the first leader", || !cluster.accepted().is_empty()).await;
    cluster.stop().await;

    for entry in cluster.accepted() {
        let epoch = entry.report.key.epoch;
        assert!(epoch > 2, "report landed in epoch {epoch}, led by the silent oracle");
        assert_ne!(leader(epoch, network.shared.n()), silent);
        assert!(!entry.signers.contains(&silent));
        assert!(!entry.report.observers.contains(&silent));
    }
}
