use crate::fixtures::{fast_node_settings, oracle_keys, peer_id, test_network, wait_until, NetworkBuilder, RecordingObserver, TestNetwork};
use ocr_core::application::{OracleDeps, OracleNode};
use ocr_core::domain::PersistentState;
use ocr_core::foundation::{ConfigDigest, OcrError};
use ocr_core::infrastructure::chain::MockChain;
use ocr_core::infrastructure::datasource::StaticDataSource;
use ocr_core::infrastructure::storage::{Database, MemoryStorage};
use ocr_core::infrastructure::transport::MockHub;
use std::sync::Arc;
use std::time::Duration;

fn member_node(index: usize, chain: &Arc<MockChain>, hub: &Arc<MockHub>) -> OracleNode {
    let network = test_network();
    let deps = network.deps(index, hub, chain, Arc::new(MemoryStorage::new()), Arc::new(StaticDataSource(1)), RecordingObserver::new());
    OracleNode::new(deps, fast_node_settings(), peer_id(index))
}

#[tokio::test]
#[should_panic(expected = "started twice")]
async fn test_start_when_called_twice_then_panics() {
    let node = member_node(0, &Arc::new(MockChain::new()), &Arc::new(MockHub::new()));
    node.start().expect("first start");
    let _ = node.start();
}

#[tokio::test]
async fn test_close_when_called_twice_then_node_closed() {
    let node = member_node(0, &Arc::new(MockChain::new()), &Arc::new(MockHub::new()));
    node.start().expect("start");
    node.close().await.expect("first close");
    assert!(matches!(node.close().await, Err(OcrError::NodeClosed)));
}

#[tokio::test]
async fn test_start_when_already_closed_then_node_closed() {
    let node = member_node(1, &Arc::new(MockChain::new()), &Arc::new(MockHub::new()));
    node.close().await.expect("close before start");
    assert!(matches!(node.start(), Err(OcrError::NodeClosed)));
}

#[tokio::test]
async fn test_start_when_member_then_instance_runs_and_close_clears_digest() {
    let network = test_network();
    let chain = Arc::new(MockChain::new());
    chain.set_config(network.contract.clone()).expect("config");
    let node = member_node(2, &chain, &Arc::new(MockHub::new()));
    node.start().expect("start");

    wait_until("instance start", || node.current_config_digest() == Some(network.digest())).await;
    node.close().await.expect("close");
    assert_eq!(node.current_config_digest(), None);
}

#[tokio::test]
async fn test_start_when_keys_not_in_config_then_node_stays_passive() {
    let network = test_network();
    let chain = Arc::new(MockChain::new());
    chain.set_config(network.contract.clone()).expect("config");
    let outsider = oracle_keys(7);
    let storage = MemoryStorage::new();
    let deps = OracleDeps {
        database: Arc::new(storage.clone()),
        transport_factory: Arc::new(Arc::new(MockHub::new())),
        transmitter: chain.clone(),
        config_tracker: chain.clone(),
        data_source: Arc::new(StaticDataSource(1)),
        offchain_signer: Arc::new(outsider.offchain),
        onchain_signer: Arc::new(outsider.onchain),
        announcer: None,
        observer: RecordingObserver::new(),
    };
    let node = OracleNode::new(deps, fast_node_settings(), peer_id(7));
    node.start().expect("start");

    // The config is still adopted and persisted; only the instance is skipped.
    wait_until("config persisted", || storage.read_config().ok().flatten().map(|config| config.config_digest) == Some(network.digest())).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(node.current_config_digest(), None);
    node.close().await.expect("close");
}

const PRELOADED_EPOCH: u32 = 500;

/// Storage that already ran config `network` up to `PRELOADED_EPOCH`.
fn preloaded_storage(network: &TestNetwork) -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage.write_config(&network.contract).expect("write config");
    let state = PersistentState {
        epoch: PRELOADED_EPOCH,
        highest_sent_epoch: PRELOADED_EPOCH,
        highest_received_epoch: vec![PRELOADED_EPOCH; network.shared.n()],
    };
    storage.write_state(&network.digest(), &state).expect("write state");
    storage
}

fn node_on(storage: &MemoryStorage, chain: &Arc<MockChain>) -> OracleNode {
    let deps = test_network().deps(
        0,
        &Arc::new(MockHub::new()),
        chain,
        Arc::new(storage.clone()),
        Arc::new(StaticDataSource(1)),
        RecordingObserver::new(),
    );
    OracleNode::new(deps, fast_node_settings(), peer_id(0))
}

fn max_epoch(storage: &MemoryStorage, digest: &ConfigDigest) -> u32 {
    storage.read_state(digest).expect("read state").map_or(0, |state| state.max_epoch())
}

fn persisted_digest(storage: &MemoryStorage) -> Option<ConfigDigest> {
    storage.read_config().ok().flatten().map(|config| config.config_digest)
}

#[tokio::test]
async fn test_config_change_when_rejected_config_in_between_then_epoch_stays_above_first_config() {
    let first = test_network();
    let rejected = NetworkBuilder::default().threshold(4).config_count(2).contract();
    let third = NetworkBuilder::default().config_count(3).build();
    let chain = Arc::new(MockChain::new());
    chain.set_config(first.contract.clone()).expect("first config");
    let storage = preloaded_storage(&first);
    let node = node_on(&storage, &chain);
    node.start().expect("start");
    wait_until("first instance", || node.current_config_digest() == Some(first.digest())).await;

    chain.set_config(rejected.clone()).expect("rejected config");
    wait_until("rejected config persisted", || persisted_digest(&storage) == Some(rejected.config_digest)).await;
    assert_eq!(node.current_config_digest(), None);

    chain.set_config(third.contract.clone()).expect("third config");
    wait_until("third instance", || node.current_config_digest() == Some(third.digest())).await;
    node.close().await.expect("close");

    let used_under_first = max_epoch(&storage, &first.digest());
    let third_state = storage.read_state(&third.digest()).expect("read state").expect("third state");
    assert!(used_under_first > PRELOADED_EPOCH);
    assert!(third_state.epoch > used_under_first, "epoch {} not above {}", third_state.epoch, used_under_first);
}

#[tokio::test]
async fn test_restart_when_persisted_config_is_rejected_then_next_config_starts_above_old_epochs() {
    let first = test_network();
    let rejected = NetworkBuilder::default().threshold(4).config_count(2).contract();
    let third = NetworkBuilder::default().config_count(3).build();
    let chain = Arc::new(MockChain::new());
    chain.set_config(first.contract.clone()).expect("first config");
    let storage = preloaded_storage(&first);
    let node = node_on(&storage, &chain);
    node.start().expect("start");
    wait_until("first instance", || node.current_config_digest() == Some(first.digest())).await;
    chain.set_config(rejected.clone()).expect("rejected config");
    wait_until("rejected config persisted", || persisted_digest(&storage) == Some(rejected.config_digest)).await;
    node.close().await.expect("close");
    let used_under_first = max_epoch(&storage, &first.digest());

    // The floor was stored under the rejected digest before the config itself.
    assert!(max_epoch(&storage, &rejected.config_digest) >= used_under_first);

    chain.set_config(third.contract.clone()).expect("third config");
    let restarted = node_on(&storage, &chain);
    restarted.start().expect("restart");
    wait_until("third instance", || restarted.current_config_digest() == Some(third.digest())).await;
    restarted.close().await.expect("close");

    let third_state = storage.read_state(&third.digest()).expect("read state").expect("third state");
    assert!(third_state.epoch > used_under_first, "epoch {} not above {}", third_state.epoch, used_under_first);
}

#[tokio::test]
async fn test_config_change_when_config_write_fails_then_instance_waits_for_persisted_config() {
    let network = test_network();
    let chain = Arc::new(MockChain::new());
    chain.set_config(network.contract.clone()).expect("config");
    let storage = MemoryStorage::new();
    storage.set_fail_writes(true);
    let node = node_on(&storage, &chain);
    node.start().expect("start");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(node.current_config_digest(), None);
    assert_eq!(persisted_digest(&storage), None);

    storage.set_fail_writes(false);
    wait_until("instance after config persisted", || node.current_config_digest() == Some(network.digest())).await;
    assert_eq!(persisted_digest(&storage), Some(network.digest()));
    node.close().await.expect("close");
}
