use crate::fixtures::{test_network, NetworkBuilder};
use ocr_core::application::ConfigSync;
use ocr_core::infrastructure::chain::MockChain;
use ocr_core::infrastructure::config::ConfigSyncConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn sync_for(chain: &Arc<MockChain>, confirmations: u64) -> (ConfigSync, mpsc::Receiver<ocr_core::domain::ContractConfig>) {
    let (tx, rx) = mpsc::channel(4);
    let settings = ConfigSyncConfig { poll_interval_ms: 50, subscribe_interval_ms: 200, confirmations };
    (ConfigSync::new(chain.clone(), settings, Duration::from_secs(1), None, tx), rx)
}

#[tokio::test]
async fn test_check_when_change_not_deep_enough_then_withheld_until_confirmed() {
    let chain = Arc::new(MockChain::new());
    let network = test_network();
    chain.set_config(network.contract.clone()).expect("config");
    let (mut sync, mut changes) = sync_for(&chain, 3);

    sync.check().await.expect("check");
    assert!(changes.try_recv().is_err());

    chain.advance_blocks(2).expect("advance");
    sync.check().await.expect("check");
    assert_eq!(changes.try_recv().expect("forwarded").config_digest, network.digest());

    sync.check().await.expect("check");
    assert!(changes.try_recv().is_err(), "same digest forwarded twice");
}

#[tokio::test]
async fn test_run_when_config_replaced_then_each_change_forwarded_once() {
    let chain = Arc::new(MockChain::new());
    let first = test_network();
    let second = NetworkBuilder::default().config_count(2).build();
    chain.set_config(first.contract.clone()).expect("config");
    let (sync, mut changes) = sync_for(&chain, 1);
    let task = tokio::spawn(sync.run());

    let received = tokio::time::timeout(Duration::from_secs(5), changes.recv()).await.expect("first change").expect("open");
    assert_eq!(received.config_digest, first.digest());
    chain.set_config(second.contract.clone()).expect("config");
    let received = tokio::time::timeout(Duration::from_secs(5), changes.recv()).await.expect("second change").expect("open");
    assert_eq!(received.config_digest, second.digest());
    assert!(tokio::time::timeout(Duration::from_millis(300), changes.recv()).await.is_err());
    task.abort();
}
