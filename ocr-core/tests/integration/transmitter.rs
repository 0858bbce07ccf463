use crate::fixtures::{fast_node_settings, test_network, wait_until, RecordingObserver, TestNetwork};
use ocr_core::application::tasks::transmitter::Transmitter;
use ocr_core::application::tasks::TransmitCommand;
use ocr_core::application::AbortOnDrop;
use ocr_core::domain::{PendingTransmission, RoundKey};
use ocr_core::foundation::{now_nanos, ConfigDigest, OracleId};
use ocr_core::infrastructure::chain::{ContractTransmitter, MockChain};
use ocr_core::infrastructure::config::TransmissionConfig;
use ocr_core::infrastructure::storage::{Database, MemoryStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const VALUES: [i128; 3] = [10, 12, 11];

struct Harness {
    network: TestNetwork,
    chain: Arc<MockChain>,
    storage: MemoryStorage,
    observer: Arc<RecordingObserver>,
}

impl Harness {
    fn new() -> Self {
        let network = test_network();
        let chain = Arc::new(MockChain::new());
        chain.set_config(network.contract.clone()).expect("config");
        Self { network, chain, storage: MemoryStorage::new(), observer: RecordingObserver::new() }
    }

    fn pending(&self, key: RoundKey, time_nanos: u64) -> PendingTransmission {
        let report = self.network.report(key, &VALUES);
        let shares = (0..self.network.quorum()).map(|signer| self.network.share(signer, &report)).collect();
        PendingTransmission { time_nanos, median: report.median, serialized_report: report.bytes, shares }
    }

    fn store(&self, key: RoundKey, time_nanos: u64) {
        self.storage.store_pending_transmission(&key, &self.pending(key, time_nanos)).expect("store pending");
    }

    fn stored(&self, digest: &ConfigDigest) -> usize {
        self.storage.pending_transmissions_with_config_digest(digest).expect("pending").len()
    }

    /// Runs a transmitter for oracle 0; dropping the sender stops it.
    fn spawn(&self, settings: TransmissionConfig) -> (mpsc::Sender<TransmitCommand>, AbortOnDrop) {
        let transmitter = Transmitter {
            shared: Arc::new(self.network.shared.clone()),
            self_id: OracleId(0),
            database: Arc::new(self.storage.clone()),
            chain: self.chain.clone(),
            settings,
            chain_timeout: Duration::from_secs(1),
            observer: self.observer.clone(),
        };
        let (commands, receiver) = mpsc::channel(8);
        (commands, AbortOnDrop::spawn(transmitter.run(receiver)))
    }

    fn accepted_keys(&self) -> Vec<RoundKey> {
        self.chain.accepted().expect("accepted").into_iter().map(|entry| entry.report.key).collect()
    }
}

#[tokio::test]
async fn test_transmitter_when_entries_stored_before_start_then_resumed_and_delivered() {
    let harness = Harness::new();
    let key = harness.network.key(5, 0);
    harness.store(key, now_nanos());

    let (_commands, task) = harness.spawn(fast_node_settings().transmission);
    wait_until("resumed entry confirmed", || harness.observer.confirmed().contains(&key)).await;

    assert_eq!(harness.accepted_keys(), vec![key]);
    assert_eq!(harness.stored(&harness.network.digest()), 0);
    task.shutdown().await;
}

#[tokio::test]
async fn test_transmitter_when_transmits_fail_then_retried_with_backoff_until_landed() {
    let harness = Harness::new();
    let key = harness.network.key(7, 0);
    harness.chain.fail_next_transmits(2).expect("inject failures");
    let settings = fast_node_settings().transmission;
    let min_backoff = Duration::from_millis(settings.retry.delay_for_retry(1) + settings.retry.delay_for_retry(2));

    let (commands, task) = harness.spawn(settings);
    let started = Instant::now();
    commands.send(TransmitCommand::Schedule { key, transmission: harness.pending(key, now_nanos()) }).await.expect("schedule");
    wait_until("entry confirmed after retries", || harness.observer.confirmed().contains(&key)).await;

    assert!(started.elapsed() >= min_backoff, "retried after {:?}, expected at least {:?}", started.elapsed(), min_backoff);
    assert_eq!(harness.chain.transmit_attempts().expect("attempts"), 3);
    assert_eq!(harness.observer.transmit_failures(&key), 2);
    assert_eq!(harness.accepted_keys(), vec![key]);
    assert_eq!(harness.stored(&harness.network.digest()), 0);
    task.shutdown().await;
}

#[tokio::test]
async fn test_transmitter_when_chain_holds_equal_or_later_key_then_entries_dropped_without_transmit() {
    let harness = Harness::new();
    let landed = harness.network.key(5, 1);
    let landed_entry = harness.pending(landed, now_nanos());
    harness.chain.transmit(&landed_entry.serialized_report, &landed_entry.shares).await.expect("land report");

    let older_round = harness.network.key(5, 0);
    let older_epoch = harness.network.key(4, 3);
    for key in [landed, older_round, older_epoch] {
        harness.store(key, now_nanos());
    }

    let (_commands, task) = harness.spawn(fast_node_settings().transmission);
    wait_until("superseded entries dropped", || harness.stored(&harness.network.digest()) == 0).await;
    wait_until("all entries resolved", || harness.observer.abandoned().len() == 2 && harness.observer.confirmed().len() == 1).await;

    assert_eq!(harness.chain.transmit_attempts().expect("attempts"), 1);
    assert_eq!(harness.observer.confirmed(), vec![landed]);
    let mut abandoned: Vec<RoundKey> = harness.observer.abandoned().into_iter().map(|(key, _)| key).collect();
    abandoned.sort();
    assert_eq!(abandoned, vec![older_epoch, older_round]);
    task.shutdown().await;
}

#[tokio::test]
async fn test_transmitter_when_entries_past_retention_then_expired_and_collected() {
    let harness = Harness::new();
    let key = harness.network.key(9, 0);
    harness.store(key, 1);
    let other_digest = ConfigDigest::new([0xEE; 32]);
    let other_key = RoundKey::new(other_digest, 3, 0);
    harness.storage.store_pending_transmission(&other_key, &harness.pending(key, 1)).expect("store other");
    let fresh_other = RoundKey::new(other_digest, 4, 0);
    harness.storage.store_pending_transmission(&fresh_other, &harness.pending(key, now_nanos())).expect("store fresh");

    let (_commands, task) = harness.spawn(fast_node_settings().transmission);
    wait_until("expired entry abandoned", || harness.observer.abandoned().iter().any(|(abandoned, reason)| *abandoned == key && reason == "expired"))
        .await;
    wait_until("old entries collected", || harness.stored(&harness.network.digest()) == 0 && harness.stored(&other_digest) == 1).await;

    assert_eq!(harness.chain.transmit_attempts().expect("attempts"), 0);
    assert!(harness.storage.pending_transmissions_with_config_digest(&other_digest).expect("pending").contains_key(&fresh_other));
    task.shutdown().await;
}
