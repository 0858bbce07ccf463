use crate::fixtures::test_network;
use ocr_core::domain::{PendingTransmission, PersistentState};
use ocr_core::foundation::{ConfigDigest, OcrError};
use ocr_core::infrastructure::storage::{Database, RocksStorage};

fn pending(time_nanos: u64, median: i128) -> PendingTransmission {
    PendingTransmission { time_nanos, median, serialized_report: vec![1, 2, 3], shares: Vec::new() }
}

#[test]
fn test_rocks_when_reopened_then_config_state_and_pending_survive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let network = test_network();
    let digest = network.digest();
    let key = network.key(4, 1);
    let state = PersistentState { epoch: 4, highest_sent_epoch: 5, highest_received_epoch: vec![4, 5, 0, 0] };
    {
        let storage = RocksStorage::open_in_dir(dir.path()).expect("open");
        storage.write_config(&network.contract).expect("config");
        storage.write_state(&digest, &state).expect("state");
        storage.store_pending_transmission(&key, &pending(10, 11)).expect("pending");
    }

    let storage = RocksStorage::open_in_dir(dir.path()).expect("reopen");
    assert_eq!(storage.read_config().expect("config"), Some(network.contract.clone()));
    assert_eq!(storage.read_state(&digest).expect("state"), Some(state.clone()));
    assert_eq!(storage.pending_transmissions_with_config_digest(&digest).expect("pending").get(&key), Some(&pending(10, 11)));
    assert_eq!(storage.read_state(&ConfigDigest::new([0xee; 32])).expect("other digest"), None);

    let regressed = PersistentState { highest_sent_epoch: 4, ..state };
    assert!(matches!(storage.write_state(&digest, &regressed), Err(OcrError::EpochRegression { .. })));
}

#[test]
fn test_rocks_when_gc_runs_then_only_old_pending_removed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let network = test_network();
    let storage = RocksStorage::open_in_dir(dir.path()).expect("open");
    storage.store_pending_transmission(&network.key(2, 0), &pending(100, 1)).expect("old");
    storage.store_pending_transmission(&network.key(2, 1), &pending(300, 2)).expect("new");

    assert_eq!(storage.delete_pending_transmissions_older_than(200).expect("gc"), 1);
    let remaining = storage.pending_transmissions_with_config_digest(&network.digest()).expect("pending");
    assert_eq!(remaining.keys().copied().collect::<Vec<_>>(), vec![network.key(2, 1)]);

    storage.delete_pending_transmission(&network.key(2, 1)).expect("delete");
    storage.delete_pending_transmission(&network.key(2, 1)).expect("delete again");
    assert!(storage.pending_transmissions_with_config_digest(&network.digest()).expect("pending").is_empty());
}
