use crate::fixtures::test_network;
use ocr_core::domain::{median, verify_observation_set, ObservationCollector};
use ocr_core::foundation::OracleId;

/// Small linear congruential generator; deterministic across runs and platforms.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn value(&mut self) -> i128 {
        i128::from(self.next() as i64) - i128::from(u32::MAX)
    }
}

#[test]
fn test_median_when_values_permuted_then_result_unchanged() {
    let mut rng = Lcg(42);
    for len in 1..=31usize {
        let values: Vec<i128> = (0..len).map(|_| rng.value()).collect();
        let expected = median(&values).expect("non-empty");
        let mut shuffled = values.clone();
        for i in (1..shuffled.len()).rev() {
            let j = (rng.next() as usize) % (i + 1);
            shuffled.swap(i, j);
        }
        assert_eq!(median(&shuffled), Some(expected), "len={len}");

        let mut sorted = values.clone();
        sorted.sort_unstable();
        assert_eq!(expected, sorted[(len - 1) / 2]);
    }
}

#[test]
fn test_median_when_extreme_values_then_no_overflow() {
    assert_eq!(median(&[i128::MIN, i128::MAX]), Some(i128::MIN));
    assert_eq!(median(&[i128::MAX, i128::MIN, 0]), Some(0));
    assert_eq!(median(&[]), None);
}

#[test]
fn test_report_when_built_by_leader_and_followers_then_bytes_identical() {
    let network = test_network();
    let verifier = network.offchain_verifier();
    let key = network.key(6, 2);
    let observations = network.observations(&key, &[-5, 900, 17, 17]);

    let mut collector = ObservationCollector::new(key, network.quorum(), network.shared.n());
    for observation in observations.iter().rev() {
        collector.add(observation.observer, &key, observation.clone(), &verifier).expect("add");
    }
    let leader_report = collector.build_report().expect("leader report");

    let mut relayed = observations.clone();
    relayed.swap(0, 3);
    let follower_report =
        verify_observation_set(&key, &relayed, network.quorum(), network.shared.n(), &verifier).expect("follower report");

    assert_eq!(leader_report.bytes, follower_report.bytes);
    assert_eq!(leader_report.hash(), follower_report.hash());
    assert_eq!(leader_report.median, 17);
    assert_eq!(leader_report.observers, vec![OracleId(0), OracleId(1), OracleId(2), OracleId(3)]);
}
