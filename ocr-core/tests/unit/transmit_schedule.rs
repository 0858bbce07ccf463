use crate::fixtures::test_network;
use ocr_core::domain::hashes::transmit_order;
use ocr_core::domain::stagger_delay;
use ocr_core::foundation::OracleId;
use std::collections::BTreeSet;
use std::time::Duration;

#[test]
fn test_transmit_order_when_rounds_differ_then_each_is_permutation_and_first_rotates() {
    let network = test_network();
    let n = network.shared.n();
    let mut first_transmitters = BTreeSet::new();
    for epoch in 1..=16u32 {
        for round in 0..3u8 {
            let order = transmit_order(&network.digest(), epoch, round, n);
            let distinct: BTreeSet<OracleId> = order.iter().copied().collect();
            assert_eq!(order.len(), n);
            assert_eq!(distinct.len(), n);
            first_transmitters.insert(order[0]);
        }
    }
    assert!(first_transmitters.len() > 1, "first transmitter never rotates");
}

#[test]
fn test_stagger_delay_when_following_order_then_distinct_per_oracle() {
    let network = test_network();
    let order = transmit_order(&network.digest(), 7, 0, network.shared.n());
    let stage = Duration::from_millis(250);
    let delays: BTreeSet<Duration> = (0..network.shared.n()).map(|i| stagger_delay(&order, OracleId(i as u8), stage)).collect();
    assert_eq!(delays.len(), network.shared.n());
    assert_eq!(stagger_delay(&order, order[0], stage), Duration::ZERO);
}
