use crate::fixtures::{test_network, NetworkBuilder};
use ocr_core::domain::{Report, SignatureShare};
use ocr_core::foundation::OcrError;
use ocr_core::infrastructure::chain::{ContractTransmitter, MockChain};

fn configured_chain() -> (MockChain, crate::fixtures::TestNetwork) {
    let network = test_network();
    let chain = MockChain::new();
    chain.set_config(network.contract.clone()).expect("config");
    (chain, network)
}

fn shares(network: &crate::fixtures::TestNetwork, report: &Report, signers: &[usize]) -> Vec<SignatureShare> {
    signers.iter().map(|signer| network.share(*signer, report)).collect()
}

fn assert_chain_error(result: Result<impl std::fmt::Debug, OcrError>, needle: &str) {
    match result {
        Err(OcrError::ChainError { details, .. }) => assert!(details.contains(needle), "unexpected details: {details}"),
        other => panic!("expected chain error containing {needle:?}, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transmit_when_single_signature_then_insufficient() {
    let (chain, network) = configured_chain();
    let report = network.report(network.key(2, 0), &[1, 2, 3]);
    assert_chain_error(chain.transmit(&report.bytes, &shares(&network, &report, &[0])).await, "insufficient signatures");
    assert_chain_error(chain.transmit(&report.bytes, &shares(&network, &report, &[0, 0])).await, "duplicate signer");
    assert!(chain.accepted().expect("accepted").is_empty());
}

#[tokio::test]
async fn test_transmit_when_older_round_after_newer_then_stale_rejected() {
    let (chain, network) = configured_chain();
    let newer = network.report(network.key(3, 1), &[5, 6]);
    let older = network.report(network.key(3, 0), &[7, 8]);
    chain.transmit(&newer.bytes, &shares(&network, &newer, &[0, 1])).await.expect("newer accepted");
    assert_chain_error(chain.transmit(&older.bytes, &shares(&network, &older, &[2, 3])).await, "stale report");
    assert_chain_error(chain.transmit(&newer.bytes, &shares(&network, &newer, &[2, 3])).await, "stale report");

    let accepted = chain.accepted().expect("accepted");
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].report.key, network.key(3, 1));
}

#[tokio::test]
async fn test_transmit_when_report_for_other_config_then_rejected() {
    let (chain, network) = configured_chain();
    let other = NetworkBuilder::default().config_count(9).build();
    let report = other.report(other.key(2, 0), &[1, 2]);
    assert_chain_error(chain.transmit(&report.bytes, &shares(&other, &report, &[0, 1])).await, "config digest mismatch");

    let forged = network.report(network.key(2, 0), &[1, 2]);
    let mut signatures = shares(&network, &forged, &[0, 1]);
    signatures[1].s[0] ^= 0xff;
    assert!(chain.transmit(&forged.bytes, &signatures).await.is_err());
}

#[tokio::test]
async fn test_transmit_when_failure_injected_then_recovers_after_count() {
    let (chain, network) = configured_chain();
    let report = network.report(network.key(2, 0), &[1, 2]);
    let signatures = shares(&network, &report, &[0, 1]);
    chain.fail_next_transmits(2).expect("inject");
    assert_chain_error(chain.transmit(&report.bytes, &signatures).await, "injected failure");
    assert_chain_error(chain.transmit(&report.bytes, &signatures).await, "injected failure");
    chain.transmit(&report.bytes, &signatures).await.expect("third attempt lands");
    assert_eq!(chain.transmit_attempts().expect("attempts"), 3);

    chain.set_fail_details(true).expect("inject");
    assert!(chain.latest_transmission_details().await.is_err());
}
