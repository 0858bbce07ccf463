use crate::fixtures::{peer_id, test_network};
use futures_util::StreamExt;
use ocr_core::domain::OffchainSigner;
use ocr_core::foundation::OracleId;
use ocr_core::infrastructure::transport::{filter_stream, MessageFilter, MockHub, Outbound, Transport, TransportFactory, TransportMessage};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_outbound_when_broadcast_then_every_peer_including_self_receives_verified() {
    let network = test_network();
    let hub = Arc::new(MockHub::new());
    let peers: Vec<String> = (0..network.shared.n()).map(peer_id).collect();
    let transports: Vec<_> = peers.iter().map(|peer| hub.open(peer, &peers).expect("open")).collect();
    let mut inboxes: Vec<_> = transports
        .iter()
        .map(|transport| {
            let filter = MessageFilter::new(network.digest(), network.shared.n(), Arc::new(network.offchain_verifier()));
            filter_stream(filter, transport.receive().expect("receive"))
        })
        .collect();

    let signer: Arc<dyn OffchainSigner> = Arc::new(network.keys[1].offchain.clone());
    let outbound = Outbound::new(transports[1].clone(), signer, network.digest(), OracleId(1));
    outbound.broadcast(TransportMessage::NewEpoch { epoch: 9 });

    for inbox in inboxes.iter_mut() {
        let envelope = tokio::time::timeout(Duration::from_secs(1), inbox.next()).await.expect("delivered").expect("open");
        assert_eq!(envelope.sender, OracleId(1));
        assert_eq!(envelope.payload, TransportMessage::NewEpoch { epoch: 9 });
    }
}

#[tokio::test]
async fn test_filter_when_signed_with_wrong_key_then_dropped() {
    let network = test_network();
    let hub = Arc::new(MockHub::new());
    let peers: Vec<String> = (0..network.shared.n()).map(peer_id).collect();
    let sender = hub.open(&peers[2], &peers).expect("open");
    let receiver = hub.open(&peers[0], &peers).expect("open");
    let filter = MessageFilter::new(network.digest(), network.shared.n(), Arc::new(network.offchain_verifier()));
    let mut inbox = filter_stream(filter, receiver.receive().expect("receive"));

    // Oracle 2's transport, oracle 3's key.
    let impostor = Outbound::new(sender.clone(), Arc::new(network.keys[3].offchain.clone()), network.digest(), OracleId(2));
    impostor.send_to(TransportMessage::NewEpoch { epoch: 4 }, OracleId(0));
    let honest = Outbound::new(sender, Arc::new(network.keys[2].offchain.clone()), network.digest(), OracleId(2));
    honest.send_to(TransportMessage::NewEpoch { epoch: 5 }, OracleId(0));

    let envelope = tokio::time::timeout(Duration::from_secs(1), inbox.next()).await.expect("delivered").expect("open");
    assert_eq!(envelope.payload, TransportMessage::NewEpoch { epoch: 5 });
}
