//! In-process overlay. Every peer id owns a bounded `broadcast` inbox, so a slow receiver
//! loses its oldest frames instead of stalling senders.

use super::traits::{InboundFrame, Transport, TransportFactory, TransportSubscription};
use crate::foundation::{OcrError, OracleId, DEFAULT_INBOX_CAPACITY};
use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

#[derive(Clone, Debug)]
struct HubFrame {
    from: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct HubInner {
    inboxes: HashMap<String, broadcast::Sender<HubFrame>>,
    isolated: HashSet<String>,
}

pub struct MockHub {
    inner: Mutex<HubInner>,
    inbox_capacity: usize,
}

impl MockHub {
    pub fn new() -> Self {
        Self::with_inbox_capacity(DEFAULT_INBOX_CAPACITY)
    }

    pub fn with_inbox_capacity(inbox_capacity: usize) -> Self {
        Self { inner: Mutex::new(HubInner::default()), inbox_capacity: inbox_capacity.max(1) }
    }

    /// Cuts `peer_id` off: nothing it sends or is sent is delivered until `heal`.
    pub fn isolate(&self, peer_id: &str) {
        if let Ok(mut inner) = self.lock_inner() {
            inner.isolated.insert(peer_id.to_string());
        }
    }

    pub fn heal(&self, peer_id: &str) {
        if let Ok(mut inner) = self.lock_inner() {
            inner.isolated.remove(peer_id);
        }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, HubInner>, OcrError> {
        self.inner
            .lock()
            .map_err(|_| OcrError::TransportError { operation: "mock hub lock".to_string(), details: "poisoned".to_string() })
    }

    fn inbox(&self, inner: &mut HubInner, peer_id: &str) -> broadcast::Sender<HubFrame> {
        let capacity = self.inbox_capacity;
        inner.inboxes.entry(peer_id.to_string()).or_insert_with(|| broadcast::channel(capacity).0).clone()
    }

    fn deliver(&self, from: &str, to: &str, bytes: Vec<u8>) {
        let sender = match self.lock_inner() {
            Ok(mut inner) => {
                if inner.isolated.contains(from) || inner.isolated.contains(to) {
                    trace!("mock hub dropping frame from={} to={} reason=isolated", from, to);
                    return;
                }
                self.inbox(&mut inner, to)
            }
            Err(err) => {
                warn!("mock hub deliver failed error={}", err);
                return;
            }
        };
        // No receiver means the peer is offline; best-effort delivery treats that as sent.
        let _ = sender.send(HubFrame { from: from.to_string(), bytes });
    }

    fn subscribe(&self, peer_id: &str) -> Result<broadcast::Receiver<HubFrame>, OcrError> {
        let mut inner = self.lock_inner()?;
        Ok(self.inbox(&mut inner, peer_id).subscribe())
    }
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for Arc<MockHub> {
    fn open(&self, self_peer_id: &str, peer_ids: &[String]) -> Result<Arc<dyn Transport>, OcrError> {
        Ok(Arc::new(MockTransport::new(self.clone(), self_peer_id, peer_ids.to_vec())?))
    }
}

pub struct MockTransport {
    hub: Arc<MockHub>,
    self_peer_id: String,
    peers: Vec<String>,
    receiver: Mutex<Option<broadcast::Receiver<HubFrame>>>,
}

impl MockTransport {
    /// Subscribes immediately so frames sent after construction are never missed.
    pub fn new(hub: Arc<MockHub>, self_peer_id: &str, peers: Vec<String>) -> Result<Self, OcrError> {
        let receiver = hub.subscribe(self_peer_id)?;
        debug!("mock transport opened peer_id={} peers={}", self_peer_id, peers.len());
        Ok(Self { hub, self_peer_id: self_peer_id.to_string(), peers, receiver: Mutex::new(Some(receiver)) })
    }
}

impl Transport for MockTransport {
    fn send_to(&self, bytes: Vec<u8>, to: OracleId) {
        match self.peers.get(to.index()) {
            Some(peer) => self.hub.deliver(&self.self_peer_id, peer, bytes),
            None => debug!("mock transport send_to unknown oracle to={}", to),
        }
    }

    fn broadcast(&self, bytes: Vec<u8>) {
        for peer in &self.peers {
            self.hub.deliver(&self.self_peer_id, peer, bytes.clone());
        }
    }

    fn receive(&self) -> Result<TransportSubscription, OcrError> {
        let mut receiver = self
            .receiver
            .lock()
            .map_err(|_| OcrError::TransportError { operation: "mock receive".to_string(), details: "poisoned".to_string() })?
            .take()
            .ok_or_else(|| OcrError::TransportError {
                operation: "mock receive".to_string(),
                details: "receive stream already taken".to_string(),
            })?;
        let peers = self.peers.clone();
        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(frame) => match peers.iter().position(|peer| *peer == frame.from).and_then(|idx| OracleId::try_from(idx).ok()) {
                        Some(from) => yield Ok(InboundFrame { bytes: frame.bytes, from }),
                        None => trace!("mock transport dropping frame from unknown peer from={}", frame.from),
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        yield Err(OcrError::TransportError { operation: "mock receive".to_string(), details: format!("lagged skipped={skipped}") });
                    }
                }
            }
        };
        Ok(TransportSubscription::new(Box::pin(stream)))
    }
}
