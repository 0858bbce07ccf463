use crate::foundation::{OcrError, OracleId};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, OcrError>;

/// Raw bytes as delivered by the overlay, tagged with the sender the overlay authenticated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundFrame {
    pub bytes: Vec<u8>,
    pub from: OracleId,
}

pub struct TransportSubscription {
    inner: BoxStream<'static, Result<InboundFrame>>,
    _keepalive: Option<Box<dyn std::any::Any + Send>>,
}

impl TransportSubscription {
    pub fn new(inner: BoxStream<'static, Result<InboundFrame>>) -> Self {
        Self { inner, _keepalive: None }
    }

    pub fn new_with_keepalive(inner: BoxStream<'static, Result<InboundFrame>>, keepalive: Box<dyn std::any::Any + Send>) -> Self {
        Self { inner, _keepalive: Some(keepalive) }
    }

    pub async fn next(&mut self) -> Option<Result<InboundFrame>> {
        self.inner.next().await
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<InboundFrame>> {
        self.inner
    }
}

/// Best-effort point-to-point overlay scoped to one config's oracle set.
///
/// Sends never block and never fail from the caller's point of view.
pub trait Transport: Send + Sync {
    fn send_to(&self, bytes: Vec<u8>, to: OracleId);
    fn broadcast(&self, bytes: Vec<u8>);

    /// Lazy, infinite stream of inbound frames. Can be taken once per transport.
    fn receive(&self) -> Result<TransportSubscription>;
}

/// Opens a transport for one config: `peer_ids[i]` is the overlay identity of `OracleId(i)`.
pub trait TransportFactory: Send + Sync {
    fn open(&self, self_peer_id: &str, peer_ids: &[String]) -> Result<Arc<dyn Transport>>;
}
