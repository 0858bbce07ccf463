use super::encoding;
use super::messages::{MessageEnvelope, TransportMessage};
use super::traits::Transport;
use crate::domain::OffchainSigner;
use crate::foundation::{now_nanos, ConfigDigest, OcrError, OracleId};
use log::{trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Seals protocol messages into signed envelopes and hands them to the transport.
pub struct Outbound {
    transport: Arc<dyn Transport>,
    signer: Arc<dyn OffchainSigner>,
    config_digest: ConfigDigest,
    self_id: OracleId,
    seq: AtomicU64,
}

impl Outbound {
    /// Sequence numbers start at the wall clock so a restarted node is not mistaken for a replay.
    pub fn new(transport: Arc<dyn Transport>, signer: Arc<dyn OffchainSigner>, config_digest: ConfigDigest, self_id: OracleId) -> Self {
        Self { transport, signer, config_digest, self_id, seq: AtomicU64::new(now_nanos().max(1)) }
    }

    pub fn self_id(&self) -> OracleId {
        self.self_id
    }

    pub fn seal(&self, payload: TransportMessage) -> Result<Vec<u8>, OcrError> {
        let payload_hash = encoding::payload_hash(&payload)?;
        let seq_no = self.seq.fetch_add(1, Ordering::Relaxed);
        let timestamp_nanos = now_nanos();
        let signing_hash = encoding::envelope_signing_hash(&self.config_digest, self.self_id, seq_no, timestamp_nanos, &payload_hash);
        let envelope = MessageEnvelope {
            config_digest: self.config_digest,
            sender: self.self_id,
            seq_no,
            timestamp_nanos,
            payload,
            payload_hash,
            signature: self.signer.sign(&signing_hash),
        };
        encoding::encode_envelope(&envelope)
    }

    /// Best effort; the sender is included.
    pub fn broadcast(&self, payload: TransportMessage) {
        let kind = payload.kind();
        match self.seal(payload) {
            Ok(bytes) => {
                trace!("broadcast kind={} size={}", kind, bytes.len());
                self.transport.broadcast(bytes);
            }
            Err(err) => warn!("failed to seal outbound message kind={} error={}", kind, err),
        }
    }

    pub fn send_to(&self, payload: TransportMessage, to: OracleId) {
        let kind = payload.kind();
        match self.seal(payload) {
            Ok(bytes) => {
                trace!("send kind={} to={} size={}", kind, to, bytes.len());
                self.transport.send_to(bytes, to);
            }
            Err(err) => warn!("failed to seal outbound message kind={} to={} error={}", kind, to, err),
        }
    }
}
