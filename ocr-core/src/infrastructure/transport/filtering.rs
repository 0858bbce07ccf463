use super::encoding;
use super::messages::MessageEnvelope;
use super::traits::TransportSubscription;
use crate::domain::OffchainVerifier;
use crate::foundation::{hx32, ConfigDigest, OcrError, OracleId, MAX_MESSAGE_SIZE_BYTES, SEEN_MESSAGE_WINDOW};
use futures_util::stream::BoxStream;
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Structural checks every inbound frame passes before it reaches a protocol task.
pub struct MessageFilter {
    config_digest: ConfigDigest,
    oracle_count: usize,
    verifier: Arc<dyn OffchainVerifier>,
    seen: HashMap<OracleId, BTreeSet<u64>>,
}

impl MessageFilter {
    pub fn new(config_digest: ConfigDigest, oracle_count: usize, verifier: Arc<dyn OffchainVerifier>) -> Self {
        Self { config_digest, oracle_count, verifier, seen: HashMap::new() }
    }

    pub fn accept(&mut self, bytes: &[u8], from: OracleId) -> Result<MessageEnvelope, OcrError> {
        if bytes.len() > MAX_MESSAGE_SIZE_BYTES {
            return Err(OcrError::MessageTooLarge { size: bytes.len(), max: MAX_MESSAGE_SIZE_BYTES });
        }
        let envelope = encoding::decode_envelope(bytes)?;
        let origin = envelope.origin();
        if !origin.belongs_to(&self.config_digest) {
            return Err(OcrError::WrongConfigDigest {
                expected: self.config_digest.to_string(),
                received: origin.config_digest.to_string(),
            });
        }
        if origin.oracle_id != from {
            return Err(OcrError::SenderMismatch { claimed: envelope.sender.0, actual: from.0 });
        }
        if envelope.sender.index() >= self.oracle_count {
            return Err(OcrError::UnknownOracle { oracle_id: envelope.sender.0, count: self.oracle_count });
        }

        let expected = encoding::payload_hash(&envelope.payload)?;
        if !bool::from(expected.as_hash().ct_eq(envelope.payload_hash.as_hash())) {
            return Err(OcrError::TransportError {
                operation: "payload_hash_mismatch".to_string(),
                details: format!(
                    "sender={} expected_hash={:#x} actual_hash={:#x}",
                    envelope.sender,
                    hx32(expected.as_hash()),
                    hx32(envelope.payload_hash.as_hash())
                ),
            });
        }
        let signing_hash = encoding::envelope_signing_hash(
            &envelope.config_digest,
            envelope.sender,
            envelope.seq_no,
            envelope.timestamp_nanos,
            &envelope.payload_hash,
        );
        if !self.verifier.verify(envelope.sender, &signing_hash, &envelope.signature) {
            return Err(OcrError::SignatureVerificationFailed { oracle_id: envelope.sender.0 });
        }
        self.mark_seen(envelope.sender, envelope.seq_no)?;
        Ok(envelope)
    }

    /// Rejects a repeated or too-old sequence number from `sender`.
    fn mark_seen(&mut self, sender: OracleId, seq_no: u64) -> Result<(), OcrError> {
        let window = self.seen.entry(sender).or_default();
        let below_window = window.len() >= SEEN_MESSAGE_WINDOW && window.first().is_some_and(|oldest| seq_no < *oldest);
        if below_window || !window.insert(seq_no) {
            return Err(OcrError::MessageReplayed { sender: sender.0, seq_no });
        }
        while window.len() > SEEN_MESSAGE_WINDOW {
            window.pop_first();
        }
        Ok(())
    }
}

/// Applies `filter` to a raw subscription; dropped frames are logged and skipped.
pub fn filter_stream(mut filter: MessageFilter, mut subscription: TransportSubscription) -> BoxStream<'static, MessageEnvelope> {
    let mapped = async_stream::stream! {
        while let Some(item) = subscription.next().await {
            let frame = match item {
                Ok(frame) => frame,
                Err(err) => {
                    warn!("transport stream error error={}", err);
                    continue;
                }
            };
            match filter.accept(&frame.bytes, frame.from) {
                Ok(envelope) => yield envelope,
                Err(err @ OcrError::MessageReplayed { .. }) => debug!("dropping replayed message from={} error={}", frame.from, err),
                Err(err @ OcrError::WrongConfigDigest { .. }) => debug!("dropping message for other config from={} error={}", frame.from, err),
                Err(err) => warn!("dropping invalid message from={} size={} error={}", frame.from, frame.bytes.len(), err),
            }
        }
    };
    Box::pin(mapped)
}
