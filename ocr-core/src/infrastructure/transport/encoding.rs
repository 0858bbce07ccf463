use super::messages::{MessageEnvelope, TransportMessage};
use crate::foundation::{ConfigDigest, Hash32, OcrError, OracleId, PayloadHash, MAX_MESSAGE_SIZE_BYTES};
use bincode::Options;

const WIRE_PROTOCOL_VERSION_V1: u16 = 1;
const ENVELOPE_DOMAIN_V1: &[u8] = b"ocr:envelope:v1:";

pub fn encode_envelope(envelope: &MessageEnvelope) -> Result<Vec<u8>, OcrError> {
    let mut out = Vec::new();
    out.extend_from_slice(&WIRE_PROTOCOL_VERSION_V1.to_le_bytes());
    let bytes = bincode::DefaultOptions::new().with_fixint_encoding().serialize(envelope).map_err(|err| crate::serde_err!("bincode", err))?;
    out.extend_from_slice(&bytes);
    if out.len() > MAX_MESSAGE_SIZE_BYTES {
        return Err(OcrError::MessageTooLarge { size: out.len(), max: MAX_MESSAGE_SIZE_BYTES });
    }
    Ok(out)
}

pub fn decode_envelope(bytes: &[u8]) -> Result<MessageEnvelope, OcrError> {
    if bytes.len() > MAX_MESSAGE_SIZE_BYTES {
        return Err(OcrError::MessageTooLarge { size: bytes.len(), max: MAX_MESSAGE_SIZE_BYTES });
    }
    if bytes.len() < 2 {
        return Err(OcrError::TransportError { operation: "decode_envelope".to_string(), details: "message too short".to_string() });
    }
    let version = u16::from_le_bytes([bytes[0], bytes[1]]);
    if version != WIRE_PROTOCOL_VERSION_V1 {
        return Err(OcrError::TransportError {
            operation: "decode_envelope".to_string(),
            details: format!("wire protocol version mismatch: expected {WIRE_PROTOCOL_VERSION_V1}, got {version}"),
        });
    }
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_MESSAGE_SIZE_BYTES as u64)
        .deserialize(&bytes[2..])
        .map_err(|err| crate::serde_err!("bincode", err))
}

pub fn payload_hash(payload: &TransportMessage) -> Result<PayloadHash, OcrError> {
    let bytes = bincode::DefaultOptions::new().with_fixint_encoding().serialize(payload).map_err(|err| crate::serde_err!("bincode", err))?;
    Ok(PayloadHash::from(*blake3::hash(&bytes).as_bytes()))
}

/// Bytes the envelope signature covers: everything except the signature itself.
pub fn envelope_signing_hash(
    config_digest: &ConfigDigest,
    sender: OracleId,
    seq_no: u64,
    timestamp_nanos: u64,
    payload_hash: &PayloadHash,
) -> Hash32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ENVELOPE_DOMAIN_V1);
    hasher.update(config_digest.as_hash());
    hasher.update(&[sender.0]);
    hasher.update(&seq_no.to_be_bytes());
    hasher.update(&timestamp_nanos.to_be_bytes());
    hasher.update(payload_hash.as_hash());
    *hasher.finalize().as_bytes()
}
