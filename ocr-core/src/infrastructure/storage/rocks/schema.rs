use crate::domain::PendingTransmissionKey;
use crate::foundation::{ConfigDigest, Hash32, OcrError};

/// Helper to build storage keys consistently.
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    pub fn hash32(mut self, hash: &Hash32) -> Self {
        self.buf.extend_from_slice(hash);
        self
    }

    pub fn u32_be(mut self, value: u32) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

pub const CF_DEFAULT: &str = "default";
pub const CF_METADATA: &str = "metadata";
pub const CF_STATE: &str = "state";
pub const CF_CONFIG: &str = "config";
pub const CF_PENDING: &str = "pending";

pub const KEY_SCHEMA_VERSION: &[u8] = b"schema_version";
pub const KEY_CURRENT_CONFIG: &[u8] = b"current";

pub const PENDING_KEY_LEN: usize = 32 + 4 + 1;

pub fn key_state(config_digest: &ConfigDigest) -> Vec<u8> {
    KeyBuilder::with_capacity(32).hash32(config_digest.as_hash()).build()
}

/// Leading bytes shared by every pending key of one config.
pub fn pending_prefix(config_digest: &ConfigDigest) -> Vec<u8> {
    KeyBuilder::with_capacity(32).hash32(config_digest.as_hash()).build()
}

/// Digest first so a prefix scan yields one config's entries in (epoch, round) order.
pub fn key_pending(key: &PendingTransmissionKey) -> Vec<u8> {
    KeyBuilder::with_capacity(PENDING_KEY_LEN).hash32(key.config_digest.as_hash()).u32_be(key.epoch).u8(key.round).build()
}

pub fn decode_pending_key(bytes: &[u8]) -> Result<PendingTransmissionKey, OcrError> {
    if bytes.len() != PENDING_KEY_LEN {
        return Err(crate::storage_err!("decode pending key", format!("invalid length {}", bytes.len())));
    }
    let digest: Hash32 = bytes[..32].try_into().map_err(|_| crate::storage_err!("decode pending key", "digest"))?;
    let epoch: [u8; 4] = bytes[32..36].try_into().map_err(|_| crate::storage_err!("decode pending key", "epoch"))?;
    Ok(PendingTransmissionKey::new(ConfigDigest::from(digest), u32::from_be_bytes(epoch), bytes[36]))
}
