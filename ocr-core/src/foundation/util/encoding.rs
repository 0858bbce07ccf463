use crate::foundation::{Hash32, OcrError};

pub fn decode_hex(s: &str) -> Result<Vec<u8>, OcrError> {
    let trimmed = s.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(stripped).map_err(|e| e.into())
}

pub fn parse_hex_fixed<const N: usize>(s: &str) -> Result<[u8; N], OcrError> {
    let bytes = decode_hex(s)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| OcrError::EncodingError(format!("expected {N} bytes, got {len}")))
}

pub fn parse_hex_32bytes(s: &str) -> Result<Hash32, OcrError> {
    parse_hex_fixed::<32>(s)
}
