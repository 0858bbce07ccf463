//! Median aggregation and the canonical report encoding.
//!
//! Layout (big endian):
//!
//! ```text
//! u8       encoding version (REPORT_ENCODING_VERSION)
//! [u8;32]  config digest
//! u32      epoch
//! u8       round
//! i128     median
//! u8       observer count
//! u8[]     observer oracle ids, ascending
//! ```

use crate::domain::epoch::RoundKey;
use crate::domain::hashes::report_hash;
use crate::domain::observation::SignedObservation;
use crate::foundation::{ConfigDigest, OcrError, OracleId, ReportHash, MAX_ORACLES, REPORT_ENCODING_VERSION};
use serde::{Deserialize, Serialize};

const HEADER_LEN: usize = 1 + 32 + 4 + 1 + 16 + 1;

/// Median of `values`; for an even count the lower of the two middle values.
pub fn median(values: &[i128]) -> Option<i128> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[(sorted.len() - 1) / 2])
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub key: RoundKey,
    pub median: i128,
    /// Contributing oracles, ascending.
    pub observers: Vec<OracleId>,
    pub bytes: Vec<u8>,
}

impl Report {
    pub fn from_observations(key: RoundKey, observations: &[SignedObservation]) -> Result<Self, OcrError> {
        let values: Vec<i128> = observations.iter().map(|obs| obs.value).collect();
        let median = median(&values).ok_or(OcrError::InsufficientObservations { required: 1, received: 0 })?;
        let mut observers: Vec<OracleId> = observations.iter().map(|obs| obs.observer).collect();
        observers.sort_unstable();
        observers.dedup();
        if observers.len() != observations.len() {
            return Err(OcrError::MalformedReport("duplicate observer".to_string()));
        }
        let bytes = encode_report(&key, median, &observers)?;
        Ok(Self { key, median, observers, bytes })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, OcrError> {
        if bytes.len() < HEADER_LEN {
            return Err(OcrError::MalformedReport(format!("report too short: {} bytes", bytes.len())));
        }
        if bytes[0] != REPORT_ENCODING_VERSION {
            return Err(OcrError::MalformedReport(format!("unknown report version {}", bytes[0])));
        }
        let digest: [u8; 32] = bytes[1..33].try_into().map_err(|_| OcrError::MalformedReport("digest".to_string()))?;
        let epoch = u32::from_be_bytes(bytes[33..37].try_into().map_err(|_| OcrError::MalformedReport("epoch".to_string()))?);
        let round = bytes[37];
        let median = i128::from_be_bytes(bytes[38..54].try_into().map_err(|_| OcrError::MalformedReport("median".to_string()))?);
        let count = usize::from(bytes[54]);
        if bytes.len() != HEADER_LEN + count {
            return Err(OcrError::MalformedReport(format!("expected {} observer bytes, got {}", count, bytes.len() - HEADER_LEN)));
        }
        let observers: Vec<OracleId> = bytes[HEADER_LEN..].iter().copied().map(OracleId).collect();
        if count == 0 || observers.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(OcrError::MalformedReport("observers must be non-empty and strictly ascending".to_string()));
        }
        Ok(Self { key: RoundKey::new(ConfigDigest::from(digest), epoch, round), median, observers, bytes: bytes.to_vec() })
    }

    pub fn hash(&self) -> ReportHash {
        report_hash(&self.bytes)
    }
}

fn encode_report(key: &RoundKey, median: i128, observers: &[OracleId]) -> Result<Vec<u8>, OcrError> {
    if observers.is_empty() || observers.len() > MAX_ORACLES {
        return Err(OcrError::MalformedReport(format!("observer count {} out of range", observers.len())));
    }
    let mut out = Vec::with_capacity(HEADER_LEN + observers.len());
    out.push(REPORT_ENCODING_VERSION);
    out.extend_from_slice(key.config_digest.as_hash());
    out.extend_from_slice(&key.epoch.to_be_bytes());
    out.push(key.round);
    out.extend_from_slice(&median.to_be_bytes());
    out.push(observers.len() as u8);
    out.extend(observers.iter().map(|id| id.0));
    Ok(out)
}
