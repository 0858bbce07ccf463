use crate::domain::cosign::SignatureShare;
use crate::domain::epoch::RoundKey;
use crate::domain::report::Report;
use crate::foundation::{ConfigDigest, Epoch, OcrError, OracleId, Round};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pending transmissions are keyed by the round that produced them.
pub type PendingTransmissionKey = RoundKey;

/// A quorum-signed report waiting to land on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransmission {
    pub time_nanos: u64,
    pub median: i128,
    pub serialized_report: Vec<u8>,
    pub shares: Vec<SignatureShare>,
}

impl PendingTransmission {
    pub fn report(&self) -> Result<Report, OcrError> {
        Report::decode(&self.serialized_report)
    }

    pub fn is_older_than(&self, cutoff_nanos: u64) -> bool {
        self.time_nanos < cutoff_nanos
    }
}

/// What the contract last accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionDetails {
    pub config_digest: ConfigDigest,
    pub epoch: Epoch,
    pub round: Round,
    pub latest_answer: i128,
    pub latest_timestamp_nanos: u64,
}

impl TransmissionDetails {
    pub fn round_key(&self) -> RoundKey {
        RoundKey::new(self.config_digest, self.epoch, self.round)
    }

    /// True when the chain already holds `key` or a later round of the same config.
    pub fn supersedes(&self, key: &PendingTransmissionKey) -> bool {
        self.round_key().is_at_or_after(key)
    }
}

/// Delay before `self_id` makes its first attempt, given the round's transmit order.
pub fn stagger_delay(order: &[OracleId], self_id: OracleId, delta_stage: Duration) -> Duration {
    let rank = order.iter().position(|id| *id == self_id).unwrap_or(order.len());
    delta_stage.saturating_mul(u32::try_from(rank).unwrap_or(u32::MAX))
}
