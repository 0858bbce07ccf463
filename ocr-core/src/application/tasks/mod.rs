//! Protocol tasks of one oracle instance and the messages they exchange.
//!
//! The router fans verified envelopes out to the scheduler, the aggregator and the co-signer.
//! Only the scheduler owns epoch state; the others receive snapshots through their channels.

pub mod aggregator;
pub mod cosigner;
pub mod observation;
pub mod router;
pub mod scheduler;
pub mod transmitter;

use crate::domain::{PendingTransmission, Report, RoundKey, SignatureShare, SignedObservation};
use crate::foundation::{Epoch, OracleId, Round};

#[derive(Clone, Debug)]
pub enum SchedulerEvent {
    NewEpoch { from: OracleId, epoch: Epoch },
    ObserveReq { from: OracleId, epoch: Epoch, round: Round },
    ReportReq { from: OracleId, epoch: Epoch, round: Round, observations: Vec<SignedObservation> },
    /// Leader side: a quorum of observations for `key` is available.
    ObservationsReady { key: RoundKey, observations: Vec<SignedObservation> },
    /// A quorum of shares exists for `key`.
    RoundFinalized { key: RoundKey },
    Timeout { kind: TimeoutKind, seq: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutKind {
    Progress,
    Resend,
    Round,
}

/// Request to sample and send one observation to `leader`.
#[derive(Clone, Debug)]
pub struct ObserveCommand {
    pub key: RoundKey,
    pub leader: OracleId,
}

#[derive(Clone, Debug)]
pub enum AggregatorCommand {
    /// Start collecting for `key`, dropping any previous round.
    Collect(RoundKey),
    Observe { from: OracleId, key: RoundKey, observation: SignedObservation },
}

#[derive(Clone, Debug)]
pub enum CosignCommand {
    Sign(Report),
    Share { from: OracleId, epoch: Epoch, round: Round, report: Vec<u8>, share: SignatureShare },
    Echo { from: OracleId, epoch: Epoch, round: Round, report: Vec<u8>, shares: Vec<SignatureShare> },
}

#[derive(Clone, Debug)]
pub enum TransmitCommand {
    Schedule { key: RoundKey, transmission: PendingTransmission },
}
