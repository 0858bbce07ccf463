use crate::domain::{RoundKey, SignatureShare, SignedObservation};
use crate::foundation::{ConfigDigest, Epoch, OracleId, PayloadHash, Round, ScopedOracleId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageEnvelope {
    pub config_digest: ConfigDigest,
    pub sender: OracleId,
    pub seq_no: u64,
    pub timestamp_nanos: u64,
    pub payload: TransportMessage,
    pub payload_hash: PayloadHash,
    pub signature: Vec<u8>,
}

impl MessageEnvelope {
    /// The sender as seen under the config the envelope was signed for.
    pub fn origin(&self) -> ScopedOracleId {
        ScopedOracleId::new(self.config_digest, self.sender)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum TransportMessage {
    /// Announces the highest epoch the sender is willing to enter.
    NewEpoch { epoch: Epoch },
    /// Leader asks followers to observe for a round.
    ObserveReq { epoch: Epoch, round: Round },
    /// Follower's signed observation, sent to the leader only.
    Observe { epoch: Epoch, round: Round, observation: SignedObservation },
    /// Leader pins the observation set followers must sign over.
    ReportReq { epoch: Epoch, round: Round, observations: Vec<SignedObservation> },
    /// One oracle's share over canonical report bytes.
    ReportShare { epoch: Epoch, round: Round, report: Vec<u8>, share: SignatureShare },
    /// A finalized report with its quorum of shares.
    FinalEcho { epoch: Epoch, round: Round, report: Vec<u8>, shares: Vec<SignatureShare> },
}

impl TransportMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportMessage::NewEpoch { .. } => "new_epoch",
            TransportMessage::ObserveReq { .. } => "observe_req",
            TransportMessage::Observe { .. } => "observe",
            TransportMessage::ReportReq { .. } => "report_req",
            TransportMessage::ReportShare { .. } => "report_share",
            TransportMessage::FinalEcho { .. } => "final_echo",
        }
    }

    /// Round the message belongs to; `None` for epoch announcements.
    pub fn round_key(&self, config_digest: ConfigDigest) -> Option<RoundKey> {
        match self {
            TransportMessage::NewEpoch { .. } => None,
            TransportMessage::ObserveReq { epoch, round }
            | TransportMessage::Observe { epoch, round, .. }
            | TransportMessage::ReportReq { epoch, round, .. }
            | TransportMessage::ReportShare { epoch, round, .. }
            | TransportMessage::FinalEcho { epoch, round, .. } => Some(RoundKey::new(config_digest, *epoch, *round)),
        }
    }
}
