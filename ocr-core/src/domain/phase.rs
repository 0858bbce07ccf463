use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduler state of one node under one configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProtocolPhase {
    #[default]
    Idle = 0,
    AwaitingConfig = 1,
    LeaderElection = 2,
    ObservationGathering = 3,
    ReportAggregation = 4,
    CoSigning = 5,
    Transmitting = 6,
    Closed = 7,
}

impl ProtocolPhase {
    pub fn can_transition_to(self, target: ProtocolPhase) -> bool {
        use ProtocolPhase::*;
        if self == Closed {
            return false;
        }
        matches!(
            (self, target),
            (_, Closed)
                | (_, AwaitingConfig)
                | (AwaitingConfig, LeaderElection)
                | (LeaderElection, LeaderElection)
                | (LeaderElection, ObservationGathering)
                | (ObservationGathering, ReportAggregation)
                | (ReportAggregation, CoSigning)
                | (CoSigning, Transmitting)
                | (ObservationGathering, LeaderElection)
                | (ReportAggregation, LeaderElection)
                | (CoSigning, LeaderElection)
                | (Transmitting, LeaderElection)
                | (ObservationGathering, ObservationGathering)
                | (ReportAggregation, ObservationGathering)
                | (CoSigning, ObservationGathering)
                | (Transmitting, ObservationGathering)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ProtocolPhase::Closed
    }
}

impl fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolPhase::Idle => "idle",
            ProtocolPhase::AwaitingConfig => "awaiting_config",
            ProtocolPhase::LeaderElection => "leader_election",
            ProtocolPhase::ObservationGathering => "observation_gathering",
            ProtocolPhase::ReportAggregation => "report_aggregation",
            ProtocolPhase::CoSigning => "co_signing",
            ProtocolPhase::Transmitting => "transmitting",
            ProtocolPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}
