//! Domain layer: pure protocol logic. No I/O, no clocks, no async.

pub mod aggregation;
pub mod config;
pub mod cosign;
pub mod epoch;
pub mod hashes;
pub mod observation;
pub mod phase;
pub mod report;
pub mod retry;
pub mod signing;
pub mod transmission;

pub use aggregation::{verify_observation_set, ObservationCollector};
pub use config::{ContractConfig, OffchainConfig, SharedConfig};
pub use cosign::{ShareCollector, ShareOutcome, SignOnceGuard, SignatureShare};
pub use epoch::{floor_state, fresh_epoch, leader, EpochDecision, FollowerRounds, Pacemaker, PersistentState, RoundKey};
pub use observation::SignedObservation;
pub use phase::ProtocolPhase;
pub use report::{median, Report};
pub use retry::RetryConfig;
pub use signing::{OffchainSigner, OffchainVerifier, OnchainSigner, OnchainVerifier};
pub use transmission::{stagger_delay, PendingTransmission, PendingTransmissionKey, TransmissionDetails};
