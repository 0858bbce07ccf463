//! Ledger-facing capabilities and an in-process contract used by tests and the devnet.

pub mod mock;
pub mod traits;

pub use mock::{AcceptedTransmission, MockChain};
pub use traits::{ConfigDetails, ConfigSubscription, ConfigTracker, ContractTransmitter, TxHandle};
