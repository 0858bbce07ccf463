//! Concrete key backends: ed25519 for off-chain messages, recoverable secp256k1 for reports.

pub mod offchain;
pub mod onchain;

pub use offchain::{ConfigKeyVerifier, Ed25519Keyring};
pub use onchain::{Secp256k1Keyring, SignerSetVerifier};
