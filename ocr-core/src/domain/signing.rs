//! Signing capabilities consumed by the protocol. Implementations live in `infrastructure::keys`.

use crate::domain::cosign::SignatureShare;
use crate::foundation::{Hash32, OcrError, OracleId, ReportHash};

/// Off-chain identity: signs observations and peer envelopes.
pub trait OffchainSigner: Send + Sync {
    fn public_key(&self) -> [u8; 32];
    fn sign(&self, payload: &Hash32) -> Vec<u8>;
}

/// Verifies off-chain signatures against the keys of the current config.
pub trait OffchainVerifier: Send + Sync {
    fn verify(&self, oracle_id: OracleId, payload: &Hash32, signature: &[u8]) -> bool;
}

/// On-chain identity: signs canonical report bytes.
pub trait OnchainSigner: Send + Sync {
    /// Public key as it appears in `ContractConfig::signers`.
    fn public_key(&self) -> Vec<u8>;
    fn sign_report(&self, signer: OracleId, report_hash: &ReportHash) -> Result<SignatureShare, OcrError>;
}

/// Verifies report shares against the signer list of the current config.
pub trait OnchainVerifier: Send + Sync {
    fn verify_share(&self, report_hash: &ReportHash, share: &SignatureShare) -> bool;
}
