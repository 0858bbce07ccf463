use crate::domain::epoch::RoundKey;
use crate::domain::hashes::observation_payload;
use crate::domain::signing::{OffchainSigner, OffchainVerifier};
use crate::foundation::OracleId;
use serde::{Deserialize, Serialize};

/// One oracle's sampled value, signed over (digest, epoch, round, value).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedObservation {
    pub observer: OracleId,
    pub value: i128,
    pub signature: Vec<u8>,
}

impl SignedObservation {
    pub fn sign(key: &RoundKey, observer: OracleId, value: i128, signer: &dyn OffchainSigner) -> Self {
        let payload = observation_payload(&key.config_digest, key.epoch, key.round, value);
        Self { observer, value, signature: signer.sign(&payload) }
    }

    /// Checks the signature binds this value to exactly `key`.
    pub fn verify(&self, key: &RoundKey, verifier: &dyn OffchainVerifier) -> bool {
        let payload = observation_payload(&key.config_digest, key.epoch, key.round, self.value);
        verifier.verify(self.observer, &payload, &self.signature)
    }
}
