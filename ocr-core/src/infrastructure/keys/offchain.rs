use crate::domain::{OffchainConfig, OffchainSigner, OffchainVerifier};
use crate::foundation::{Hash32, OcrError, OracleId};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

#[derive(Clone)]
pub struct Ed25519Keyring {
    key: SigningKey,
}

impl Ed25519Keyring {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { key: SigningKey::from_bytes(&seed) }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl OffchainSigner for Ed25519Keyring {
    fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    fn sign(&self, payload: &Hash32) -> Vec<u8> {
        self.key.sign(payload).to_bytes().to_vec()
    }
}

/// Verifies against the off-chain keys of one config, indexed by `OracleId`.
pub struct ConfigKeyVerifier {
    keys: Vec<VerifyingKey>,
}

impl ConfigKeyVerifier {
    pub fn from_config(offchain: &OffchainConfig) -> Result<Self, OcrError> {
        let keys = offchain
            .offchain_public_keys
            .iter()
            .map(|bytes| {
                VerifyingKey::from_bytes(bytes)
                    .map_err(|err| OcrError::InvalidPublicKey { input: hex::encode(bytes), reason: err.to_string() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }
}

impl OffchainVerifier for ConfigKeyVerifier {
    fn verify(&self, oracle_id: OracleId, payload: &Hash32, signature: &[u8]) -> bool {
        let Some(key) = self.keys.get(oracle_id.index()) else {
            return false;
        };
        let signature = match Signature::from_slice(signature) {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        key.verify_strict(payload, &signature).is_ok()
    }
}
