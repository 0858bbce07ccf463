use crate::domain::epoch::leader;
use crate::domain::hashes::{compute_config_digest, ConfigDigestInput};
use crate::foundation::{ConfigDigest, Epoch, OcrError, OracleId, MAX_ORACLES, OFFCHAIN_CONFIG_VERSION};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// On-chain configuration snapshot, as emitted by the config-set event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub config_digest: ConfigDigest,
    pub config_count: u64,
    /// Compressed secp256k1 public keys that sign reports, indexed by `OracleId`.
    pub signers: Vec<Vec<u8>>,
    /// Accounts allowed to submit reports, indexed by `OracleId`.
    pub transmitters: Vec<String>,
    pub threshold: u8,
    pub encoded_config_version: u64,
    pub encoded: Vec<u8>,
}

impl ContractConfig {
    /// Builds a config and derives its digest the same way every participant does.
    pub fn new(
        config_count: u64,
        signers: Vec<Vec<u8>>,
        transmitters: Vec<String>,
        threshold: u8,
        encoded_config_version: u64,
        encoded: Vec<u8>,
    ) -> Self {
        let mut config = Self {
            config_digest: ConfigDigest::default(),
            config_count,
            signers,
            transmitters,
            threshold,
            encoded_config_version,
            encoded,
        };
        config.config_digest = config.compute_digest();
        config
    }

    pub fn compute_digest(&self) -> ConfigDigest {
        compute_config_digest(&ConfigDigestInput {
            config_count: self.config_count,
            signers: &self.signers,
            transmitters: &self.transmitters,
            threshold: self.threshold,
            encoded_config_version: self.encoded_config_version,
            encoded: &self.encoded,
        })
    }

    pub fn verify_digest(&self) -> Result<(), OcrError> {
        let computed = self.compute_digest();
        if !computed.ct_eq(&self.config_digest) {
            return Err(OcrError::ConfigDigestMismatch { carried: self.config_digest.to_string(), computed: computed.to_string() });
        }
        Ok(())
    }

    pub fn oracle_count(&self) -> usize {
        self.signers.len()
    }

    pub fn oracle_for_signer(&self, public_key: &[u8]) -> Option<OracleId> {
        self.signers.iter().position(|signer| signer.as_slice() == public_key).and_then(|idx| OracleId::try_from(idx).ok())
    }
}

/// Protocol timing and off-chain identities, carried opaquely in `ContractConfig::encoded`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffchainConfig {
    /// Ed25519 keys used for observations and peer envelopes, indexed by `OracleId`.
    pub offchain_public_keys: Vec<[u8; 32]>,
    /// Overlay identities, indexed by `OracleId`.
    pub peer_ids: Vec<String>,
    pub delta_progress_ms: u64,
    pub delta_resend_ms: u64,
    pub delta_round_ms: u64,
    pub delta_stage_ms: u64,
    pub r_max: u8,
    pub max_epoch_jump: u32,
}

impl OffchainConfig {
    pub fn encode(&self) -> Result<Vec<u8>, OcrError> {
        bincode::DefaultOptions::new().with_fixint_encoding().serialize(self).map_err(|err| crate::serde_err!("bincode", err))
    }

    pub fn decode(version: u64, bytes: &[u8]) -> Result<Self, OcrError> {
        if version != OFFCHAIN_CONFIG_VERSION {
            return Err(OcrError::UnsupportedConfigVersion { version, supported: OFFCHAIN_CONFIG_VERSION });
        }
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_limit(crate::foundation::MAX_MESSAGE_SIZE_BYTES as u64)
            .deserialize(bytes)
            .map_err(|err| crate::serde_err!("bincode", err))
    }
}

/// Validated view of a contract config with its decoded off-chain parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedConfig {
    pub contract: ContractConfig,
    pub offchain: OffchainConfig,
}

impl SharedConfig {
    pub fn from_contract(contract: ContractConfig) -> Result<Self, OcrError> {
        contract.verify_digest()?;
        let offchain = OffchainConfig::decode(contract.encoded_config_version, &contract.encoded)?;
        let shared = Self { contract, offchain };
        shared.validate()?;
        Ok(shared)
    }

    fn validate(&self) -> Result<(), OcrError> {
        let n = self.contract.signers.len();
        let invalid = |reason: String| Err(OcrError::InvalidContractConfig { reason });
        if n == 0 || n > MAX_ORACLES {
            return invalid(format!("oracle count {n} outside 1..={MAX_ORACLES}"));
        }
        if self.contract.transmitters.len() != n || self.offchain.offchain_public_keys.len() != n || self.offchain.peer_ids.len() != n {
            return invalid(format!(
                "length mismatch signers={} transmitters={} offchain_keys={} peer_ids={}",
                n,
                self.contract.transmitters.len(),
                self.offchain.offchain_public_keys.len(),
                self.offchain.peer_ids.len()
            ));
        }
        if usize::from(self.contract.threshold) + 1 > n {
            return invalid(format!("threshold {} requires more than {n} oracles", self.contract.threshold));
        }
        if self.offchain.delta_progress_ms == 0 || self.offchain.delta_resend_ms == 0 || self.offchain.delta_round_ms == 0 {
            return invalid("protocol timings must be non-zero".to_string());
        }
        if self.offchain.r_max == 0 {
            return invalid("r_max must be at least 1".to_string());
        }
        if self.offchain.max_epoch_jump == 0 {
            return invalid("max_epoch_jump must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn digest(&self) -> ConfigDigest {
        self.contract.config_digest
    }

    pub fn n(&self) -> usize {
        self.contract.signers.len()
    }

    /// Matching contributions required for observations, shares and epoch changes.
    pub fn quorum(&self) -> usize {
        usize::from(self.contract.threshold) + 1
    }

    pub fn leader(&self, epoch: Epoch) -> OracleId {
        leader(epoch, self.n())
    }

    pub fn delta_progress(&self) -> Duration {
        Duration::from_millis(self.offchain.delta_progress_ms)
    }

    pub fn delta_resend(&self) -> Duration {
        Duration::from_millis(self.offchain.delta_resend_ms)
    }

    pub fn delta_round(&self) -> Duration {
        Duration::from_millis(self.offchain.delta_round_ms)
    }

    pub fn peer_id(&self, oracle_id: OracleId) -> Option<&str> {
        self.offchain.peer_ids.get(oracle_id.index()).map(String::as_str)
    }

    pub fn delta_stage(&self) -> Duration {
        Duration::from_millis(self.offchain.delta_stage_ms)
    }
}
