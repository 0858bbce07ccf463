use crate::foundation::{ConfigDigest, Epoch, Hash32, OracleId, ReportHash, Round};
use blake3::Hasher;

const CONFIG_DIGEST_DOMAIN_V1: &[u8] = b"ocr:config-digest:v1:";
const OBSERVATION_DOMAIN_V1: &[u8] = b"ocr:observation:v1:";
const REPORT_DOMAIN_V1: &[u8] = b"ocr:report:v1:";
const TRANSMIT_ORDER_DOMAIN_V1: &[u8] = b"ocr:transmit-order:v1:";

/// Inputs of the config digest, in the order they are hashed.
pub struct ConfigDigestInput<'a> {
    pub config_count: u64,
    pub signers: &'a [Vec<u8>],
    pub transmitters: &'a [String],
    pub threshold: u8,
    pub encoded_config_version: u64,
    pub encoded: &'a [u8],
}

pub fn compute_config_digest(input: &ConfigDigestInput<'_>) -> ConfigDigest {
    let mut hasher = Hasher::new();
    hasher.update(CONFIG_DIGEST_DOMAIN_V1);
    hasher.update(&input.config_count.to_be_bytes());
    hasher.update(&(input.signers.len() as u32).to_be_bytes());
    for signer in input.signers {
        update_len_prefixed(&mut hasher, signer);
    }
    hasher.update(&(input.transmitters.len() as u32).to_be_bytes());
    for transmitter in input.transmitters {
        update_len_prefixed(&mut hasher, transmitter.as_bytes());
    }
    hasher.update(&[input.threshold]);
    hasher.update(&input.encoded_config_version.to_be_bytes());
    update_len_prefixed(&mut hasher, input.encoded);
    ConfigDigest::from(*hasher.finalize().as_bytes())
}

/// Bytes an oracle signs for its observation; binds the value to one (digest, epoch, round).
pub fn observation_payload(config_digest: &ConfigDigest, epoch: Epoch, round: Round, value: i128) -> Hash32 {
    let mut hasher = Hasher::new();
    hasher.update(OBSERVATION_DOMAIN_V1);
    hasher.update(config_digest.as_hash());
    hasher.update(&epoch.to_be_bytes());
    hasher.update(&[round]);
    hasher.update(&value.to_be_bytes());
    *hasher.finalize().as_bytes()
}

/// Digest signed by on-chain report shares.
pub fn report_hash(report_bytes: &[u8]) -> ReportHash {
    let mut hasher = Hasher::new();
    hasher.update(REPORT_DOMAIN_V1);
    hasher.update(report_bytes);
    ReportHash::from(*hasher.finalize().as_bytes())
}

/// Deterministic per-round ordering of transmitters, identical on every node.
pub fn transmit_order(config_digest: &ConfigDigest, epoch: Epoch, round: Round, oracle_count: usize) -> Vec<OracleId> {
    let mut ranked: Vec<(Hash32, u8)> = (0..oracle_count.min(usize::from(u8::MAX)))
        .map(|idx| {
            let mut hasher = Hasher::new();
            hasher.update(TRANSMIT_ORDER_DOMAIN_V1);
            hasher.update(config_digest.as_hash());
            hasher.update(&epoch.to_be_bytes());
            hasher.update(&[round, idx as u8]);
            (*hasher.finalize().as_bytes(), idx as u8)
        })
        .collect();
    ranked.sort();
    ranked.into_iter().map(|(_, idx)| OracleId(idx)).collect()
}

fn update_len_prefixed(hasher: &mut Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u32).to_be_bytes());
    hasher.update(bytes);
}
