use crate::domain::{ContractConfig, OnchainSigner, OnchainVerifier, SignatureShare};
use crate::foundation::{OcrError, OracleId, ReportHash};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

/// Report signing key. Shares are recoverable ECDSA over the report hash.
#[derive(Clone)]
pub struct Secp256k1Keyring {
    secp: Secp256k1<All>,
    secret: SecretKey,
    public: PublicKey,
}

impl Secp256k1Keyring {
    pub fn from_seed(seed: [u8; 32]) -> Result<Self, OcrError> {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&seed)
            .map_err(|err| OcrError::CryptoError { operation: "secp256k1 secret key".to_string(), details: err.to_string() })?;
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secp, secret, public })
    }
}

impl OnchainSigner for Secp256k1Keyring {
    fn public_key(&self) -> Vec<u8> {
        self.public.serialize().to_vec()
    }

    fn sign_report(&self, signer: OracleId, report_hash: &ReportHash) -> Result<SignatureShare, OcrError> {
        let msg = Message::from_digest_slice(report_hash.as_ref())
            .map_err(|err| OcrError::CryptoError { operation: "secp256k1 message".to_string(), details: err.to_string() })?;
        let (recovery_id, compact) = self.secp.sign_ecdsa_recoverable(&msg, &self.secret).serialize_compact();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);
        Ok(SignatureShare { signer, r, s, v: recovery_id.to_i32() as u8 })
    }
}

/// Recovers the signer of a share and compares it to the config's signer list.
pub struct SignerSetVerifier {
    secp: Secp256k1<secp256k1::VerifyOnly>,
    signers: Vec<Option<PublicKey>>,
}

impl SignerSetVerifier {
    /// Unparseable signer keys never verify.
    pub fn from_config(config: &ContractConfig) -> Self {
        let signers = config.signers.iter().map(|bytes| PublicKey::from_slice(bytes).ok()).collect();
        Self { secp: Secp256k1::verification_only(), signers }
    }

    fn recover(&self, report_hash: &ReportHash, share: &SignatureShare) -> Result<PublicKey, OcrError> {
        let crypto = |operation: &str, err: secp256k1::Error| OcrError::CryptoError { operation: operation.to_string(), details: err.to_string() };
        let msg = Message::from_digest_slice(report_hash.as_ref()).map_err(|err| crypto("secp256k1 message", err))?;
        let recovery_id = RecoveryId::from_i32(i32::from(share.v)).map_err(|err| crypto("recovery id", err))?;
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&share.r);
        compact[32..].copy_from_slice(&share.s);
        let signature = RecoverableSignature::from_compact(&compact, recovery_id).map_err(|err| crypto("signature parse", err))?;
        self.secp.recover_ecdsa(&msg, &signature).map_err(|err| crypto("recover", err))
    }
}

impl OnchainVerifier for SignerSetVerifier {
    fn verify_share(&self, report_hash: &ReportHash, share: &SignatureShare) -> bool {
        let Some(Some(expected)) = self.signers.get(share.signer.index()) else {
            return false;
        };
        matches!(self.recover(report_hash, share), Ok(recovered) if recovered == *expected)
    }
}
