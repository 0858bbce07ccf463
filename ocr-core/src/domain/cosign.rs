//! Threshold co-signing: share collection per round and the sign-once guard.

use crate::domain::epoch::RoundKey;
use crate::domain::report::Report;
use crate::domain::signing::OnchainVerifier;
use crate::domain::transmission::PendingTransmission;
use crate::foundation::{Hash32, OcrError, OracleId, ReportHash};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Recoverable ECDSA share over a report hash, tagged with the signer's oracle id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureShare {
    pub signer: OracleId,
    pub r: Hash32,
    pub s: Hash32,
    pub v: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Quorum reached with this share. Emitted once per key.
    Finalized(PendingTransmission),
    /// Share stored; `count` valid shares exist for the same report bytes.
    Stored { count: usize },
    /// Share arrived after finalization. Stored, no further effect.
    LateAccepted,
}

#[derive(Clone, Debug, Default)]
struct ReportShares {
    median: i128,
    bytes: Vec<u8>,
    shares: BTreeMap<OracleId, SignatureShare>,
}

/// Collects shares for one `RoundKey` until a quorum signs identical bytes.
#[derive(Clone, Debug)]
pub struct ShareCollector {
    key: RoundKey,
    quorum: usize,
    oracle_count: usize,
    contributed: BTreeSet<OracleId>,
    by_report: BTreeMap<ReportHash, ReportShares>,
    finalized: Option<ReportHash>,
}

impl ShareCollector {
    pub fn new(key: RoundKey, quorum: usize, oracle_count: usize) -> Self {
        Self { key, quorum, oracle_count, contributed: BTreeSet::new(), by_report: BTreeMap::new(), finalized: None }
    }

    pub fn key(&self) -> &RoundKey {
        &self.key
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    pub fn finalized_hash(&self) -> Option<ReportHash> {
        self.finalized
    }

    /// Shares stored for `report_hash`, ordered by signer.
    pub fn shares_for(&self, report_hash: &ReportHash) -> Vec<SignatureShare> {
        self.by_report.get(report_hash).map(|entry| entry.shares.values().cloned().collect()).unwrap_or_default()
    }

    pub fn add(
        &mut self,
        report: &Report,
        share: SignatureShare,
        verifier: &dyn OnchainVerifier,
        now_nanos: u64,
    ) -> Result<ShareOutcome, OcrError> {
        if report.key != self.key {
            return Err(OcrError::KeyMismatch { expected: self.key.to_string(), actual: report.key.to_string() });
        }
        if share.signer.index() >= self.oracle_count {
            return Err(OcrError::UnknownOracle { oracle_id: share.signer.0, count: self.oracle_count });
        }
        if self.contributed.contains(&share.signer) {
            return Err(OcrError::DuplicateContribution { oracle_id: share.signer.0, key: self.key.to_string() });
        }
        let report_hash = report.hash();
        if !verifier.verify_share(&report_hash, &share) {
            return Err(OcrError::SignatureVerificationFailed { oracle_id: share.signer.0 });
        }

        self.contributed.insert(share.signer);
        let entry = self.by_report.entry(report_hash).or_insert_with(|| ReportShares {
            median: report.median,
            bytes: report.bytes.clone(),
            shares: BTreeMap::new(),
        });
        entry.shares.insert(share.signer, share);

        if self.finalized.is_some() {
            return Ok(ShareOutcome::LateAccepted);
        }
        let count = entry.shares.len();
        if count < self.quorum {
            return Ok(ShareOutcome::Stored { count });
        }
        self.finalized = Some(report_hash);
        Ok(ShareOutcome::Finalized(PendingTransmission {
            time_nanos: now_nanos,
            median: entry.median,
            serialized_report: entry.bytes.clone(),
            shares: entry.shares.values().cloned().collect(),
        }))
    }
}

/// Remembers which report this node signed per key, so it never signs two.
#[derive(Clone, Debug, Default)]
pub struct SignOnceGuard {
    signed: BTreeMap<RoundKey, ReportHash>,
}

impl SignOnceGuard {
    /// Returns `Ok(true)` for a first signature, `Ok(false)` when the same report was already signed.
    pub fn check_and_record(&mut self, key: RoundKey, report_hash: ReportHash) -> Result<bool, OcrError> {
        match self.signed.get(&key) {
            Some(existing) if existing.ct_eq(&report_hash) => Ok(false),
            Some(_) => Err(OcrError::ConflictingReport { key: key.to_string() }),
            None => {
                self.signed.insert(key, report_hash);
                Ok(true)
            }
        }
    }

    /// Drops entries for keys strictly before `key` under the same digest, and all other digests.
    pub fn prune_before(&mut self, key: &RoundKey) {
        self.signed.retain(|signed, _| signed.is_at_or_after(key));
    }

    pub fn len(&self) -> usize {
        self.signed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signed.is_empty()
    }
}
