use crate::domain::epoch::RoundKey;
use crate::domain::observation::SignedObservation;
use crate::domain::report::Report;
use crate::domain::signing::OffchainVerifier;
use crate::foundation::{OcrError, OracleId};
use std::collections::BTreeMap;

/// Leader-side collection of observations for one round.
#[derive(Clone, Debug)]
pub struct ObservationCollector {
    key: RoundKey,
    quorum: usize,
    oracle_count: usize,
    observations: BTreeMap<OracleId, SignedObservation>,
}

impl ObservationCollector {
    pub fn new(key: RoundKey, quorum: usize, oracle_count: usize) -> Self {
        Self { key, quorum, oracle_count, observations: BTreeMap::new() }
    }

    pub fn key(&self) -> &RoundKey {
        &self.key
    }

    /// Adds an observation sent by `sender` for `claimed_key`. Returns the number collected so far.
    pub fn add(
        &mut self,
        sender: OracleId,
        claimed_key: &RoundKey,
        observation: SignedObservation,
        verifier: &dyn OffchainVerifier,
    ) -> Result<usize, OcrError> {
        if claimed_key != &self.key {
            return Err(OcrError::KeyMismatch { expected: self.key.to_string(), actual: claimed_key.to_string() });
        }
        if observation.observer != sender {
            return Err(OcrError::SenderMismatch { claimed: observation.observer.0, actual: sender.0 });
        }
        check_observation(&self.key, &observation, self.oracle_count, verifier)?;
        if self.observations.contains_key(&sender) {
            return Err(OcrError::DuplicateContribution { oracle_id: sender.0, key: self.key.to_string() });
        }
        self.observations.insert(sender, observation);
        Ok(self.observations.len())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn has_quorum(&self) -> bool {
        self.observations.len() >= self.quorum
    }

    /// Collected observations ordered by oracle id.
    pub fn observations(&self) -> Vec<SignedObservation> {
        self.observations.values().cloned().collect()
    }

    pub fn build_report(&self) -> Result<Report, OcrError> {
        if !self.has_quorum() {
            return Err(OcrError::InsufficientObservations { required: self.quorum, received: self.observations.len() });
        }
        Report::from_observations(self.key, &self.observations())
    }
}

/// Follower-side check of the observation set a leader pinned for `key`.
pub fn verify_observation_set(
    key: &RoundKey,
    observations: &[SignedObservation],
    quorum: usize,
    oracle_count: usize,
    verifier: &dyn OffchainVerifier,
) -> Result<Report, OcrError> {
    let mut seen = BTreeMap::new();
    for observation in observations {
        check_observation(key, observation, oracle_count, verifier)?;
        if seen.insert(observation.observer, observation.clone()).is_some() {
            return Err(OcrError::DuplicateContribution { oracle_id: observation.observer.0, key: key.to_string() });
        }
    }
    if seen.len() < quorum {
        return Err(OcrError::InsufficientObservations { required: quorum, received: seen.len() });
    }
    let ordered: Vec<SignedObservation> = seen.into_values().collect();
    Report::from_observations(*key, &ordered)
}

fn check_observation(
    key: &RoundKey,
    observation: &SignedObservation,
    oracle_count: usize,
    verifier: &dyn OffchainVerifier,
) -> Result<(), OcrError> {
    if observation.observer.index() >= oracle_count {
        return Err(OcrError::UnknownOracle { oracle_id: observation.observer.0, count: oracle_count });
    }
    if !observation.verify(key, verifier) {
        return Err(OcrError::SignatureVerificationFailed { oracle_id: observation.observer.0 });
    }
    Ok(())
}
