//! Epoch bookkeeping: leader election, the persisted pacemaker state and epoch adoption.
//!
//! Everything here is pure; the scheduler task owns a [`Pacemaker`] and is responsible for
//! persisting a prepared [`PersistentState`] before acting on it.

use crate::foundation::{ConfigDigest, Epoch, OcrError, OracleId, Round};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leader of an epoch. Every node computes this independently.
pub fn leader(epoch: Epoch, n: usize) -> OracleId {
    if n == 0 {
        return OracleId(0);
    }
    let n = n as u64;
    OracleId((u64::from(epoch) % n) as u8)
}

/// Identifies one attempt to agree on one value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundKey {
    pub config_digest: ConfigDigest,
    pub epoch: Epoch,
    pub round: Round,
}

impl RoundKey {
    pub fn new(config_digest: ConfigDigest, epoch: Epoch, round: Round) -> Self {
        Self { config_digest, epoch, round }
    }

    /// True when `self` is the same or a later attempt under the same config.
    pub fn is_at_or_after(&self, other: &RoundKey) -> bool {
        self.config_digest.ct_eq(&other.config_digest) && (self.epoch, self.round) >= (other.epoch, other.round)
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", crate::foundation::hx(&self.config_digest.as_hash()[..8]), self.epoch, self.round)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentState {
    pub epoch: Epoch,
    pub highest_sent_epoch: Epoch,
    /// Highest epoch each peer has announced, indexed by `OracleId`.
    pub highest_received_epoch: Vec<Epoch>,
}

impl PersistentState {
    pub fn new(n: usize) -> Self {
        Self { epoch: 0, highest_sent_epoch: 0, highest_received_epoch: vec![0; n] }
    }

    pub fn max_epoch(&self) -> Epoch {
        self.epoch.max(self.highest_sent_epoch)
    }

    /// Rejects a replacement that would move any persisted counter backwards.
    pub fn check_successor(&self, next: &PersistentState) -> Result<(), OcrError> {
        let regression = |field: &str, stored: Epoch, attempted: Epoch| OcrError::EpochRegression {
            field: field.to_string(),
            stored,
            attempted,
        };
        if next.epoch < self.epoch {
            return Err(regression("epoch", self.epoch, next.epoch));
        }
        if next.highest_sent_epoch < self.highest_sent_epoch {
            return Err(regression("highest_sent_epoch", self.highest_sent_epoch, next.highest_sent_epoch));
        }
        for (idx, stored) in self.highest_received_epoch.iter().enumerate() {
            let attempted = next.highest_received_epoch.get(idx).copied().unwrap_or(0);
            if attempted < *stored {
                return Err(regression(&format!("highest_received_epoch[{idx}]"), *stored, attempted));
            }
        }
        Ok(())
    }
}

/// First epoch a node may use after loading `stored`, never below `floor`.
///
/// The result is `max(stored epoch, stored highest sent, floor) + 2`.
pub fn fresh_epoch(stored: Option<&PersistentState>, floor: Epoch) -> Epoch {
    let used = stored.map(PersistentState::max_epoch).unwrap_or(0).max(floor);
    used.saturating_add(2)
}

/// Rounds a follower answered in the current epoch. Requests for older rounds are refused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FollowerRounds {
    observed: Option<Round>,
    reported: Option<Round>,
}

impl FollowerRounds {
    /// Records an observe request unless `round` is not newer than anything answered.
    pub fn accept_observe(&mut self, round: Round) -> bool {
        if self.observed.is_some_and(|seen| round <= seen) || self.reported.is_some_and(|seen| round <= seen) {
            return false;
        }
        self.observed = Some(round);
        true
    }

    /// Records a report request unless it is older than the observed round or already reported.
    pub fn accept_report(&mut self, round: Round) -> bool {
        if self.observed.is_some_and(|seen| round < seen) || self.reported.is_some_and(|seen| round <= seen) {
            return false;
        }
        self.reported = Some(round);
        true
    }
}

/// Successor of `stored` whose epoch counters are at least `floor`, or `None` if it already is.
///
/// Written under a new config before the config itself, so the floor survives a crash in between.
pub fn floor_state(stored: Option<&PersistentState>, n: usize, floor: Epoch) -> Option<PersistentState> {
    if stored.is_some_and(|state| state.epoch >= floor && state.highest_sent_epoch >= floor) {
        return None;
    }
    let mut next = stored.cloned().unwrap_or_else(|| PersistentState::new(n));
    next.epoch = next.epoch.max(floor);
    next.highest_sent_epoch = next.highest_sent_epoch.max(floor);
    Some(next)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EpochDecision {
    /// Nothing changed.
    Unchanged,
    /// A peer's announcement was recorded; nothing else to do.
    Recorded,
    /// A quorum supports a later epoch. Persist `state`, then call [`Pacemaker::commit`].
    Enter { epoch: Epoch, state: PersistentState },
}

#[derive(Clone, Debug)]
pub struct Pacemaker {
    state: PersistentState,
    self_id: OracleId,
    quorum: usize,
    max_epoch_jump: u32,
}

impl Pacemaker {
    /// Prepares a pacemaker at a fresh epoch; the returned state must be persisted before use.
    pub fn restart(stored: Option<PersistentState>, floor: Epoch, n: usize, quorum: usize, self_id: OracleId, max_epoch_jump: u32) -> Self {
        let epoch = fresh_epoch(stored.as_ref(), floor);
        let mut state = stored.unwrap_or_else(|| PersistentState::new(n));
        state.highest_received_epoch.resize(n, 0);
        state.epoch = epoch;
        state.highest_sent_epoch = epoch;
        if let Some(own) = state.highest_received_epoch.get_mut(self_id.index()) {
            *own = (*own).max(epoch);
        }
        Self { state, self_id, quorum: quorum.max(1), max_epoch_jump }
    }

    pub fn epoch(&self) -> Epoch {
        self.state.epoch
    }

    pub fn highest_sent(&self) -> Epoch {
        self.state.highest_sent_epoch
    }

    pub fn state(&self) -> &PersistentState {
        &self.state
    }

    /// Epoch to announce when the current leader made no progress.
    pub fn next_proposal(&self) -> Epoch {
        if self.state.highest_sent_epoch > self.state.epoch {
            self.state.highest_sent_epoch
        } else {
            self.state.epoch.saturating_add(1)
        }
    }

    /// State to persist before announcing `epoch`.
    pub fn prepare_send(&self, epoch: Epoch) -> PersistentState {
        let mut next = self.state.clone();
        next.highest_sent_epoch = next.highest_sent_epoch.max(epoch);
        if let Some(own) = next.highest_received_epoch.get_mut(self.self_id.index()) {
            *own = (*own).max(epoch);
        }
        next
    }

    /// Adopts a state that has been durably written.
    pub fn commit(&mut self, state: PersistentState) {
        self.state = state;
    }

    /// Upper bound for peer-announced epochs we are willing to believe.
    pub fn ceiling(&self) -> Epoch {
        self.state.max_epoch().saturating_add(self.max_epoch_jump)
    }

    pub fn on_new_epoch(&mut self, from: OracleId, announced: Epoch) -> EpochDecision {
        let ceiling = self.ceiling();
        let plausible = announced.min(ceiling);
        let Some(slot) = self.state.highest_received_epoch.get_mut(from.index()) else {
            return EpochDecision::Unchanged;
        };
        if plausible <= *slot {
            return EpochDecision::Unchanged;
        }
        *slot = plausible;

        let candidate = self.quorum_supported_epoch();
        if candidate > self.state.epoch {
            let mut next = self.state.clone();
            next.epoch = candidate;
            next.highest_sent_epoch = next.highest_sent_epoch.max(candidate);
            if let Some(own) = next.highest_received_epoch.get_mut(self.self_id.index()) {
                *own = (*own).max(candidate);
            }
            return EpochDecision::Enter { epoch: candidate, state: next };
        }
        EpochDecision::Recorded
    }

    /// Highest epoch announced by at least `quorum` oracles, ourselves included.
    fn quorum_supported_epoch(&self) -> Epoch {
        let mut announced = self.state.highest_received_epoch.clone();
        announced.sort_unstable_by(|a, b| b.cmp(a));
        announced.get(self.quorum - 1).copied().unwrap_or(0)
    }
}
