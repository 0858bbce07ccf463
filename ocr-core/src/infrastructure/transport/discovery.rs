//! Bootstrapper-side peer directory: which overlay addresses announced themselves under which config.

use crate::foundation::{ConfigDigest, OcrError, OracleId};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Where oracles announce themselves when an instance starts.
pub trait PeerAnnouncer: Send + Sync {
    fn announce(&self, config_digest: ConfigDigest, oracle_id: OracleId, address: String) -> Result<(), OcrError>;
}

#[derive(Default)]
pub struct PeerDirectory {
    entries: Mutex<HashMap<ConfigDigest, BTreeMap<OracleId, String>>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, HashMap<ConfigDigest, BTreeMap<OracleId, String>>>, OcrError> {
        self.entries
            .lock()
            .map_err(|_| OcrError::TransportError { operation: "peer directory lock".to_string(), details: "poisoned".to_string() })
    }

    pub fn peers(&self, config_digest: &ConfigDigest) -> Result<BTreeMap<OracleId, String>, OcrError> {
        Ok(self.lock_entries()?.get(config_digest).cloned().unwrap_or_default())
    }

    /// Forgets every config other than `current`. Returns the number of digests removed.
    pub fn retain_only(&self, current: &ConfigDigest) -> Result<usize, OcrError> {
        let mut entries = self.lock_entries()?;
        let before = entries.len();
        entries.retain(|digest, _| digest == current);
        let pruned = before - entries.len();
        if pruned > 0 {
            info!("peer directory pruned stale configs current={:#x} pruned={}", current, pruned);
        }
        Ok(pruned)
    }

    pub fn config_count(&self) -> Result<usize, OcrError> {
        Ok(self.lock_entries()?.len())
    }
}

impl PeerAnnouncer for PeerDirectory {
    fn announce(&self, config_digest: ConfigDigest, oracle_id: OracleId, address: String) -> Result<(), OcrError> {
        debug!("peer announced config_digest={:#x} oracle_id={} address={}", config_digest, oracle_id, address);
        self.lock_entries()?.entry(config_digest).or_default().insert(oracle_id, address);
        Ok(())
    }
}
