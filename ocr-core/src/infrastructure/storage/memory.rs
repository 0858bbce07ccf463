use crate::domain::{ContractConfig, PendingTransmission, PendingTransmissionKey, PersistentState};
use crate::foundation::{ConfigDigest, OcrError};
use crate::infrastructure::storage::Database;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryInner {
    state: HashMap<ConfigDigest, PersistentState>,
    config: Option<ContractConfig>,
    pending: BTreeMap<PendingTransmissionKey, PendingTransmission>,
}

/// In-process `Database`. Clones share the same contents, which lets tests model a restart.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a storage error until switched off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>, OcrError> {
        self.inner
            .lock()
            .map_err(|_| OcrError::StorageError { operation: "memory storage lock".to_string(), details: "poisoned".to_string() })
    }

    fn check_writable(&self, operation: &str) -> Result<(), OcrError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(crate::storage_err!(operation, "injected write failure"));
        }
        Ok(())
    }
}

impl Database for MemoryStorage {
    fn read_state(&self, config_digest: &ConfigDigest) -> Result<Option<PersistentState>, OcrError> {
        Ok(self.lock_inner()?.state.get(config_digest).cloned())
    }

    fn write_state(&self, config_digest: &ConfigDigest, state: &PersistentState) -> Result<(), OcrError> {
        self.check_writable("write_state")?;
        let mut inner = self.lock_inner()?;
        if let Some(stored) = inner.state.get(config_digest) {
            stored.check_successor(state)?;
        }
        inner.state.insert(*config_digest, state.clone());
        Ok(())
    }

    fn read_config(&self) -> Result<Option<ContractConfig>, OcrError> {
        Ok(self.lock_inner()?.config.clone())
    }

    fn write_config(&self, config: &ContractConfig) -> Result<(), OcrError> {
        self.check_writable("write_config")?;
        self.lock_inner()?.config = Some(config.clone());
        Ok(())
    }

    fn store_pending_transmission(&self, key: &PendingTransmissionKey, transmission: &PendingTransmission) -> Result<(), OcrError> {
        self.check_writable("store_pending_transmission")?;
        self.lock_inner()?.pending.insert(*key, transmission.clone());
        Ok(())
    }

    fn pending_transmissions_with_config_digest(
        &self,
        config_digest: &ConfigDigest,
    ) -> Result<BTreeMap<PendingTransmissionKey, PendingTransmission>, OcrError> {
        let inner = self.lock_inner()?;
        Ok(inner.pending.iter().filter(|(key, _)| key.config_digest == *config_digest).map(|(k, v)| (*k, v.clone())).collect())
    }

    fn delete_pending_transmission(&self, key: &PendingTransmissionKey) -> Result<(), OcrError> {
        self.check_writable("delete_pending_transmission")?;
        self.lock_inner()?.pending.remove(key);
        Ok(())
    }

    fn delete_pending_transmissions_older_than(&self, cutoff_nanos: u64) -> Result<usize, OcrError> {
        self.check_writable("delete_pending_transmissions_older_than")?;
        let mut inner = self.lock_inner()?;
        let before = inner.pending.len();
        inner.pending.retain(|_, transmission| !transmission.is_older_than(cutoff_nanos));
        Ok(before - inner.pending.len())
    }
}
