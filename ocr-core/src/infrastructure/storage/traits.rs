use crate::domain::{ContractConfig, PendingTransmission, PendingTransmissionKey, PersistentState};
use crate::foundation::{ConfigDigest, OcrError};
use std::collections::BTreeMap;

pub type Result<T> = std::result::Result<T, OcrError>;

/// Durable protocol state. Same-key operations are linearizable; nothing is ordered across keys.
pub trait Database: Send + Sync {
    fn read_state(&self, config_digest: &ConfigDigest) -> Result<Option<PersistentState>>;

    /// Durable before returning. Rejects any state that moves a stored counter backwards.
    fn write_state(&self, config_digest: &ConfigDigest, state: &PersistentState) -> Result<()>;

    fn read_config(&self) -> Result<Option<ContractConfig>>;
    fn write_config(&self, config: &ContractConfig) -> Result<()>;

    fn store_pending_transmission(&self, key: &PendingTransmissionKey, transmission: &PendingTransmission) -> Result<()>;

    fn pending_transmissions_with_config_digest(
        &self,
        config_digest: &ConfigDigest,
    ) -> Result<BTreeMap<PendingTransmissionKey, PendingTransmission>>;

    /// Deleting a missing key is not an error.
    fn delete_pending_transmission(&self, key: &PendingTransmissionKey) -> Result<()>;

    /// Deletes every pending transmission created before `cutoff_nanos`, returning how many were removed.
    fn delete_pending_transmissions_older_than(&self, cutoff_nanos: u64) -> Result<usize>;

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
