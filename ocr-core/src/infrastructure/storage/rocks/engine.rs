//! RocksDB-backed storage engine.
//!
//! # Lock Semantics
//!
//! RocksDB is thread-safe on its own; `state_lock` additionally serializes the
//! read-check-write of `Database::write_state` so two writers cannot both pass the
//! regression check. Pending transmissions and the config are single puts/deletes and take no lock.
//!
//! Every write goes through `WriteOptions::set_sync(true)` and is durable when the call returns.

use crate::domain::{ContractConfig, PendingTransmission, PendingTransmissionKey, PersistentState};
use crate::foundation::{ConfigDigest, OcrError};
use crate::infrastructure::storage::rocks::migration::open_db_with_cfs;
use crate::infrastructure::storage::rocks::schema::*;
use crate::infrastructure::storage::rocks::util::acquire_with_timeout;
use crate::infrastructure::storage::Database;
use crate::storage_err;
use bincode::Options;
use log::{debug, info, trace, warn};
use rocksdb::{ColumnFamily, Direction, IteratorMode, WriteBatch, WriteOptions, DB};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA_VERSION: u32 = 1;
const DB_DIR_NAME: &str = "ocr-node";

pub struct RocksStorage {
    db: Arc<DB>,
    state_lock: Mutex<()>,
}

impl RocksStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OcrError> {
        Self::open_with_options(path, false)
    }

    pub fn open_with_options(path: impl AsRef<Path>, allow_schema_wipe: bool) -> Result<Self, OcrError> {
        let path = path.as_ref();
        debug!("opening RocksStorage path={}", path.display());
        let db = open_db_with_cfs(path)?;
        let storage = Self { db: Arc::new(db), state_lock: Mutex::new(()) };
        if let Err(err) = storage.maybe_run_migrations() {
            if allow_schema_wipe {
                if let OcrError::SchemaMismatch { stored, current } = err {
                    warn!("schema mismatch stored={} current={}; wiping db path={}", stored, current, path.display());
                    drop(storage);
                    if path.exists() {
                        fs::remove_dir_all(path).map_err(|err| storage_err!("fs::remove_dir_all schema_wipe", err))?;
                    }
                    return Self::open_with_options(path, false);
                }
            }
            return Err(err);
        }
        info!("RocksStorage opened path={}", path.display());
        Ok(storage)
    }

    /// Opens (creating if needed) the node database under `data_dir`.
    pub fn open_in_dir(data_dir: impl AsRef<Path>) -> Result<Self, OcrError> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir).map_err(|err| storage_err!("fs::create_dir_all open_in_dir", err))?;
        Self::open_with_options(dir.join(DB_DIR_NAME), false)
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily, OcrError> {
        self.db.cf_handle(name).ok_or_else(|| OcrError::StorageError {
            operation: "rocksdb cf_handle".to_string(),
            details: format!("missing column family: {}", name),
        })
    }

    fn maybe_run_migrations(&self) -> Result<(), OcrError> {
        match self.schema_version()? {
            None => {
                info!("initializing fresh db schema schema_version={}", SCHEMA_VERSION);
                self.set_schema_version(SCHEMA_VERSION)?;
            }
            Some(v) if v == SCHEMA_VERSION => {}
            Some(v) => return Err(OcrError::SchemaMismatch { stored: v, current: SCHEMA_VERSION }),
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<Option<u32>, OcrError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, KEY_SCHEMA_VERSION) {
            Ok(Some(bytes)) => {
                let array: [u8; 4] = bytes.as_slice().try_into().map_err(|_| storage_err!("schema_version decode", "corrupt schema version"))?;
                Ok(Some(u32::from_be_bytes(array)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err!("rocksdb get_cf schema_version", e)),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), OcrError> {
        let cf = self.cf_handle(CF_METADATA)?;
        self.db.put_cf_opt(cf, KEY_SCHEMA_VERSION, version.to_be_bytes(), &Self::sync_writes()).map_err(OcrError::from)
    }

    fn sync_writes() -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(true);
        opts
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, OcrError> {
        bincode::DefaultOptions::new().with_fixint_encoding().serialize(value).map_err(|err| err.into())
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, OcrError> {
        bincode::DefaultOptions::new().with_fixint_encoding().deserialize(bytes).map_err(|err| err.into())
    }

    fn put(&self, cf_name: &str, key: &[u8], value: &[u8], operation: &'static str) -> Result<(), OcrError> {
        let cf = self.cf_handle(cf_name)?;
        self.db.put_cf_opt(cf, key, value, &Self::sync_writes()).map_err(|err| storage_err!(operation, err))
    }
}

impl Database for RocksStorage {
    fn read_state(&self, config_digest: &ConfigDigest) -> Result<Option<PersistentState>, OcrError> {
        trace!("read_state config_digest={:#x}", config_digest);
        let cf = self.cf_handle(CF_STATE)?;
        match self.db.get_cf(cf, key_state(config_digest)).map_err(|err| storage_err!("rocksdb get_cf state", err))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_state(&self, config_digest: &ConfigDigest, state: &PersistentState) -> Result<(), OcrError> {
        let _guard = acquire_with_timeout(&self.state_lock, "write_state")?;
        if let Some(stored) = self.read_state(config_digest)? {
            stored.check_successor(state)?;
        }
        self.put(CF_STATE, &key_state(config_digest), &Self::encode(state)?, "rocksdb put_cf state")?;
        debug!(
            "state persisted config_digest={:#x} epoch={} highest_sent_epoch={}",
            config_digest, state.epoch, state.highest_sent_epoch
        );
        Ok(())
    }

    fn read_config(&self) -> Result<Option<ContractConfig>, OcrError> {
        let cf = self.cf_handle(CF_CONFIG)?;
        match self.db.get_cf(cf, KEY_CURRENT_CONFIG).map_err(|err| storage_err!("rocksdb get_cf config", err))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_config(&self, config: &ContractConfig) -> Result<(), OcrError> {
        self.put(CF_CONFIG, KEY_CURRENT_CONFIG, &Self::encode(config)?, "rocksdb put_cf config")?;
        info!("config persisted config_digest={:#x} config_count={}", config.config_digest, config.config_count);
        Ok(())
    }

    fn store_pending_transmission(&self, key: &PendingTransmissionKey, transmission: &PendingTransmission) -> Result<(), OcrError> {
        self.put(CF_PENDING, &key_pending(key), &Self::encode(transmission)?, "rocksdb put_cf pending")?;
        debug!("pending transmission stored key={} median={}", key, transmission.median);
        Ok(())
    }

    fn pending_transmissions_with_config_digest(
        &self,
        config_digest: &ConfigDigest,
    ) -> Result<BTreeMap<PendingTransmissionKey, PendingTransmission>, OcrError> {
        let prefix = pending_prefix(config_digest);
        let cf = self.cf_handle(CF_PENDING)?;
        let mut out = BTreeMap::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|err| storage_err!("rocksdb iterator pending", err))?;
            if !key.starts_with(&prefix) {
                break;
            }
            out.insert(decode_pending_key(&key)?, Self::decode(&value)?);
        }
        trace!("pending transmissions loaded config_digest={:#x} count={}", config_digest, out.len());
        Ok(out)
    }

    fn delete_pending_transmission(&self, key: &PendingTransmissionKey) -> Result<(), OcrError> {
        let cf = self.cf_handle(CF_PENDING)?;
        self.db.delete_cf_opt(cf, key_pending(key), &Self::sync_writes()).map_err(|err| storage_err!("rocksdb delete_cf pending", err))?;
        debug!("pending transmission deleted key={}", key);
        Ok(())
    }

    fn delete_pending_transmissions_older_than(&self, cutoff_nanos: u64) -> Result<usize, OcrError> {
        let cf = self.cf_handle(CF_PENDING)?;
        let mut batch = WriteBatch::default();
        let mut deleted = 0usize;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|err| storage_err!("rocksdb iterator pending", err))?;
            let transmission: PendingTransmission = match Self::decode(&value) {
                Ok(transmission) => transmission,
                Err(err) => {
                    warn!("corrupted pending transmission; deleting key_hex={} error={}", crate::foundation::hx(&key), err);
                    batch.delete_cf(cf, key);
                    deleted += 1;
                    continue;
                }
            };
            if transmission.is_older_than(cutoff_nanos) {
                batch.delete_cf(cf, key);
                deleted += 1;
            }
        }
        if deleted > 0 {
            self.db.write_opt(batch, &Self::sync_writes()).map_err(|err| storage_err!("rocksdb write pending gc", err))?;
        }
        debug!("delete_pending_transmissions_older_than complete cutoff_nanos={} deleted={}", cutoff_nanos, deleted);
        Ok(deleted)
    }

    fn health_check(&self) -> Result<(), OcrError> {
        self.cf_handle(CF_METADATA).map(|_| ())
    }
}
