use super::schema::*;
use crate::foundation::OcrError;
use rocksdb::{ColumnFamilyDescriptor, Options as RocksOptions, DB};
use std::path::Path;

pub fn open_db_with_cfs(path: impl AsRef<Path>) -> Result<DB, OcrError> {
    let mut options = RocksOptions::default();
    options.create_if_missing(true);
    options.create_missing_column_families(true);
    options.set_use_fsync(true);
    options.set_manual_wal_flush(false);
    options.set_paranoid_checks(true);

    let cfs = vec![
        ColumnFamilyDescriptor::new(CF_DEFAULT, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_METADATA, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_STATE, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_CONFIG, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_PENDING, RocksOptions::default()),
    ];

    DB::open_cf_descriptors(&options, path, cfs)
        .map_err(|err| OcrError::StorageError { operation: "rocksdb open_cf_descriptors".to_string(), details: err.to_string() })
}
