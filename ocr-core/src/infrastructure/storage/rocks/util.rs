//! Utility helpers for RocksDB-backed storage.

use crate::foundation::{OcrError, STORAGE_LOCK_TIMEOUT_SECS};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

const LOCK_POLL_INTERVAL_MS: u64 = 10;

pub fn acquire_with_timeout<'a, T>(lock: &'a Mutex<T>, operation: &'static str) -> Result<MutexGuard<'a, T>, OcrError> {
    acquire_with_timeout_for(lock, operation, Duration::from_secs(STORAGE_LOCK_TIMEOUT_SECS))
}

pub fn acquire_with_timeout_for<'a, T>(lock: &'a Mutex<T>, operation: &'static str, timeout: Duration) -> Result<MutexGuard<'a, T>, OcrError> {
    let start = Instant::now();
    loop {
        match lock.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(_)) => {
                return Err(OcrError::StorageError { operation: operation.to_string(), details: "mutex poisoned".to_string() });
            }
            Err(TryLockError::WouldBlock) => {
                if start.elapsed() >= timeout {
                    return Err(OcrError::StorageLockTimeout { operation: operation.to_string(), timeout_secs: timeout.as_secs() });
                }
                std::thread::sleep(Duration::from_millis(LOCK_POLL_INTERVAL_MS));
            }
        }
    }
}
