//! System-wide constants for the oracle agreement protocol.

/// Nanoseconds per second (10^9).
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Nanoseconds per millisecond (10^6).
pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// Environment override for the wall clock, used by deterministic tests.
pub const TEST_NOW_NANOS_ENV_VAR: &str = "OCR_TEST_NOW_NANOS";

/// Maximum number of oracles in one configuration.
///
/// Observer lists are encoded with one byte per oracle and a one byte count.
pub const MAX_ORACLES: usize = 31;

/// Maximum encoded size of one peer message (1 MB).
pub const MAX_MESSAGE_SIZE_BYTES: usize = 1024 * 1024;

/// Blake3 hash size in bytes.
pub const HASH_SIZE: usize = 32;

/// Version byte prefixed to canonical report bytes.
pub const REPORT_ENCODING_VERSION: u8 = 1;

/// Only supported `EncodedConfigVersion` of on-chain offchain parameters.
pub const OFFCHAIN_CONFIG_VERSION: u64 = 1;

/// Default ceiling on how far a peer-reported epoch may exceed our own.
pub const DEFAULT_MAX_EPOCH_JUMP: u32 = 1_000;

/// Size of the per-sender replay window kept by the message filter.
pub const SEEN_MESSAGE_WINDOW: usize = 4096;

/// Storage lock acquisition timeout.
pub const STORAGE_LOCK_TIMEOUT_SECS: u64 = 5;

/// Capacity of the mpsc channels between protocol tasks.
pub const TASK_CHANNEL_CAPACITY: usize = 256;

/// Default per-peer inbox capacity of the in-memory overlay.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;
