use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigError,
    InvalidContractConfig,
    ConfigDigestMismatch,
    UnsupportedConfigVersion,
    UnknownOracle,
    NotInConfig,
    StorageError,
    StorageLockTimeout,
    SchemaMismatch,
    EpochRegression,
    SerializationError,
    EncodingError,
    CryptoError,
    InvalidPublicKey,
    SignatureVerificationFailed,
    TransportError,
    MessageTooLarge,
    MessageReplayed,
    WrongConfigDigest,
    SenderMismatch,
    KeyMismatch,
    DuplicateContribution,
    InsufficientObservations,
    ThresholdNotMet,
    ConflictingReport,
    MalformedReport,
    DataSourceError,
    Timeout,
    ChainError,
    InvalidStateTransition,
    NodeClosed,
    Message,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("invalid contract config: {reason}")]
    InvalidContractConfig { reason: String },

    #[error("config digest mismatch: carried={carried} computed={computed}")]
    ConfigDigestMismatch { carried: String, computed: String },

    #[error("unsupported encoded config version: {version} (supported {supported})")]
    UnsupportedConfigVersion { version: u64, supported: u64 },

    #[error("unknown oracle id {oracle_id} (oracle count {count})")]
    UnknownOracle { oracle_id: u8, count: usize },

    #[error("local signing key is not part of config {config_digest}")]
    NotInConfig { config_digest: String },

    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("storage lock timeout: {operation} (waited {timeout_secs}s)")]
    StorageLockTimeout { operation: String, timeout_secs: u64 },

    #[error("schema mismatch: stored={stored} current={current}")]
    SchemaMismatch { stored: u32, current: u32 },

    #[error("persistent state regression for {field}: stored={stored} attempted={attempted}")]
    EpochRegression { field: String, stored: u32, attempted: u32 },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("crypto error during {operation}: {details}")]
    CryptoError { operation: String, details: String },

    #[error("invalid public key: input={input} reason={reason}")]
    InvalidPublicKey { input: String, reason: String },

    #[error("signature verification failed for oracle {oracle_id}")]
    SignatureVerificationFailed { oracle_id: u8 },

    #[error("transport error during {operation}: {details}")]
    TransportError { operation: String, details: String },

    #[error("message too large: {size} exceeds max {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("message replayed sender={sender} seq_no={seq_no}")]
    MessageReplayed { sender: u8, seq_no: u64 },

    #[error("message for config {received} while running {expected}")]
    WrongConfigDigest { expected: String, received: String },

    #[error("envelope sender {claimed} does not match transport sender {actual}")]
    SenderMismatch { claimed: u8, actual: u8 },

    #[error("key mismatch: expected {expected}, got {actual}")]
    KeyMismatch { expected: String, actual: String },

    #[error("duplicate contribution from oracle {oracle_id} for {key}")]
    DuplicateContribution { oracle_id: u8, key: String },

    #[error("insufficient observations: required {required}, received {received}")]
    InsufficientObservations { required: usize, received: usize },

    #[error("threshold not met: required {required}, received {received}")]
    ThresholdNotMet { required: usize, received: usize },

    #[error("conflicting report for {key}")]
    ConflictingReport { key: String },

    #[error("malformed report: {0}")]
    MalformedReport(String),

    #[error("data source error: {0}")]
    DataSourceError(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("chain error during {operation}: {details}")]
    ChainError { operation: String, details: String },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("node closed")]
    NodeClosed,

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, OcrError>;

impl OcrError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OcrError::ConfigError(_) => ErrorCode::ConfigError,
            OcrError::InvalidContractConfig { .. } => ErrorCode::InvalidContractConfig,
            OcrError::ConfigDigestMismatch { .. } => ErrorCode::ConfigDigestMismatch,
            OcrError::UnsupportedConfigVersion { .. } => ErrorCode::UnsupportedConfigVersion,
            OcrError::UnknownOracle { .. } => ErrorCode::UnknownOracle,
            OcrError::NotInConfig { .. } => ErrorCode::NotInConfig,
            OcrError::StorageError { .. } => ErrorCode::StorageError,
            OcrError::StorageLockTimeout { .. } => ErrorCode::StorageLockTimeout,
            OcrError::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            OcrError::EpochRegression { .. } => ErrorCode::EpochRegression,
            OcrError::SerializationError { .. } => ErrorCode::SerializationError,
            OcrError::EncodingError(_) => ErrorCode::EncodingError,
            OcrError::CryptoError { .. } => ErrorCode::CryptoError,
            OcrError::InvalidPublicKey { .. } => ErrorCode::InvalidPublicKey,
            OcrError::SignatureVerificationFailed { .. } => ErrorCode::SignatureVerificationFailed,
            OcrError::TransportError { .. } => ErrorCode::TransportError,
            OcrError::MessageTooLarge { .. } => ErrorCode::MessageTooLarge,
            OcrError::MessageReplayed { .. } => ErrorCode::MessageReplayed,
            OcrError::WrongConfigDigest { .. } => ErrorCode::WrongConfigDigest,
            OcrError::SenderMismatch { .. } => ErrorCode::SenderMismatch,
            OcrError::KeyMismatch { .. } => ErrorCode::KeyMismatch,
            OcrError::DuplicateContribution { .. } => ErrorCode::DuplicateContribution,
            OcrError::InsufficientObservations { .. } => ErrorCode::InsufficientObservations,
            OcrError::ThresholdNotMet { .. } => ErrorCode::ThresholdNotMet,
            OcrError::ConflictingReport { .. } => ErrorCode::ConflictingReport,
            OcrError::MalformedReport(_) => ErrorCode::MalformedReport,
            OcrError::DataSourceError(_) => ErrorCode::DataSourceError,
            OcrError::Timeout { .. } => ErrorCode::Timeout,
            OcrError::ChainError { .. } => ErrorCode::ChainError,
            OcrError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            OcrError::NodeClosed => ErrorCode::NodeClosed,
            OcrError::Message(_) => ErrorCode::Message,
        }
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext { code: self.code(), message: self.to_string() }
    }

    pub fn chain(operation: impl Into<String>, details: impl ToString) -> Self {
        OcrError::ChainError { operation: operation.into(), details: details.to_string() }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        OcrError::Timeout { operation: operation.into(), timeout_ms }
    }

    /// Errors that mean the current round cannot continue safely.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::StorageError | ErrorCode::StorageLockTimeout | ErrorCode::SchemaMismatch | ErrorCode::EpochRegression
        )
    }
}

impl From<hex::FromHexError> for OcrError {
    fn from(err: hex::FromHexError) -> Self {
        OcrError::EncodingError(format!("hex decode error: {}", err))
    }
}

impl From<toml::de::Error> for OcrError {
    fn from(err: toml::de::Error) -> Self {
        OcrError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<figment::Error> for OcrError {
    fn from(err: figment::Error) -> Self {
        OcrError::ConfigError(format!("config extraction failed: {}", err))
    }
}

impl From<rocksdb::Error> for OcrError {
    fn from(err: rocksdb::Error) -> Self {
        OcrError::StorageError { operation: "rocksdb".to_string(), details: err.to_string() }
    }
}

impl From<bincode::Error> for OcrError {
    fn from(err: bincode::Error) -> Self {
        OcrError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

#[macro_export]
macro_rules! storage_err {
    ($op:expr, $err:expr) => {
        $crate::foundation::OcrError::StorageError { operation: $op.into(), details: $err.to_string() }
    };
}

#[macro_export]
macro_rules! serde_err {
    ($fmt:expr, $err:expr) => {
        $crate::foundation::OcrError::SerializationError { format: $fmt.into(), details: $err.to_string() }
    };
}

impl From<io::Error> for OcrError {
    fn from(err: io::Error) -> Self {
        OcrError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for OcrError {
    fn from(err: serde_json::Error) -> Self {
        OcrError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}
