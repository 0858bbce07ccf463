//! Infrastructure layer: persistence, overlay transport, chain access, keys, config and logging.

pub mod chain;
pub mod config;
pub mod datasource;
pub mod keys;
pub mod logging;
pub mod storage;
pub mod transport;
