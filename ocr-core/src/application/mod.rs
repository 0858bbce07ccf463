//! Application layer: protocol tasks and node lifecycle over the domain and infrastructure layers.

pub mod config_sync;
pub mod instance;
pub mod lifecycle;
pub mod observer;
pub mod runtime;
pub mod tasks;

pub use config_sync::ConfigSync;
pub use instance::{OracleDeps, OracleInstance};
pub use lifecycle::{BootstrapNode, OracleNode};
pub use observer::{CompositeObserver, NoopObserver, ProtocolObserver};
pub use runtime::{spawn_timer, AbortOnDrop};
