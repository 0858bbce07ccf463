pub mod devnet;
pub mod metrics;
