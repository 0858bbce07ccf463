//! Local value sampling.

pub mod random_walk;

pub use random_walk::RandomWalkDataSource;

use crate::foundation::OcrError;
use async_trait::async_trait;

/// Produces this node's observation for one round. Callers bound the call with a timeout.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn observe(&self) -> Result<i128, OcrError>;
}

/// Always reports the same value.
#[derive(Clone, Copy, Debug)]
pub struct StaticDataSource(pub i128);

#[async_trait]
impl DataSource for StaticDataSource {
    async fn observe(&self) -> Result<i128, OcrError> {
        Ok(self.0)
    }
}
