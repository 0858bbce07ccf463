use super::DataSource;
use crate::foundation::OcrError;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

struct WalkState {
    value: i128,
    rng: StdRng,
}

/// Moves by at most `max_step` in either direction on every observation.
pub struct RandomWalkDataSource {
    state: Mutex<WalkState>,
    max_step: i64,
}

impl RandomWalkDataSource {
    pub fn new(start: i128, max_step: i64, seed: u64) -> Self {
        Self { state: Mutex::new(WalkState { value: start, rng: StdRng::seed_from_u64(seed) }), max_step: max_step.max(0) }
    }
}

#[async_trait]
impl DataSource for RandomWalkDataSource {
    async fn observe(&self) -> Result<i128, OcrError> {
        let mut state = self.state.lock().map_err(|_| OcrError::DataSourceError("random walk state poisoned".to_string()))?;
        let step = state.rng.gen_range(-self.max_step..=self.max_step);
        state.value = state.value.saturating_add(i128::from(step));
        Ok(state.value)
    }
}
