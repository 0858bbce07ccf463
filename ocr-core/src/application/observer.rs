use crate::domain::RoundKey;
use crate::foundation::{ConfigDigest, Epoch, OcrError, OracleId};
use log::{debug, info, trace, warn};
use std::sync::Arc;

/// Protocol progress hooks. Every method defaults to a no-op.
pub trait ProtocolObserver: Send + Sync {
    fn on_epoch_started(&self, _config_digest: &ConfigDigest, _epoch: Epoch, _leader: OracleId) {}
    fn on_round_started(&self, _key: &RoundKey) {}
    fn on_observation_failed(&self, _key: &RoundKey, _reason: &str) {}
    fn on_report_signed(&self, _key: &RoundKey) {}
    fn on_report_finalized(&self, _key: &RoundKey, _median: i128) {}
    fn on_transmit_attempt(&self, _key: &RoundKey, _attempt: u32) {}
    fn on_transmit_failed(&self, _key: &RoundKey, _reason: &str) {}
    fn on_transmission_confirmed(&self, _key: &RoundKey) {}
    fn on_transmission_abandoned(&self, _key: &RoundKey, _reason: &str) {}
    fn on_config_changed(&self, _previous: Option<&ConfigDigest>, _current: &ConfigDigest) {}
    fn on_persistence_failure(&self, _operation: &str, _error: &OcrError) {}
}

pub struct NoopObserver;

impl ProtocolObserver for NoopObserver {}

pub struct CompositeObserver {
    observers: Vec<Arc<dyn ProtocolObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ProtocolObserver>) {
        self.observers.push(observer);
    }
}

impl Default for CompositeObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolObserver for CompositeObserver {
    fn on_epoch_started(&self, config_digest: &ConfigDigest, epoch: Epoch, leader: OracleId) {
        info!("epoch started config_digest={:#x} epoch={} leader={}", config_digest, epoch, leader);
        for observer in &self.observers {
            observer.on_epoch_started(config_digest, epoch, leader);
        }
    }

    fn on_round_started(&self, key: &RoundKey) {
        debug!("round started key={}", key);
        for observer in &self.observers {
            observer.on_round_started(key);
        }
    }

    fn on_observation_failed(&self, key: &RoundKey, reason: &str) {
        warn!("observation failed key={} reason={}", key, reason);
        for observer in &self.observers {
            observer.on_observation_failed(key, reason);
        }
    }

    fn on_report_signed(&self, key: &RoundKey) {
        trace!("on_report_signed dispatch observer_count={} key={}", self.observers.len(), key);
        for observer in &self.observers {
            observer.on_report_signed(key);
        }
    }

    fn on_report_finalized(&self, key: &RoundKey, median: i128) {
        info!("report finalized key={} median={}", key, median);
        for observer in &self.observers {
            observer.on_report_finalized(key, median);
        }
    }

    fn on_transmit_attempt(&self, key: &RoundKey, attempt: u32) {
        trace!("on_transmit_attempt dispatch observer_count={} key={} attempt={}", self.observers.len(), key, attempt);
        for observer in &self.observers {
            observer.on_transmit_attempt(key, attempt);
        }
    }

    fn on_transmit_failed(&self, key: &RoundKey, reason: &str) {
        warn!("transmit failed key={} reason={}", key, reason);
        for observer in &self.observers {
            observer.on_transmit_failed(key, reason);
        }
    }

    fn on_transmission_confirmed(&self, key: &RoundKey) {
        info!("transmission confirmed key={}", key);
        for observer in &self.observers {
            observer.on_transmission_confirmed(key);
        }
    }

    fn on_transmission_abandoned(&self, key: &RoundKey, reason: &str) {
        info!("transmission abandoned key={} reason={}", key, reason);
        for observer in &self.observers {
            observer.on_transmission_abandoned(key, reason);
        }
    }

    fn on_config_changed(&self, previous: Option<&ConfigDigest>, current: &ConfigDigest) {
        match previous {
            Some(previous) => info!("config changed previous={:#x} current={:#x}", previous, current),
            None => info!("config adopted current={:#x}", current),
        }
        for observer in &self.observers {
            observer.on_config_changed(previous, current);
        }
    }

    fn on_persistence_failure(&self, operation: &str, error: &OcrError) {
        warn!("persistence failure operation={} error={}", operation, error);
        for observer in &self.observers {
            observer.on_persistence_failure(operation, error);
        }
    }
}
