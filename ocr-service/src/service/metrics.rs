use log::debug;
use ocr_core::application::ProtocolObserver;
use ocr_core::domain::RoundKey;
use ocr_core::foundation::{ConfigDigest, Epoch, OcrError, OracleId};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub epochs_started: u64,
    pub reports_finalized: u64,
    pub transmissions_confirmed: u64,
    pub transmit_failures: u64,
}

/// Prometheus view of protocol progress, fed through `ProtocolObserver`.
pub struct Metrics {
    registry: Registry,
    epochs_started_total: IntCounter,
    current_epoch: IntGauge,
    rounds_total: IntCounterVec,
    transmissions_total: IntCounterVec,
    config_changes_total: IntCounter,
    persistence_failures_total: IntCounterVec,
    started_at: Instant,
    epochs_started: AtomicU64,
    reports_finalized: AtomicU64,
    transmissions_confirmed: AtomicU64,
    transmit_failures: AtomicU64,
}

fn metric_err(err: prometheus::Error) -> OcrError {
    OcrError::Message(err.to_string())
}

impl Metrics {
    pub fn new() -> Result<Self, OcrError> {
        debug!("initializing prometheus metrics");
        let registry = Registry::new();
        let epochs_started_total = IntCounter::new("ocr_epochs_started_total", "Epochs entered").map_err(metric_err)?;
        let current_epoch = IntGauge::new("ocr_current_epoch", "Most recently entered epoch").map_err(metric_err)?;
        let rounds_total = IntCounterVec::new(prometheus::Opts::new("ocr_rounds_total", "Round events by stage"), &["stage"]).map_err(metric_err)?;
        let transmissions_total =
            IntCounterVec::new(prometheus::Opts::new("ocr_transmissions_total", "Transmission events by outcome"), &["outcome"])
                .map_err(metric_err)?;
        let config_changes_total = IntCounter::new("ocr_config_changes_total", "Adopted config changes").map_err(metric_err)?;
        let persistence_failures_total = IntCounterVec::new(
            prometheus::Opts::new("ocr_persistence_failures_total", "Failed storage operations"),
            &["operation"],
        )
        .map_err(metric_err)?;

        registry.register(Box::new(epochs_started_total.clone())).map_err(metric_err)?;
        registry.register(Box::new(current_epoch.clone())).map_err(metric_err)?;
        registry.register(Box::new(rounds_total.clone())).map_err(metric_err)?;
        registry.register(Box::new(transmissions_total.clone())).map_err(metric_err)?;
        registry.register(Box::new(config_changes_total.clone())).map_err(metric_err)?;
        registry.register(Box::new(persistence_failures_total.clone())).map_err(metric_err)?;

        debug!("prometheus metrics registered metric_count=6");
        Ok(Self {
            registry,
            epochs_started_total,
            current_epoch,
            rounds_total,
            transmissions_total,
            config_changes_total,
            persistence_failures_total,
            started_at: Instant::now(),
            epochs_started: AtomicU64::new(0),
            reports_finalized: AtomicU64::new(0),
            transmissions_confirmed: AtomicU64::new(0),
            transmit_failures: AtomicU64::new(0),
        })
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.started_at.elapsed(),
            epochs_started: self.epochs_started.load(Ordering::Relaxed),
            reports_finalized: self.reports_finalized.load(Ordering::Relaxed),
            transmissions_confirmed: self.transmissions_confirmed.load(Ordering::Relaxed),
            transmit_failures: self.transmit_failures.load(Ordering::Relaxed),
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, OcrError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer).map_err(metric_err)?;
        String::from_utf8(buffer).map_err(|err| OcrError::EncodingError(err.to_string()))
    }
}

impl ProtocolObserver for Metrics {
    fn on_epoch_started(&self, _config_digest: &ConfigDigest, epoch: Epoch, _leader: OracleId) {
        self.epochs_started_total.inc();
        self.current_epoch.set(i64::from(epoch));
        self.epochs_started.fetch_add(1, Ordering::Relaxed);
    }

    fn on_round_started(&self, _key: &RoundKey) {
        self.rounds_total.with_label_values(&["started"]).inc();
    }

    fn on_observation_failed(&self, _key: &RoundKey, _reason: &str) {
        self.rounds_total.with_label_values(&["observation_failed"]).inc();
    }

    fn on_report_signed(&self, _key: &RoundKey) {
        self.rounds_total.with_label_values(&["signed"]).inc();
    }

    fn on_report_finalized(&self, _key: &RoundKey, _median: i128) {
        self.rounds_total.with_label_values(&["finalized"]).inc();
        self.reports_finalized.fetch_add(1, Ordering::Relaxed);
    }

    fn on_transmit_attempt(&self, _key: &RoundKey, _attempt: u32) {
        self.transmissions_total.with_label_values(&["attempt"]).inc();
    }

    fn on_transmit_failed(&self, _key: &RoundKey, _reason: &str) {
        self.transmissions_total.with_label_values(&["failed"]).inc();
        self.transmit_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn on_transmission_confirmed(&self, _key: &RoundKey) {
        self.transmissions_total.with_label_values(&["confirmed"]).inc();
        self.transmissions_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_transmission_abandoned(&self, _key: &RoundKey, _reason: &str) {
        self.transmissions_total.with_label_values(&["abandoned"]).inc();
    }

    fn on_config_changed(&self, _previous: Option<&ConfigDigest>, _current: &ConfigDigest) {
        self.config_changes_total.inc();
    }

    fn on_persistence_failure(&self, operation: &str, _error: &OcrError) {
        self.persistence_failures_total.with_label_values(&[operation]).inc();
    }
}
