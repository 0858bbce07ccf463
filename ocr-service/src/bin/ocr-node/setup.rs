use log::info;
use ocr_core::foundation::OcrError;
use ocr_core::infrastructure::config::{load_validated_config, NodeConfig};
use ocr_core::infrastructure::logging::init_logger;
use ocr_service::service::metrics::Metrics;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const STATUS_INTERVAL: Duration = Duration::from_secs(30);

pub fn init_logging(log_dir: Option<&str>, filters: &str) -> Result<(), OcrError> {
    init_logger(log_dir, filters)
}

/// Runs before logging is up, so every validation problem goes into the returned error.
pub fn load_node_config(path: Option<&Path>) -> Result<NodeConfig, OcrError> {
    load_validated_config(path)
}

pub fn spawn_status_reporter(metrics: Arc<Metrics>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("status reporter started interval_seconds={}", STATUS_INTERVAL.as_secs());
        let mut interval = tokio::time::interval(STATUS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let snapshot = metrics.snapshot();
            info!(
                "periodic status report uptime_secs={} epochs_started={} reports_finalized={} transmissions_confirmed={} transmit_failures={}",
                snapshot.uptime.as_secs(),
                snapshot.epochs_started,
                snapshot.reports_finalized,
                snapshot.transmissions_confirmed,
                snapshot.transmit_failures
            );
        }
    })
}
