//! Tracks the contract's configuration and hands confirmed changes to the owner.

use crate::domain::ContractConfig;
use crate::foundation::{ConfigDigest, OcrError};
use crate::infrastructure::chain::{ConfigDetails, ConfigSubscription, ConfigTracker};
use crate::infrastructure::config::ConfigSyncConfig;
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

pub struct ConfigSync {
    tracker: Arc<dyn ConfigTracker>,
    settings: ConfigSyncConfig,
    chain_timeout: Duration,
    current: Option<ConfigDigest>,
    changes: mpsc::Sender<ContractConfig>,
}

impl ConfigSync {
    /// `current` is the digest already in force; only a different digest is forwarded.
    pub fn new(
        tracker: Arc<dyn ConfigTracker>,
        settings: ConfigSyncConfig,
        chain_timeout: Duration,
        current: Option<ConfigDigest>,
        changes: mpsc::Sender<ContractConfig>,
    ) -> Self {
        Self { tracker, settings, chain_timeout, current, changes }
    }

    pub async fn run(mut self) {
        let mut poll = tokio::time::interval(self.settings.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut subscription = self.subscribe().await;
        let mut resubscribe_at = subscription.is_none().then(|| Instant::now() + self.settings.subscribe_interval());

        loop {
            tokio::select! {
                _ = poll.tick() => {}
                notification = next_notification(&mut subscription) => match notification {
                    Some(details) => debug!("config notification changed_in_block={} config_digest={:#x}", details.changed_in_block, details.config_digest),
                    None => {
                        warn!("config subscription dropped; resubscribing in {}ms", self.settings.subscribe_interval_ms);
                        subscription = None;
                        resubscribe_at = Some(Instant::now() + self.settings.subscribe_interval());
                        continue;
                    }
                },
                _ = sleep_until(resubscribe_at) => {
                    subscription = self.subscribe().await;
                    resubscribe_at = subscription.is_none().then(|| Instant::now() + self.settings.subscribe_interval());
                }
            }
            match self.check().await {
                Ok(()) => {}
                Err(OcrError::NodeClosed) => {
                    debug!("config sync stopping: owner closed");
                    return;
                }
                Err(err) => warn!("config check failed error={}", err),
            }
        }
    }

    async fn subscribe(&self) -> Option<ConfigSubscription> {
        match self.with_timeout("subscribe", self.tracker.subscribe()).await {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                warn!("config subscription failed error={}", err);
                None
            }
        }
    }

    async fn with_timeout<T>(&self, operation: &str, call: impl Future<Output = Result<T, OcrError>>) -> Result<T, OcrError> {
        tokio::time::timeout(self.chain_timeout, call)
            .await
            .unwrap_or_else(|_| Err(OcrError::timeout(operation, self.chain_timeout.as_millis() as u64)))
    }

    /// Forwards the latest config once it is `confirmations` blocks deep and differs from the current one.
    pub async fn check(&mut self) -> Result<(), OcrError> {
        let Some(details) = self.with_timeout("latest_config_details", self.tracker.latest_config_details()).await? else {
            return Ok(());
        };
        if self.current == Some(details.config_digest) {
            return Ok(());
        }
        let height = self.with_timeout("latest_block_height", self.tracker.latest_block_height()).await?;
        if !is_confirmed(&details, height, self.settings.confirmations) {
            debug!(
                "config change not yet confirmed config_digest={:#x} changed_in_block={} height={} confirmations={}",
                details.config_digest, details.changed_in_block, height, self.settings.confirmations
            );
            return Ok(());
        }

        let config = self.with_timeout("config_from_logs", self.tracker.config_from_logs(details.changed_in_block)).await?;
        config.verify_digest()?;
        if config.config_digest != details.config_digest {
            return Err(OcrError::ConfigDigestMismatch {
                carried: details.config_digest.to_string(),
                computed: config.config_digest.to_string(),
            });
        }
        info!("config change confirmed config_digest={:#x} changed_in_block={}", config.config_digest, details.changed_in_block);
        self.current = Some(config.config_digest);
        self.changes.send(config).await.map_err(|_| OcrError::NodeClosed)
    }
}

fn is_confirmed(details: &ConfigDetails, height: u64, confirmations: u64) -> bool {
    height >= details.changed_in_block && height - details.changed_in_block + 1 >= confirmations.max(1)
}

async fn next_notification(subscription: &mut Option<ConfigSubscription>) -> Option<ConfigDetails> {
    match subscription {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
