//! Durable delivery of finalized reports.

use super::TransmitCommand;
use crate::application::observer::ProtocolObserver;
use crate::application::runtime::AbortOnDrop;
use crate::domain::hashes::transmit_order;
use crate::domain::{stagger_delay, PendingTransmission, PendingTransmissionKey, SharedConfig, TransmissionDetails};
use crate::foundation::{now_nanos, OcrError, OracleId};
use crate::infrastructure::chain::ContractTransmitter;
use crate::infrastructure::config::TransmissionConfig;
use crate::infrastructure::storage::Database;
use log::{debug, info, trace, warn};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

pub struct Transmitter {
    pub shared: Arc<SharedConfig>,
    pub self_id: OracleId,
    pub database: Arc<dyn Database>,
    pub chain: Arc<dyn ContractTransmitter>,
    pub settings: TransmissionConfig,
    pub chain_timeout: Duration,
    pub observer: Arc<dyn ProtocolObserver>,
}

impl Transmitter {
    pub async fn run(self, mut commands: mpsc::Receiver<TransmitCommand>) {
        let this = Arc::new(self);
        let mut workers: HashMap<PendingTransmissionKey, AbortOnDrop> = HashMap::new();

        match this.database.pending_transmissions_with_config_digest(&this.shared.digest()) {
            Ok(pending) => {
                if !pending.is_empty() {
                    info!("resuming pending transmissions config_digest={:#x} count={}", this.shared.digest(), pending.len());
                }
                for (key, transmission) in pending {
                    workers.insert(key, AbortOnDrop::spawn(this.clone().deliver(key, transmission)));
                }
            }
            Err(err) => {
                this.observer.on_persistence_failure("pending_transmissions_with_config_digest", &err);
            }
        }

        let mut gc = tokio::time::interval(this.settings.gc_interval());
        gc.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(TransmitCommand::Schedule { key, transmission }) = command else {
                        break;
                    };
                    if workers.get(&key).is_some_and(|worker| !worker.is_finished()) {
                        trace!("transmission already scheduled key={}", key);
                        continue;
                    }
                    if let Err(err) = this.database.store_pending_transmission(&key, &transmission) {
                        this.observer.on_persistence_failure("store_pending_transmission", &err);
                        continue;
                    }
                    debug!("pending transmission stored key={} median={}", key, transmission.median);
                    workers.insert(key, AbortOnDrop::spawn(this.clone().deliver(key, transmission)));
                }
                _ = gc.tick() => {
                    workers.retain(|_, worker| !worker.is_finished());
                    let cutoff = this.settings.retention_cutoff_nanos(now_nanos());
                    match this.database.delete_pending_transmissions_older_than(cutoff) {
                        Ok(0) => {}
                        Ok(deleted) => info!("pending transmission gc deleted={} cutoff_nanos={}", deleted, cutoff),
                        Err(err) => this.observer.on_persistence_failure("delete_pending_transmissions_older_than", &err),
                    }
                }
            }
        }
    }

    async fn deliver(self: Arc<Self>, key: PendingTransmissionKey, transmission: PendingTransmission) {
        let order = transmit_order(&key.config_digest, key.epoch, key.round, self.shared.n());
        let stagger = stagger_delay(&order, self.self_id, self.shared.delta_stage());
        if !stagger.is_zero() {
            trace!("transmission staggered key={} delay_ms={}", key, stagger.as_millis());
            tokio::time::sleep(stagger).await;
        }

        let mut attempt: u32 = 0;
        loop {
            if transmission.is_older_than(self.settings.retention_cutoff_nanos(now_nanos())) {
                self.finish(&key, None);
                return;
            }
            match self.latest_details().await {
                Ok(details) if details.supersedes(&key) => {
                    self.finish(&key, Some(&details));
                    return;
                }
                Ok(_) => {}
                Err(err) => debug!("latest transmission details unavailable key={} error={}", key, err),
            }

            attempt = attempt.saturating_add(1);
            self.observer.on_transmit_attempt(&key, attempt);
            let submitted = tokio::time::timeout(self.chain_timeout, self.chain.transmit(&transmission.serialized_report, &transmission.shares))
                .await
                .unwrap_or_else(|_| Err(OcrError::timeout("transmit", self.chain_timeout.as_millis() as u64)));
            match submitted {
                Ok(tx) => {
                    debug!("transmission submitted key={} tx={} attempt={}", key, tx.0, attempt);
                    if self.await_confirmation(&key).await {
                        return;
                    }
                    self.observer.on_transmit_failed(&key, "not confirmed before confirm timeout");
                }
                Err(err) => self.observer.on_transmit_failed(&key, &err.to_string()),
            }

            let jitter = rand::thread_rng().gen_range(0..=self.settings.retry.jitter_ms);
            let backoff = self.settings.retry.jittered_delay(attempt, jitter);
            trace!("transmission retry scheduled key={} attempt={} delay_ms={}", key, attempt, backoff.as_millis());
            tokio::time::sleep(backoff).await;
        }
    }

    async fn latest_details(&self) -> Result<TransmissionDetails, OcrError> {
        tokio::time::timeout(self.chain_timeout, self.chain.latest_transmission_details())
            .await
            .unwrap_or_else(|_| Err(OcrError::timeout("latest_transmission_details", self.chain_timeout.as_millis() as u64)))
    }

    /// Polls until the chain holds `key` or later. Returns false on confirm timeout.
    async fn await_confirmation(&self, key: &PendingTransmissionKey) -> bool {
        let deadline = Instant::now() + self.settings.confirm_timeout();
        loop {
            tokio::time::sleep(self.settings.poll_interval()).await;
            match self.latest_details().await {
                Ok(details) if details.supersedes(key) => {
                    self.finish(key, Some(&details));
                    return true;
                }
                Ok(_) => {}
                Err(err) => debug!("confirmation poll failed key={} error={}", key, err),
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }

    /// Drops the stored entry; `details` is the chain state that made it unnecessary, `None` for expiry.
    fn finish(&self, key: &PendingTransmissionKey, details: Option<&TransmissionDetails>) {
        if let Err(err) = self.database.delete_pending_transmission(key) {
            self.observer.on_persistence_failure("delete_pending_transmission", &err);
        }
        match details {
            Some(details) if details.round_key() == *key => self.observer.on_transmission_confirmed(key),
            Some(details) => self.observer.on_transmission_abandoned(key, &format!("superseded by {}", details.round_key())),
            None => self.observer.on_transmission_abandoned(key, "expired"),
        }
    }
}
