use super::ObserveCommand;
use crate::application::observer::ProtocolObserver;
use crate::domain::{OffchainSigner, SignedObservation};
use crate::foundation::OracleId;
use crate::infrastructure::datasource::DataSource;
use crate::infrastructure::transport::{Outbound, TransportMessage};
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Samples the data source once per requested round and answers the leader.
pub struct ObservationTask {
    pub self_id: OracleId,
    pub data_source: Arc<dyn DataSource>,
    pub signer: Arc<dyn OffchainSigner>,
    pub outbound: Arc<Outbound>,
    pub timeout: Duration,
    pub observer: Arc<dyn ProtocolObserver>,
}

impl ObservationTask {
    pub async fn run(self, mut commands: mpsc::Receiver<ObserveCommand>) {
        while let Some(ObserveCommand { key, leader }) = commands.recv().await {
            let value = match tokio::time::timeout(self.timeout, self.data_source.observe()).await {
                Ok(Ok(value)) => value,
                Ok(Err(err)) => {
                    self.observer.on_observation_failed(&key, &err.to_string());
                    continue;
                }
                Err(_) => {
                    self.observer.on_observation_failed(&key, &format!("data source timed out after {}ms", self.timeout.as_millis()));
                    continue;
                }
            };
            debug!("observed value key={} value={} leader={}", key, value, leader);
            let observation = SignedObservation::sign(&key, self.self_id, value, self.signer.as_ref());
            self.outbound.send_to(TransportMessage::Observe { epoch: key.epoch, round: key.round, observation }, leader);
        }
    }
}
