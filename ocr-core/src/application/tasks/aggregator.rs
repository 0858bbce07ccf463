use super::{AggregatorCommand, SchedulerEvent};
use crate::domain::{ObservationCollector, OffchainVerifier};
use log::{debug, trace};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Leader-side observation collection for the round the scheduler last opened.
pub struct Aggregator {
    pub quorum: usize,
    pub oracle_count: usize,
    pub verifier: Arc<dyn OffchainVerifier>,
    pub scheduler: mpsc::Sender<SchedulerEvent>,
}

impl Aggregator {
    pub async fn run(self, mut commands: mpsc::Receiver<AggregatorCommand>) {
        let mut collector: Option<ObservationCollector> = None;
        let mut reported = false;
        while let Some(command) = commands.recv().await {
            match command {
                AggregatorCommand::Collect(key) => {
                    trace!("collecting observations key={}", key);
                    collector = Some(ObservationCollector::new(key, self.quorum, self.oracle_count));
                    reported = false;
                }
                AggregatorCommand::Observe { from, key, observation } => {
                    let Some(current) = collector.as_mut() else {
                        trace!("observation without open round from={} key={}", from, key);
                        continue;
                    };
                    match current.add(from, &key, observation, self.verifier.as_ref()) {
                        Ok(count) => trace!("observation accepted key={} from={} count={}", key, from, count),
                        Err(err) => {
                            debug!("observation rejected key={} from={} error={}", key, from, err);
                            continue;
                        }
                    }
                    if !reported && current.has_quorum() {
                        reported = true;
                        let event = SchedulerEvent::ObservationsReady { key: *current.key(), observations: current.observations() };
                        if self.scheduler.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}
