use super::{AggregatorCommand, CosignCommand, SchedulerEvent};
use crate::domain::RoundKey;
use crate::infrastructure::transport::{MessageEnvelope, TransportMessage};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use log::{debug, trace};
use tokio::sync::mpsc;

pub struct Router {
    pub scheduler: mpsc::Sender<SchedulerEvent>,
    pub aggregator: mpsc::Sender<AggregatorCommand>,
    pub cosigner: mpsc::Sender<CosignCommand>,
}

impl Router {
    /// Runs until the inbound stream ends or a downstream task is gone.
    pub async fn run(self, mut inbound: BoxStream<'static, MessageEnvelope>) {
        while let Some(envelope) = inbound.next().await {
            let from = envelope.sender;
            let digest = envelope.config_digest;
            trace!("routing message kind={} from={} seq_no={}", envelope.payload.kind(), from, envelope.seq_no);
            let delivered = match envelope.payload {
                TransportMessage::NewEpoch { epoch } => self.scheduler.send(SchedulerEvent::NewEpoch { from, epoch }).await.is_ok(),
                TransportMessage::ObserveReq { epoch, round } => {
                    self.scheduler.send(SchedulerEvent::ObserveReq { from, epoch, round }).await.is_ok()
                }
                TransportMessage::ReportReq { epoch, round, observations } => {
                    self.scheduler.send(SchedulerEvent::ReportReq { from, epoch, round, observations }).await.is_ok()
                }
                TransportMessage::Observe { epoch, round, observation } => {
                    let key = RoundKey::new(digest, epoch, round);
                    self.aggregator.send(AggregatorCommand::Observe { from, key, observation }).await.is_ok()
                }
                TransportMessage::ReportShare { epoch, round, report, share } => {
                    self.cosigner.send(CosignCommand::Share { from, epoch, round, report, share }).await.is_ok()
                }
                TransportMessage::FinalEcho { epoch, round, report, shares } => {
                    self.cosigner.send(CosignCommand::Echo { from, epoch, round, report, shares }).await.is_ok()
                }
            };
            if !delivered {
                debug!("router stopping: downstream task closed");
                return;
            }
        }
        debug!("router stopping: inbound stream ended");
    }
}
