use super::{CosignCommand, SchedulerEvent, TransmitCommand};
use crate::application::observer::ProtocolObserver;
use crate::domain::{OnchainSigner, OnchainVerifier, Report, RoundKey, ShareCollector, ShareOutcome, SignOnceGuard, SignatureShare};
use crate::foundation::{now_nanos, ConfigDigest, Epoch, OcrError, OracleId, Round};
use crate::infrastructure::transport::{Outbound, TransportMessage};
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Rounds whose shares are kept; older collectors are dropped first.
const MAX_TRACKED_ROUNDS: usize = 16;

pub struct Cosigner {
    pub config_digest: ConfigDigest,
    pub self_id: OracleId,
    pub quorum: usize,
    pub oracle_count: usize,
    pub signer: Arc<dyn OnchainSigner>,
    pub verifier: Arc<dyn OnchainVerifier>,
    pub outbound: Arc<Outbound>,
    pub scheduler: mpsc::Sender<SchedulerEvent>,
    pub transmitter: mpsc::Sender<TransmitCommand>,
    pub observer: Arc<dyn ProtocolObserver>,
}

struct CosignState {
    guard: SignOnceGuard,
    collectors: BTreeMap<RoundKey, ShareCollector>,
}

impl Cosigner {
    pub async fn run(self, mut commands: mpsc::Receiver<CosignCommand>) {
        let mut state = CosignState { guard: SignOnceGuard::default(), collectors: BTreeMap::new() };
        while let Some(command) = commands.recv().await {
            let result = match command {
                CosignCommand::Sign(report) => {
                    self.sign(&mut state, report);
                    Ok(())
                }
                CosignCommand::Share { from, epoch, round, report, share } => {
                    if share.signer != from {
                        debug!("share rejected: signer differs from sender signer={} from={}", share.signer, from);
                        continue;
                    }
                    self.accept_shares(&mut state, epoch, round, &report, vec![share], true).await
                }
                CosignCommand::Echo { from, epoch, round, report, shares } => {
                    trace!("final echo received from={} epoch={} round={} shares={}", from, epoch, round, shares.len());
                    self.accept_shares(&mut state, epoch, round, &report, shares, false).await
                }
            };
            if result.is_err() {
                debug!("cosigner stopping: downstream task closed");
                return;
            }
        }
    }

    fn sign(&self, state: &mut CosignState, report: Report) {
        let key = report.key;
        let report_hash = report.hash();
        state.guard.prune_before(&RoundKey::new(self.config_digest, key.epoch, 0));
        match state.guard.check_and_record(key, report_hash) {
            Ok(true) => {}
            Ok(false) => {
                trace!("report already signed key={}", key);
                return;
            }
            Err(err) => {
                warn!("refusing to sign second report key={} error={}", key, err);
                return;
            }
        }
        let share = match self.signer.sign_report(self.self_id, &report_hash) {
            Ok(share) => share,
            Err(err) => {
                warn!("report signing failed key={} error={}", key, err);
                return;
            }
        };
        self.observer.on_report_signed(&key);
        self.outbound.broadcast(TransportMessage::ReportShare { epoch: key.epoch, round: key.round, report: report.bytes, share });
    }

    async fn accept_shares(
        &self,
        state: &mut CosignState,
        epoch: Epoch,
        round: Round,
        report_bytes: &[u8],
        shares: Vec<SignatureShare>,
        direct: bool,
    ) -> Result<(), OcrError> {
        let report = match Report::decode(report_bytes) {
            Ok(report) => report,
            Err(err) => {
                debug!("share carries malformed report epoch={} round={} error={}", epoch, round, err);
                return Ok(());
            }
        };
        let key = RoundKey::new(self.config_digest, epoch, round);
        if report.key != key {
            debug!("share report key mismatch claimed={} report={}", key, report.key);
            return Ok(());
        }

        let collector = state.collectors.entry(key).or_insert_with(|| ShareCollector::new(key, self.quorum, self.oracle_count));
        let mut finalized = None;
        for share in shares {
            let signer = share.signer;
            match collector.add(&report, share, self.verifier.as_ref(), now_nanos()) {
                Ok(ShareOutcome::Finalized(transmission)) => finalized = Some(transmission),
                Ok(ShareOutcome::Stored { count }) => trace!("share stored key={} signer={} count={}", key, signer, count),
                Ok(ShareOutcome::LateAccepted) => trace!("late share accepted key={} signer={}", key, signer),
                Err(OcrError::DuplicateContribution { .. }) if !direct => {}
                Err(err) => debug!("share rejected key={} signer={} error={}", key, signer, err),
            }
        }
        while state.collectors.len() > MAX_TRACKED_ROUNDS {
            state.collectors.pop_first();
        }

        let Some(transmission) = finalized else {
            return Ok(());
        };
        self.observer.on_report_finalized(&key, transmission.median);
        if direct {
            self.outbound.broadcast(TransportMessage::FinalEcho {
                epoch,
                round,
                report: transmission.serialized_report.clone(),
                shares: transmission.shares.clone(),
            });
        }
        self.scheduler.send(SchedulerEvent::RoundFinalized { key }).await.map_err(|_| OcrError::NodeClosed)?;
        self.transmitter.send(TransmitCommand::Schedule { key, transmission }).await.map_err(|_| OcrError::NodeClosed)?;
        Ok(())
    }
}
