//! Epoch and round state machine of one oracle instance.

use super::{AggregatorCommand, CosignCommand, ObserveCommand, SchedulerEvent, TimeoutKind};
use crate::application::observer::ProtocolObserver;
use crate::application::runtime::{spawn_timer, AbortOnDrop};
use crate::domain::{
    verify_observation_set, EpochDecision, FollowerRounds, OffchainVerifier, Pacemaker, PersistentState, ProtocolPhase, RoundKey, SharedConfig,
    SignedObservation,
};
use crate::foundation::{Epoch, OcrError, OracleId, Round};
use crate::infrastructure::storage::Database;
use crate::infrastructure::transport::{Outbound, TransportMessage};
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct ArmedTimer {
    seq: u64,
    _guard: AbortOnDrop,
}

pub struct SchedulerLinks {
    pub events: mpsc::Sender<SchedulerEvent>,
    pub observe: mpsc::Sender<ObserveCommand>,
    pub aggregator: mpsc::Sender<AggregatorCommand>,
    pub cosigner: mpsc::Sender<CosignCommand>,
}

pub struct SchedulerSetup {
    pub shared: Arc<SharedConfig>,
    pub self_id: OracleId,
    /// Must already hold a durably written state.
    pub pacemaker: Pacemaker,
    pub database: Arc<dyn Database>,
    pub outbound: Arc<Outbound>,
    pub verifier: Arc<dyn OffchainVerifier>,
    pub links: SchedulerLinks,
    pub observer: Arc<dyn ProtocolObserver>,
}

pub struct Scheduler {
    shared: Arc<SharedConfig>,
    self_id: OracleId,
    pacemaker: Pacemaker,
    phase: ProtocolPhase,
    /// Round the leader opened last in the current epoch.
    leader_round: Option<Round>,
    /// Rounds this node answered as a follower in the current epoch.
    follower: FollowerRounds,
    database: Arc<dyn Database>,
    outbound: Arc<Outbound>,
    verifier: Arc<dyn OffchainVerifier>,
    links: SchedulerLinks,
    observer: Arc<dyn ProtocolObserver>,
    timer_seq: u64,
    progress_timer: Option<ArmedTimer>,
    resend_timer: Option<ArmedTimer>,
    round_timer: Option<ArmedTimer>,
}

impl Scheduler {
    pub fn new(setup: SchedulerSetup) -> Self {
        Self {
            shared: setup.shared,
            self_id: setup.self_id,
            pacemaker: setup.pacemaker,
            phase: ProtocolPhase::AwaitingConfig,
            leader_round: None,
            follower: FollowerRounds::default(),
            database: setup.database,
            outbound: setup.outbound,
            verifier: setup.verifier,
            links: setup.links,
            observer: setup.observer,
            timer_seq: 0,
            progress_timer: None,
            resend_timer: None,
            round_timer: None,
        }
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<SchedulerEvent>) {
        let epoch = self.pacemaker.epoch();
        info!(
            "scheduler started config_digest={:#x} oracle_id={} epoch={} n={} quorum={}",
            self.shared.digest(),
            self.self_id,
            epoch,
            self.shared.n(),
            self.shared.quorum()
        );
        self.outbound.broadcast(TransportMessage::NewEpoch { epoch });
        if self.enter_epoch(epoch).await.is_err() {
            return;
        }
        while let Some(event) = events.recv().await {
            if self.handle(event).await.is_err() {
                debug!("scheduler stopping: downstream task closed");
                return;
            }
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.pacemaker.epoch()
    }

    fn key(&self, round: Round) -> RoundKey {
        RoundKey::new(self.shared.digest(), self.pacemaker.epoch(), round)
    }

    fn is_leader(&self) -> bool {
        self.shared.leader(self.pacemaker.epoch()) == self.self_id
    }

    async fn handle(&mut self, event: SchedulerEvent) -> Result<(), OcrError> {
        match event {
            SchedulerEvent::NewEpoch { from, epoch } => self.on_new_epoch(from, epoch).await,
            SchedulerEvent::ObserveReq { from, epoch, round } => self.on_observe_req(from, epoch, round).await,
            SchedulerEvent::ReportReq { from, epoch, round, observations } => self.on_report_req(from, epoch, round, observations).await,
            SchedulerEvent::ObservationsReady { key, observations } => {
                self.on_observations_ready(key, observations);
                Ok(())
            }
            SchedulerEvent::RoundFinalized { key } => {
                self.on_round_finalized(key);
                Ok(())
            }
            SchedulerEvent::Timeout { kind, seq } => self.on_timeout(kind, seq).await,
        }
    }

    fn transition(&mut self, target: ProtocolPhase) {
        if self.phase == target {
            return;
        }
        if !self.phase.can_transition_to(target) {
            trace!("phase transition skipped from={} to={}", self.phase, target);
            return;
        }
        trace!("phase transition from={} to={} epoch={}", self.phase, target, self.pacemaker.epoch());
        self.phase = target;
    }

    fn arm(&mut self, kind: TimeoutKind, delay: Duration) -> ArmedTimer {
        self.timer_seq += 1;
        let seq = self.timer_seq;
        ArmedTimer { seq, _guard: spawn_timer(self.links.events.clone(), delay, SchedulerEvent::Timeout { kind, seq }) }
    }

    fn arm_progress(&mut self) {
        self.progress_timer = Some(self.arm(TimeoutKind::Progress, self.shared.delta_progress()));
    }

    fn is_current(timer: &Option<ArmedTimer>, seq: u64) -> bool {
        timer.as_ref().is_some_and(|armed| armed.seq == seq)
    }

    fn persist(&self, state: &PersistentState) -> Result<(), OcrError> {
        self.database.write_state(&self.shared.digest(), state).map_err(|err| {
            self.observer.on_persistence_failure("write_state", &err);
            err
        })
    }

    async fn enter_epoch(&mut self, epoch: Epoch) -> Result<(), OcrError> {
        self.transition(ProtocolPhase::LeaderElection);
        self.leader_round = None;
        self.follower = FollowerRounds::default();
        self.round_timer = None;
        if self.pacemaker.highest_sent() <= epoch {
            self.resend_timer = None;
        }
        self.arm_progress();
        let leader = self.shared.leader(epoch);
        self.observer.on_epoch_started(&self.shared.digest(), epoch, leader);
        if leader == self.self_id {
            self.start_round(0).await?;
        }
        Ok(())
    }

    async fn start_round(&mut self, round: Round) -> Result<(), OcrError> {
        let key = self.key(round);
        self.leader_round = Some(round);
        self.transition(ProtocolPhase::ObservationGathering);
        self.links.aggregator.send(AggregatorCommand::Collect(key)).await.map_err(|_| OcrError::NodeClosed)?;
        self.observer.on_round_started(&key);
        self.outbound.broadcast(TransportMessage::ObserveReq { epoch: key.epoch, round });
        self.round_timer = Some(self.arm(TimeoutKind::Round, self.shared.delta_round()));
        Ok(())
    }

    /// Persists and announces the next epoch. A persistence failure leaves the state untouched.
    fn propose_epoch(&mut self) {
        let proposal = self.pacemaker.next_proposal();
        let next = self.pacemaker.prepare_send(proposal);
        if let Err(err) = self.persist(&next) {
            warn!("cannot persist epoch proposal epoch={} error={}", proposal, err);
            return;
        }
        self.pacemaker.commit(next);
        info!("proposing new epoch current={} proposal={}", self.pacemaker.epoch(), proposal);
        self.outbound.broadcast(TransportMessage::NewEpoch { epoch: proposal });
        self.resend_timer = Some(self.arm(TimeoutKind::Resend, self.shared.delta_resend()));
    }

    async fn on_new_epoch(&mut self, from: OracleId, announced: Epoch) -> Result<(), OcrError> {
        match self.pacemaker.on_new_epoch(from, announced) {
            EpochDecision::Unchanged => Ok(()),
            EpochDecision::Recorded => {
                trace!("epoch announcement recorded from={} epoch={}", from, announced);
                Ok(())
            }
            EpochDecision::Enter { epoch, state } => {
                if let Err(err) = self.persist(&state) {
                    warn!("cannot persist epoch change epoch={} error={}", epoch, err);
                    return Ok(());
                }
                self.pacemaker.commit(state);
                self.outbound.broadcast(TransportMessage::NewEpoch { epoch });
                self.enter_epoch(epoch).await
            }
        }
    }

    async fn on_observe_req(&mut self, from: OracleId, epoch: Epoch, round: Round) -> Result<(), OcrError> {
        if !self.accepts_leader_message(from, epoch, round) {
            debug!("observe request ignored from={} epoch={} round={} current_epoch={}", from, epoch, round, self.epoch());
            return Ok(());
        }
        if !self.follower.accept_observe(round) {
            trace!("observe request for past round ignored epoch={} round={}", epoch, round);
            return Ok(());
        }
        self.transition(ProtocolPhase::ObservationGathering);
        let command = ObserveCommand { key: self.key(round), leader: from };
        self.links.observe.send(command).await.map_err(|_| OcrError::NodeClosed)
    }

    async fn on_report_req(
        &mut self,
        from: OracleId,
        epoch: Epoch,
        round: Round,
        observations: Vec<SignedObservation>,
    ) -> Result<(), OcrError> {
        if !self.accepts_leader_message(from, epoch, round) {
            debug!("report request ignored from={} epoch={} round={} current_epoch={}", from, epoch, round, self.epoch());
            return Ok(());
        }
        let key = self.key(round);
        let report = match verify_observation_set(&key, &observations, self.shared.quorum(), self.shared.n(), self.verifier.as_ref()) {
            Ok(report) => report,
            Err(err) => {
                warn!("invalid observation set from leader key={} leader={} error={}", key, from, err);
                return Ok(());
            }
        };
        if !self.follower.accept_report(round) {
            trace!("report request for past round ignored epoch={} round={}", epoch, round);
            return Ok(());
        }
        debug!("report built key={} median={} observers={}", key, report.median, report.observers.len());
        self.transition(ProtocolPhase::ReportAggregation);
        self.transition(ProtocolPhase::CoSigning);
        self.links.cosigner.send(CosignCommand::Sign(report)).await.map_err(|_| OcrError::NodeClosed)
    }

    fn accepts_leader_message(&self, from: OracleId, epoch: Epoch, round: Round) -> bool {
        epoch == self.pacemaker.epoch() && from == self.shared.leader(epoch) && round < self.shared.offchain.r_max
    }

    fn on_observations_ready(&mut self, key: RoundKey, observations: Vec<SignedObservation>) {
        if !self.is_leader() || self.leader_round.map(|round| self.key(round)) != Some(key) {
            trace!("stale observation quorum ignored key={}", key);
            return;
        }
        self.transition(ProtocolPhase::ReportAggregation);
        self.outbound.broadcast(TransportMessage::ReportReq { epoch: key.epoch, round: key.round, observations });
    }

    fn on_round_finalized(&mut self, key: RoundKey) {
        if key.config_digest != self.shared.digest() || key.epoch != self.pacemaker.epoch() {
            return;
        }
        self.transition(ProtocolPhase::Transmitting);
        self.arm_progress();
    }

    async fn on_timeout(&mut self, kind: TimeoutKind, seq: u64) -> Result<(), OcrError> {
        match kind {
            TimeoutKind::Progress if Self::is_current(&self.progress_timer, seq) => {
                info!("no progress from leader epoch={} leader={}", self.epoch(), self.shared.leader(self.epoch()));
                self.transition(ProtocolPhase::LeaderElection);
                self.propose_epoch();
                self.arm_progress();
            }
            TimeoutKind::Resend if Self::is_current(&self.resend_timer, seq) => {
                let sent = self.pacemaker.highest_sent();
                if sent > self.pacemaker.epoch() {
                    trace!("resending epoch proposal epoch={}", sent);
                    self.outbound.broadcast(TransportMessage::NewEpoch { epoch: sent });
                    self.resend_timer = Some(self.arm(TimeoutKind::Resend, self.shared.delta_resend()));
                } else {
                    self.resend_timer = None;
                }
            }
            TimeoutKind::Round if Self::is_current(&self.round_timer, seq) => {
                self.round_timer = None;
                let next = self.leader_round.map_or(0, |round| round.saturating_add(1));
                if self.is_leader() && next < self.shared.offchain.r_max {
                    self.start_round(next).await?;
                } else if self.is_leader() {
                    info!("leader exhausted rounds epoch={} r_max={}", self.epoch(), self.shared.offchain.r_max);
                    self.transition(ProtocolPhase::LeaderElection);
                    self.propose_epoch();
                }
            }
            _ => trace!("stale timer ignored kind={:?} seq={}", kind, seq),
        }
        Ok(())
    }
}
