use ocr_core::domain::{fresh_epoch, EpochDecision, Pacemaker, PersistentState};
use ocr_core::foundation::{Epoch, OracleId};

const N: usize = 4;
const QUORUM: usize = 2;
const MAX_JUMP: u32 = 100;

fn pacemakers(stored: &[Option<PersistentState>]) -> Vec<Pacemaker> {
    stored
        .iter()
        .enumerate()
        .map(|(i, state)| Pacemaker::restart(state.clone(), 0, N, QUORUM, OracleId(i as u8), MAX_JUMP))
        .collect()
}

/// Delivers every node's current announcement to every node until nothing changes.
fn gossip(nodes: &mut [Pacemaker]) {
    loop {
        let announced: Vec<Epoch> = nodes.iter().map(Pacemaker::highest_sent).collect();
        let mut changed = false;
        for node in nodes.iter_mut() {
            for (from, epoch) in announced.iter().enumerate() {
                if let EpochDecision::Enter { state, .. } = node.on_new_epoch(OracleId(from as u8), *epoch) {
                    node.commit(state);
                    changed = true;
                }
            }
        }
        if !changed {
            return;
        }
    }
}

#[test]
fn test_epochs_when_nodes_restart_at_different_heights_then_converge_on_quorum_epoch() {
    let stored = vec![
        Some(PersistentState { epoch: 10, highest_sent_epoch: 10, highest_received_epoch: vec![10; N] }),
        Some(PersistentState { epoch: 3, highest_sent_epoch: 12, highest_received_epoch: vec![3; N] }),
        None,
        None,
    ];
    let mut nodes = pacemakers(&stored);
    assert_eq!(nodes.iter().map(Pacemaker::epoch).collect::<Vec<_>>(), vec![12, 14, 2, 2]);

    gossip(&mut nodes);
    let epochs: Vec<Epoch> = nodes.iter().map(Pacemaker::epoch).collect();
    // Second-highest announcement is supported by two nodes; nobody follows the lone 14.
    assert_eq!(epochs, vec![12, 14, 12, 12]);
}

#[test]
fn test_epoch_when_restarted_repeatedly_then_strictly_increases() {
    let mut stored: Option<PersistentState> = None;
    let mut previous_max = 0;
    for _ in 0..5 {
        let pacemaker = Pacemaker::restart(stored.clone(), 0, N, QUORUM, OracleId(0), MAX_JUMP);
        assert!(pacemaker.epoch() > previous_max);
        let proposal = pacemaker.next_proposal();
        let sent = pacemaker.prepare_send(proposal);
        assert!(stored.as_ref().map_or(true, |old| old.check_successor(&sent).is_ok()));
        previous_max = sent.max_epoch();
        stored = Some(sent);
    }
    assert_eq!(fresh_epoch(stored.as_ref(), 0), previous_max + 2);
}

#[test]
fn test_on_new_epoch_when_byzantine_announces_huge_epoch_then_capped_and_alone() {
    let mut nodes = pacemakers(&[None, None, None, None]);
    let decision = nodes[0].on_new_epoch(OracleId(3), Epoch::MAX);
    assert_eq!(decision, EpochDecision::Recorded);
    assert_eq!(nodes[0].state().highest_received_epoch[3], 2 + MAX_JUMP);
    assert_eq!(nodes[0].epoch(), 2);

    // A second announcement at the cap reaches quorum, but never past the ceiling.
    match nodes[0].on_new_epoch(OracleId(2), Epoch::MAX) {
        EpochDecision::Enter { epoch, state } => {
            assert_eq!(epoch, 2 + MAX_JUMP);
            nodes[0].commit(state);
        }
        other => panic!("expected entry, got {other:?}"),
    }
}
