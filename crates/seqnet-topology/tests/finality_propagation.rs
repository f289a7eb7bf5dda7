// Finality flowing from leaf chains up a recursive network

use proptest::prelude::*;
use seqnet_consensus::{AcceptanceEngine, AgreementPhase, L1Verifier, SequencerConfig};
use seqnet_core::{voter_id_from_agent, Candidate, Identifier, PolicyId, SignatureScheme, Vote};
use seqnet_topology::{
    anchor_candidate, decode_anchor, native_sequencer, recursive_rollup_network,
    recursive_sequencer, single_chain_network, L2Spec, RecursiveNetwork,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn three_level_network() -> RecursiveNetwork {
    init();
    let mut net = single_chain_network(1, "root", SequencerConfig::single_node("root")).unwrap();
    assert!(net.add_child(1, recursive_sequencer(2, "mid", 1, 1), SequencerConfig::single_node("mid")));
    assert!(net.add_child(2, recursive_sequencer(3, "leaf", 2, 1), SequencerConfig::agent_mesh("leaf", 3)));
    net
}

fn chain_ids(net: &RecursiveNetwork, leaf: u64) -> Vec<u64> {
    net.get_finality_path(leaf).iter().map(|n| n.chain_id()).collect()
}

#[test]
fn test_three_level_finality_path() {
    let net = three_level_network();
    assert_eq!(chain_ids(&net, 3), vec![3, 2, 1]);
    assert_eq!(chain_ids(&net, 1), vec![1]);
    // Depth is rewritten from the parent, not taken from the caller
    assert_eq!(net.find_by_chain_id(3).unwrap().identity().depth, 2);
}

#[test]
fn test_missing_chain_lookup_leaves_tree_unchanged() {
    let net = three_level_network();
    let before = net.clone();
    assert!(net.find_by_chain_id(404).is_none());
    assert!(chain_ids(&net, 404).is_empty());
    assert_eq!(net, before);
}

#[test]
fn test_certificate_propagates_to_root() {
    let net = three_level_network();

    // Leaf: agent mesh of 3, hard finality at ceil(0.8 * 3) = 3 votes
    let leaf = net.find_by_chain_id(3).unwrap();
    let leaf_engine = leaf.build_engine().unwrap();
    let leaf_tracker = leaf.build_tracker().unwrap();
    leaf_engine.start();

    let decision = Candidate::new(leaf.identity().domain.clone(), "summarize the report", 1);
    leaf_engine.add(decision.clone()).unwrap();
    leaf_tracker.submit(&decision);
    for agent in ["planner", "critic", "writer"] {
        let vote = Vote::new(decision.id, voter_id_from_agent(agent));
        leaf_engine.record_vote(&vote).unwrap();
        leaf_tracker.observe_vote(&vote).unwrap();
    }
    assert!(leaf_engine.is_accepted(&decision.id));
    assert_eq!(leaf_tracker.advance(&decision.id).unwrap(), Some(AgreementPhase::Hard));
    let mut cert = leaf_tracker.hard_certificate(&decision.id).unwrap();

    // Walk the path upward, anchoring each certificate in the next chain
    let path = net.get_finality_path(3);
    let mut child_chain = 3;
    for parent in path.iter().skip(1) {
        let engine = parent.build_engine().unwrap();
        let tracker = parent.build_tracker().unwrap();
        engine.start();

        let anchored = anchor_candidate(parent, child_chain, &cert, 1, Identifier::ZERO).unwrap();
        assert_eq!(decode_anchor(&anchored).unwrap().certificate, cert);

        engine.add(anchored.clone()).unwrap();
        tracker.submit(&anchored);
        engine
            .record_vote(&Vote::new(anchored.id, voter_id_from_agent("self")))
            .unwrap();
        assert!(engine.is_accepted(&anchored.id));
        assert_eq!(tracker.advance(&anchored.id).unwrap(), Some(AgreementPhase::Hard));

        cert = tracker.hard_certificate(&anchored.id).unwrap();
        child_chain = parent.chain_id();
    }
    assert_eq!(child_chain, 1);
}

/// Settlement chain that has posted a fixed set of batches.
#[derive(Default)]
struct PostedBatches(Mutex<HashSet<Identifier>>);

impl L1Verifier for PostedBatches {
    fn inclusion_proof(&self, candidate_id: &Identifier) -> Option<Vec<u8>> {
        let posted = self.0.lock().unwrap();
        posted.contains(candidate_id).then(|| candidate_id.as_bytes().to_vec())
    }

    fn verify_inclusion(&self, candidate_id: &Identifier, proof: &[u8]) -> bool {
        self.0.lock().unwrap().contains(candidate_id) && proof == candidate_id.as_bytes()
    }
}

#[test]
fn test_rollup_certificate_anchors_in_blockchain_root() {
    init();
    let l2 = L2Spec { chain_id: 10, domain: b"op".to_vec(), config: SequencerConfig::rollup("op") };
    let net = recursive_rollup_network(1, "eth", vec![l2]).unwrap();

    // L2: soft finality is immediate, hard finality waits for the batch to post
    let rollup = net.find_by_chain_id(10).unwrap();
    let l1 = Arc::new(PostedBatches::default());
    let rollup_tracker = rollup.build_tracker_with_l1(l1.clone()).unwrap();
    let batch = Candidate::new("op", "batch-1", 1);
    rollup_tracker.submit(&batch);
    assert_eq!(rollup_tracker.advance(&batch.id).unwrap(), Some(AgreementPhase::Soft));
    l1.0.lock().unwrap().insert(batch.id);
    assert_eq!(rollup_tracker.advance(&batch.id).unwrap(), Some(AgreementPhase::Hard));
    let cert = rollup_tracker.hard_certificate(&batch.id).unwrap();
    assert_eq!(cert.policy_id(), PolicyId::L1Inclusion);

    // Root: blockchain preset, sample convergence then hybrid signatures
    let root = net.root();
    let engine = root.build_engine().unwrap();
    let tracker = root.build_tracker().unwrap();
    engine.start();
    let anchored = anchor_candidate(root, 10, &cert, 1, Identifier::ZERO).unwrap();
    engine.add(anchored.clone()).unwrap();
    tracker.submit(&anchored);

    let validators: Vec<Identifier> =
        (0..20).map(|i| voter_id_from_agent(&format!("validator-{}", i))).collect();
    for round in 1..=10u64 {
        for voter in &validators {
            tracker
                .observe_vote(&Vote::new(anchored.id, *voter).with_round(round))
                .unwrap();
        }
    }
    assert_eq!(tracker.advance(&anchored.id).unwrap(), Some(AgreementPhase::Soft));

    for (i, voter) in validators.iter().enumerate().take(16) {
        let byte = i as u8;
        let vote = Vote::new(anchored.id, *voter)
            .with_round(11)
            .with_signature(vec![SignatureScheme::TAG_HYBRID, 0, 1, byte, !byte]);
        engine.record_vote(&vote).unwrap();
        tracker.observe_vote(&vote).unwrap();
    }
    assert!(engine.is_accepted(&anchored.id));
    assert_eq!(tracker.advance(&anchored.id).unwrap(), Some(AgreementPhase::Hard));
    let root_cert = tracker.hard_certificate(&anchored.id).unwrap();
    assert_eq!(root_cert.policy_id(), PolicyId::Quantum);
    assert!(tracker.hard_policy().verify(&root_cert));
    assert_eq!(decode_anchor(&anchored).unwrap().certificate, cert);
}

#[test]
fn test_refused_children_do_not_mutate() {
    let mut net = three_level_network();
    let before = net.clone();
    assert!(!net.add_child(77, native_sequencer(4, "x"), SequencerConfig::single_node("x")));
    assert!(!net.add_child(1, native_sequencer(3, "dup"), SequencerConfig::single_node("dup")));
    assert_eq!(net, before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // parents[i] picks the parent of chain i + 2 among chains already present
    #[test]
    fn prop_finality_paths_reach_root(parents in proptest::collection::vec(any::<prop::sample::Index>(), 1..24)) {
        let mut net = single_chain_network(1, "root", SequencerConfig::single_node("root")).unwrap();
        for (i, pick) in parents.iter().enumerate() {
            let existing = i + 1;
            let parent = pick.index(existing) as u64 + 1;
            let chain_id = i as u64 + 2;
            prop_assert!(net.add_child(parent, native_sequencer(chain_id, "c"), SequencerConfig::single_node("c")));
        }
        prop_assert_eq!(net.len(), parents.len() + 1);

        for node in net.traverse() {
            let path = chain_ids(&net, node.chain_id());
            prop_assert_eq!(path.len(), node.identity().depth as usize + 1);
            prop_assert_eq!(path.first().copied(), Some(node.chain_id()));
            prop_assert_eq!(path.last().copied(), Some(1));
        }
    }
}
