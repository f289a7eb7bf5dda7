// RECURSIVE NETWORK
// Tree of sequencing domains; finality flows from leaves to the root
//
// SAFETY INVARIANTS:
// 1. Each node exclusively owns its children; parents are recorded only
//    as parent_chain_id on the child identity
// 2. add_child is the only mutation and rewrites the child's
//    parent_chain_id and depth from the parent it is attached to
// 3. chain_ids are unique across the tree, so finality paths cannot cycle
// 4. traverse() is a deterministic pre-order walk, children in insertion order

use crate::sequencer::{native_sequencer, recursive_sequencer, SequencerIdentity};
use crate::TopologyError;
use log::{info, warn};
use seqnet_consensus::{
    AgreementTracker, Chain, EngineError, L1Verifier, SequencerConfig, TrackerBuildError,
};
use seqnet_core::codec::as_object;
use seqnet_core::{WireCodec, WireError};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// One sequencing domain in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNode {
    identity: SequencerIdentity,
    config: SequencerConfig,
    children: Vec<NetworkNode>,
}

impl NetworkNode {
    pub fn new(identity: SequencerIdentity, config: SequencerConfig) -> Self {
        NetworkNode {
            identity,
            config,
            children: Vec::new(),
        }
    }

    pub fn identity(&self) -> &SequencerIdentity {
        &self.identity
    }

    pub fn chain_id(&self) -> u64 {
        self.identity.chain_id
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn children(&self) -> &[NetworkNode] {
        &self.children
    }

    /// Reference acceptance engine sized from this node's config.
    pub fn build_engine(&self) -> Result<Chain, EngineError> {
        Chain::from_sequencer(&self.config)
    }

    /// Two-phase tracker using this node's soft and hard policies.
    pub fn build_tracker(&self) -> Result<AgreementTracker, TrackerBuildError> {
        AgreementTracker::from_config(&self.config)
    }

    /// Tracker for nodes that settle on an external chain (`L1_INCLUSION`).
    pub fn build_tracker_with_l1(
        &self,
        verifier: Arc<dyn L1Verifier>,
    ) -> Result<AgreementTracker, TrackerBuildError> {
        AgreementTracker::from_config_with_l1(&self.config, verifier)
    }

    /// Depth-first search for `chain_id` in this subtree.
    pub fn find_by_chain_id(&self, chain_id: u64) -> Option<&NetworkNode> {
        if self.identity.chain_id == chain_id {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_by_chain_id(chain_id))
    }

    fn find_mut(&mut self, chain_id: u64) -> Option<&mut NetworkNode> {
        if self.identity.chain_id == chain_id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(chain_id))
    }

    /// Pre-order walk of this subtree.
    pub fn traverse(&self) -> Vec<&NetworkNode> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a NetworkNode>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

impl WireCodec for NetworkNode {
    fn to_wire(&self) -> Value {
        json!({
            "identity": self.identity.to_wire(),
            "config": self.config.to_wire(),
            "children": self.children.iter().map(NetworkNode::to_wire).collect::<Vec<_>>(),
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "node")?;
        let identity = SequencerIdentity::from_wire(
            obj.get("identity").ok_or(WireError::MissingField("identity"))?,
        )?;
        let config =
            SequencerConfig::from_wire(obj.get("config").ok_or(WireError::MissingField("config"))?)?;
        let children = match obj.get("children") {
            None | Some(Value::Null) => Vec::new(),
            Some(list) => list
                .as_array()
                .ok_or(WireError::InvalidField {
                    field: "children",
                    reason: "expected an array".to_string(),
                })?
                .iter()
                .map(NetworkNode::from_wire)
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(NetworkNode {
            identity,
            config,
            children,
        })
    }
}

/// Sole entry point for tree-wide queries and mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveNetwork {
    root: NetworkNode,
}

impl RecursiveNetwork {
    /// Wrap a root node. The root must be a valid root identity.
    pub fn new(identity: SequencerIdentity, config: SequencerConfig) -> Result<Self, TopologyError> {
        if !identity.is_root() {
            return Err(TopologyError::InvalidIdentity {
                chain_id: identity.chain_id,
                reason: "network root cannot have a parent".to_string(),
            });
        }
        identity.validate()?;
        config.validate()?;
        Ok(RecursiveNetwork {
            root: NetworkNode::new(identity, config),
        })
    }

    pub fn root(&self) -> &NetworkNode {
        &self.root
    }

    /// Attach a new child under `parent_chain_id`; false if the parent is
    /// missing or the child's chain_id is already in the tree.
    pub fn add_child(
        &mut self,
        parent_chain_id: u64,
        child_identity: SequencerIdentity,
        child_config: SequencerConfig,
    ) -> bool {
        match self.try_add_child(parent_chain_id, child_identity, child_config) {
            Ok(()) => true,
            Err(err) => {
                warn!("Child chain not attached: {}", err);
                false
            }
        }
    }

    /// `add_child` with the reason for refusal.
    pub fn try_add_child(
        &mut self,
        parent_chain_id: u64,
        mut child_identity: SequencerIdentity,
        child_config: SequencerConfig,
    ) -> Result<(), TopologyError> {
        let child_chain_id = child_identity.chain_id;
        if self.root.find_by_chain_id(child_chain_id).is_some() {
            return Err(TopologyError::DuplicateChain(child_chain_id));
        }
        child_config.validate()?;

        let parent = self
            .root
            .find_mut(parent_chain_id)
            .ok_or(TopologyError::ParentNotFound(parent_chain_id))?;
        child_identity.parent_chain_id = Some(parent_chain_id);
        child_identity.depth = parent.identity.depth.saturating_add(1);
        child_identity.validate()?;

        info!(
            "Attached chain {} ({}) under {} at depth {}",
            child_chain_id, child_identity.sequencer_type, parent_chain_id, child_identity.depth
        );
        parent.children.push(NetworkNode::new(child_identity, child_config));
        Ok(())
    }

    pub fn find_by_chain_id(&self, chain_id: u64) -> Option<&NetworkNode> {
        self.root.find_by_chain_id(chain_id)
    }

    /// Nodes from `chain_id` up to the root; empty if `chain_id` is unknown.
    pub fn get_finality_path(&self, chain_id: u64) -> Vec<&NetworkNode> {
        let mut path = Vec::new();
        let mut current = self.find_by_chain_id(chain_id);
        // Bounded by the tree size even if a decoded tree is inconsistent
        let limit = self.len();
        while let Some(node) = current {
            path.push(node);
            if path.len() > limit {
                break;
            }
            current = node
                .identity
                .parent_chain_id
                .and_then(|parent| self.find_by_chain_id(parent));
        }
        path
    }

    pub fn traverse(&self) -> Vec<&NetworkNode> {
        self.root.traverse()
    }

    pub fn get_all_chains(&self) -> Vec<&NetworkNode> {
        self.traverse()
    }

    /// Number of chains in the tree (always at least the root).
    pub fn len(&self) -> usize {
        self.traverse().len()
    }

    /// Always false: a network has at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn check_structure(&self) -> Result<(), TopologyError> {
        let mut seen = HashSet::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if !seen.insert(node.chain_id()) {
                return Err(TopologyError::DuplicateChain(node.chain_id()));
            }
            node.identity.validate()?;
            for child in &node.children {
                if child.identity.parent_chain_id != Some(node.chain_id())
                    || child.identity.depth != node.identity.depth.saturating_add(1)
                {
                    return Err(TopologyError::InvalidIdentity {
                        chain_id: child.chain_id(),
                        reason: format!("not linked to parent {}", node.chain_id()),
                    });
                }
                stack.push(child);
            }
        }
        if !self.root.identity.is_root() {
            return Err(TopologyError::InvalidIdentity {
                chain_id: self.root.chain_id(),
                reason: "network root cannot have a parent".to_string(),
            });
        }
        Ok(())
    }
}

impl WireCodec for RecursiveNetwork {
    fn to_wire(&self) -> Value {
        json!({ "root": self.root.to_wire() })
    }

    /// Decodes and checks the tree is well-formed (unique ids, consistent links).
    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "network")?;
        let root = NetworkNode::from_wire(obj.get("root").ok_or(WireError::MissingField("root"))?)?;
        let network = RecursiveNetwork { root };
        network
            .check_structure()
            .map_err(|e| WireError::InvalidField {
                field: "root",
                reason: e.to_string(),
            })?;
        Ok(network)
    }
}

/// An L2 attached by [`recursive_rollup_network`].
#[derive(Debug, Clone, PartialEq)]
pub struct L2Spec {
    pub chain_id: u64,
    pub domain: Vec<u8>,
    pub config: SequencerConfig,
}

/// One native chain, no children.
pub fn single_chain_network(
    chain_id: u64,
    domain: impl Into<Vec<u8>>,
    config: SequencerConfig,
) -> Result<RecursiveNetwork, TopologyError> {
    RecursiveNetwork::new(native_sequencer(chain_id, domain), config)
}

/// One native chain sequenced by an agent mesh of `agent_count` members.
pub fn ai_mesh_network(
    chain_id: u64,
    domain: impl Into<Vec<u8>>,
    agent_count: usize,
) -> Result<RecursiveNetwork, TopologyError> {
    let domain = domain.into();
    let config = SequencerConfig::agent_mesh(domain.clone(), agent_count);
    RecursiveNetwork::new(native_sequencer(chain_id, domain), config)
}

/// Blockchain-preset L1 root with each L2 anchored directly beneath it.
pub fn recursive_rollup_network(
    l1_chain_id: u64,
    l1_domain: impl Into<Vec<u8>>,
    l2s: Vec<L2Spec>,
) -> Result<RecursiveNetwork, TopologyError> {
    let l1_domain = l1_domain.into();
    let config = SequencerConfig::blockchain(l1_domain.clone());
    let mut network = RecursiveNetwork::new(native_sequencer(l1_chain_id, l1_domain), config)?;
    for l2 in l2s {
        network.try_add_child(
            l1_chain_id,
            recursive_sequencer(l2.chain_id, l2.domain, l1_chain_id, 1),
            l2.config,
        )?;
    }
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::external_sequencer;

    fn three_levels() -> RecursiveNetwork {
        let mut net = single_chain_network(1, "root", SequencerConfig::blockchain("root")).unwrap();
        assert!(net.add_child(1, native_sequencer(2, "mid"), SequencerConfig::rollup("mid")));
        assert!(net.add_child(2, native_sequencer(3, "leaf"), SequencerConfig::single_node("leaf")));
        net
    }

    fn ids(nodes: &[&NetworkNode]) -> Vec<u64> {
        nodes.iter().map(|n| n.chain_id()).collect()
    }

    #[test]
    fn test_add_child_rewrites_parent_and_depth() {
        let net = three_levels();
        let leaf = net.find_by_chain_id(3).unwrap();
        assert_eq!(leaf.identity().parent_chain_id, Some(2));
        assert_eq!(leaf.identity().depth, 2);
    }

    #[test]
    fn test_add_child_missing_parent() {
        let mut net = three_levels();
        let before = net.clone();
        assert!(!net.add_child(99, native_sequencer(4, "x"), SequencerConfig::single_node("x")));
        assert_eq!(net, before);
    }

    #[test]
    fn test_add_child_duplicate_chain_id() {
        let mut net = three_levels();
        let before = net.clone();
        assert!(matches!(
            net.try_add_child(3, native_sequencer(1, "again"), SequencerConfig::single_node("a")),
            Err(TopologyError::DuplicateChain(1))
        ));
        assert_eq!(net, before);
    }

    #[test]
    fn test_external_child_keeps_rpc() {
        let mut net = three_levels();
        assert!(net.add_child(1, external_sequencer(10, "op", "https://op"), SequencerConfig::rollup("op")));
        let node = net.find_by_chain_id(10).unwrap();
        assert_eq!(node.identity().external_rpc.as_deref(), Some("https://op"));
        assert_eq!(node.identity().depth, 1);
    }

    #[test]
    fn test_external_child_without_rpc() {
        let mut net = single_chain_network(1, "eth", SequencerConfig::blockchain("eth")).unwrap();
        assert!(net.add_child(1, external_sequencer(10, "op", ""), SequencerConfig::rollup("op")));
        let node = net.find_by_chain_id(10).unwrap();
        assert_eq!(node.identity().external_rpc.as_deref(), Some(""));
        assert_eq!(ids(&net.get_finality_path(10)), vec![10, 1]);
    }

    #[test]
    fn test_traverse_is_preorder_in_insertion_order() {
        let mut net = three_levels();
        assert!(net.add_child(1, native_sequencer(4, "b"), SequencerConfig::single_node("b")));
        assert!(net.add_child(2, native_sequencer(5, "c"), SequencerConfig::single_node("c")));
        assert_eq!(ids(&net.traverse()), vec![1, 2, 3, 5, 4]);
        assert_eq!(net.len(), 5);
        assert_eq!(ids(&net.get_all_chains()), ids(&net.traverse()));
    }

    #[test]
    fn test_finality_path_unknown_chain_is_empty() {
        let net = three_levels();
        assert!(net.get_finality_path(42).is_empty());
        assert!(net.find_by_chain_id(42).is_none());
    }

    #[test]
    fn test_root_with_parent_rejected() {
        let err = RecursiveNetwork::new(
            recursive_sequencer(2, "l2", 1, 1),
            SequencerConfig::rollup("l2"),
        )
        .unwrap_err();
        assert!(matches!(err, TopologyError::InvalidIdentity { chain_id: 2, .. }));
    }

    #[test]
    fn test_network_roundtrip() {
        let net = three_levels();
        assert_eq!(RecursiveNetwork::from_json(&net.to_json()).unwrap(), net);
    }

    #[test]
    fn test_decode_rejects_duplicate_ids() {
        let net = three_levels();
        let mut value = net.to_wire();
        value["root"]["children"][0]["children"][0]["identity"]["chain_id"] = json!(1);
        assert!(matches!(
            RecursiveNetwork::from_wire(&value),
            Err(WireError::InvalidField { field: "root", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_broken_links() {
        let net = three_levels();
        let mut value = net.to_wire();
        value["root"]["children"][0]["identity"]["depth"] = json!(5);
        assert!(RecursiveNetwork::from_wire(&value).is_err());
    }

    #[test]
    fn test_node_builds_engine_from_config() {
        let net = ai_mesh_network(7, "ai", 5).unwrap();
        let engine = net.root().build_engine().unwrap();
        assert_eq!(engine.config().alpha, 3);
    }

    #[test]
    fn test_rollup_factory() {
        let net = recursive_rollup_network(
            1,
            "eth",
            vec![
                L2Spec { chain_id: 10, domain: b"op".to_vec(), config: SequencerConfig::rollup("op") },
                L2Spec { chain_id: 42161, domain: b"arb".to_vec(), config: SequencerConfig::rollup("arb") },
            ],
        )
        .unwrap();
        assert_eq!(ids(&net.traverse()), vec![1, 10, 42161]);
        assert_eq!(net.root().config(), &SequencerConfig::blockchain("eth"));
        assert_eq!(ids(&net.get_finality_path(42161)), vec![42161, 1]);
    }

    struct Settled;

    impl L1Verifier for Settled {
        fn inclusion_proof(&self, candidate_id: &seqnet_core::Identifier) -> Option<Vec<u8>> {
            Some(candidate_id.as_bytes().to_vec())
        }

        fn verify_inclusion(&self, candidate_id: &seqnet_core::Identifier, proof: &[u8]) -> bool {
            proof == candidate_id.as_bytes()
        }
    }

    #[test]
    fn test_rollup_factory_nodes_build_trackers() {
        let l2 = L2Spec { chain_id: 10, domain: b"op".to_vec(), config: SequencerConfig::rollup("op") };
        let net = recursive_rollup_network(1, "eth", vec![l2]).unwrap();
        assert!(net.root().build_tracker().is_ok());

        let node = net.find_by_chain_id(10).unwrap();
        assert!(matches!(
            node.build_tracker(),
            Err(TrackerBuildError::Policy(seqnet_consensus::PolicyError::MissingL1Verifier))
        ));
        let tracker = node.build_tracker_with_l1(Arc::new(Settled)).unwrap();
        let batch = seqnet_core::Candidate::new("op", "batch", 1);
        tracker.submit(&batch);
        assert!(tracker.advance(&batch.id).unwrap().is_some());
        assert!(tracker.hard_certificate(&batch.id).is_some());
    }

    #[test]
    fn test_rollup_factory_duplicate_l2() {
        let l2 = L2Spec { chain_id: 10, domain: b"op".to_vec(), config: SequencerConfig::rollup("op") };
        assert!(matches!(
            recursive_rollup_network(1, "eth", vec![l2.clone(), l2]),
            Err(TopologyError::DuplicateChain(10))
        ));
    }
}
