// === Sequencer Identity ===
pub mod sequencer;

// === Recursive Topology ===
pub mod network;
pub mod anchor;

use seqnet_consensus::ConfigError;
use thiserror::Error;

/// Topology construction and mutation failures.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("invalid sequencer identity for chain {chain_id}: {reason}")]
    InvalidIdentity { chain_id: u64, reason: String },

    #[error("chain {0} already exists in the network")]
    DuplicateChain(u64),

    #[error("parent chain {0} not found")]
    ParentNotFound(u64),

    #[error("chain {child} is not a direct child of chain {parent}")]
    NotAChild { parent: u64, child: u64 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// === Re-exports for broader ecosystem access ===
pub use sequencer::{
    external_sequencer, native_sequencer, recursive_sequencer, SequencerIdentity, SequencerType,
};
pub use network::{
    ai_mesh_network, recursive_rollup_network, single_chain_network, L2Spec, NetworkNode,
    RecursiveNetwork,
};
pub use anchor::{anchor_candidate, decode_anchor, Anchor};
