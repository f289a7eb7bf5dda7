// SEQNET
// Facade over the workspace crates: wire types, agreement and topology

pub use seqnet_consensus;
pub use seqnet_core;
pub use seqnet_topology;

pub use seqnet_consensus::{
    load_sequencer_config, AcceptanceEngine, AgreementPhase, AgreementTracker, Chain,
    EngineConfig, EngineError, L1Verifier, SequencerConfig, Status,
};
pub use seqnet_core::{Candidate, Certificate, Identifier, PolicyId, Vote, WireCodec, WireError};
pub use seqnet_topology::{NetworkNode, RecursiveNetwork, SequencerIdentity, TopologyError};

/// Install the `env_logger` backend (honours `RUST_LOG`, default `info`).
///
/// Safe to call more than once; only the first call installs a logger.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    log::debug!("Logging initialised");
}
