// === Configuration ===
pub mod config;
pub mod settings;

// === Two-Phase Agreement ===
pub mod policy;
pub mod sample_policy;
pub mod l1_policy;
pub mod quantum_policy;
pub mod agreement;

// === Acceptance Engine ===
pub mod engine;
pub mod chain;
pub mod scoring;

// === Signature Routing ===
pub mod verifier;

// === Re-exports for broader ecosystem access ===
pub use config::{threshold_count, ConfigError, EngineConfig, SequencerConfig, DEFAULT_MESH_K};
pub use settings::{load_sequencer_config, parse_sequencer_config, ENV_PREFIX};
pub use policy::{
    build_policy, FinalityPolicy, NonePolicy, PolicyError, PolicyParams, QuorumPolicy, SELF_PROOF,
};
pub use sample_policy::{SamplePolicy, SAMPLE_PROOF_LEN};
pub use l1_policy::{L1Policy, L1Verifier};
pub use quantum_policy::{split_hybrid, QuantumPolicy, QUANTUM_PROOF_LEN};
pub use agreement::{
    AgreementError, AgreementPhase, AgreementState, AgreementTracker, FinalityStatus,
    TrackerBuildError,
};
pub use engine::{AcceptanceEngine, EngineError, EngineStats, Status};
pub use chain::Chain;
pub use scoring::{BatchScorer, PreferenceScorer, ScoreInput};
pub use verifier::{SignatureVerifier, VerifierRegistry};

pub use ::config::FileFormat;
