// === Identity Derivation ===
pub mod identity;

// === Wire Types ===
pub mod codec;
pub mod policy;
pub mod candidate;
pub mod vote;
pub mod certificate;
pub mod validator;

// === Re-exports for broader ecosystem access ===
pub use identity::{
    compute_candidate_id, derive_item_id, derive_voter_id, voter_id_from_agent,
    voter_id_from_public_key, Identifier, AGENT_DOMAIN, ID_LEN, NODE_ID_DOMAIN,
};
pub use codec::{WireCodec, WireError};
pub use policy::{PolicyId, SignatureScheme};
pub use candidate::{Candidate, CandidateMeta};
pub use vote::Vote;
pub use certificate::Certificate;
pub use validator::{Validator, ValidatorSet};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
