// ACCEPTANCE ENGINE TRAIT
// Unified interface for engines that turn a vote stream into decisions
//
// SAFETY: Every engine must follow this contract:
// 1. Queries about unknown candidates answer Unknown / false, never an error
// 2. A vote for an unknown candidate fails with CandidateNotFound and
//    leaves the engine unchanged
// 3. Accepted and Rejected are terminal
// 4. Engines are shared across threads (&self methods, Send + Sync)

use crate::config::ConfigError;
use seqnet_core::{Candidate, Identifier, ValidatorSet, Vote};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Per-candidate decision status. The integer values are wire enumerants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Unknown = 0,
    Processing = 1,
    Rejected = 2,
    Accepted = 3,
}

impl Status {
    pub fn is_decided(self) -> bool {
        matches!(self, Status::Accepted | Status::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Unknown => "UNKNOWN",
            Status::Processing => "PROCESSING",
            Status::Rejected => "REJECTED",
            Status::Accepted => "ACCEPTED",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// The vote or command names a candidate the engine never saw.
    #[error("candidate {0} not found")]
    CandidateNotFound(Identifier),

    #[error("engine not started")]
    NotStarted,

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Running counters exposed for operators and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub candidates_added: u64,
    pub votes_processed: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub polls_completed: u64,
}

/// Acceptance engine contract.
///
/// The reference implementation is [`crate::chain::Chain`]; production
/// deployments substitute their own engine behind this trait.
pub trait AcceptanceEngine: Send + Sync {
    /// Begin accepting input. Idempotent.
    fn start(&self);

    /// Stop accepting input. State is kept.
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Register a candidate at Processing. Re-adding is a no-op.
    fn add(&self, candidate: Candidate) -> Result<(), EngineError>;

    fn record_vote(&self, vote: &Vote) -> Result<(), EngineError>;

    /// Record many votes; returns how many were tallied.
    fn record_votes(&self, votes: &[Vote]) -> Result<usize, EngineError>;

    /// Mark a Processing candidate Rejected. Decided candidates are left alone.
    fn reject(&self, candidate_id: &Identifier) -> Result<Status, EngineError>;

    /// Complete one poll round; returns the number of candidates still Processing.
    fn poll(&self, validators: &ValidatorSet) -> Result<usize, EngineError>;

    fn is_accepted(&self, candidate_id: &Identifier) -> bool;

    fn status(&self, candidate_id: &Identifier) -> Status;

    /// Votes tallied for a candidate; None when unknown.
    fn tally(&self, candidate_id: &Identifier) -> Option<usize>;

    /// Last accepted (preferred) candidate.
    fn preference(&self) -> Identifier;

    /// Height of the last accepted candidate.
    fn height(&self) -> u64;

    fn stats(&self) -> EngineStats;
}
