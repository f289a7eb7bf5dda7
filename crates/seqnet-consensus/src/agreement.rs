// TWO-PHASE AGREEMENT
// Per-candidate soft/hard finality bookkeeping and the driver pairing it
// with a soft and a hard finality policy
//
// SAFETY INVARIANTS:
// 1. Each phase is set at most once and never cleared or replaced
// 2. Hard finality does not structurally require soft finality
// 3. A certificate is only stored against the candidate it names
// 4. The state machine performs no threshold arithmetic

use crate::config::{ConfigError, SequencerConfig};
use crate::l1_policy::L1Verifier;
use crate::policy::{build_policy, FinalityPolicy, PolicyError, PolicyParams};
use log::info;
use parking_lot::RwLock;
use seqnet_core::{Candidate, Certificate, Identifier, Vote};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Finality phase. The integer values are wire enumerants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementPhase {
    Soft = 1,
    Hard = 2,
}

impl fmt::Display for AgreementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgreementPhase::Soft => write!(f, "SOFT"),
            AgreementPhase::Hard => write!(f, "HARD"),
        }
    }
}

/// Coarse progress of a candidate through the two phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinalityStatus {
    Pending,
    SoftFinal,
    HardFinal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgreementError {
    #[error("{phase} finality already reached for {candidate_id}")]
    AlreadyFinalized {
        candidate_id: Identifier,
        phase: AgreementPhase,
    },

    #[error("certificate names {got}, expected {expected}")]
    CandidateMismatch { expected: Identifier, got: Identifier },

    #[error("candidate {0} was never submitted")]
    CandidateNotFound(Identifier),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Soft and hard finality results for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreementState {
    candidate_id: Identifier,
    soft: Option<Certificate>,
    hard: Option<Certificate>,
}

impl AgreementState {
    pub fn new(candidate_id: Identifier) -> Self {
        AgreementState {
            candidate_id,
            soft: None,
            hard: None,
        }
    }

    pub fn candidate_id(&self) -> Identifier {
        self.candidate_id
    }

    pub fn soft_finalized(&self) -> bool {
        self.soft.is_some()
    }

    pub fn hard_finalized(&self) -> bool {
        self.hard.is_some()
    }

    pub fn soft_cert(&self) -> Option<&Certificate> {
        self.soft.as_ref()
    }

    pub fn hard_cert(&self) -> Option<&Certificate> {
        self.hard.as_ref()
    }

    pub fn status(&self) -> FinalityStatus {
        if self.hard.is_some() {
            FinalityStatus::HardFinal
        } else if self.soft.is_some() {
            FinalityStatus::SoftFinal
        } else {
            FinalityStatus::Pending
        }
    }

    /// Highest phase reached, if any.
    pub fn phase(&self) -> Option<AgreementPhase> {
        match self.status() {
            FinalityStatus::HardFinal => Some(AgreementPhase::Hard),
            FinalityStatus::SoftFinal => Some(AgreementPhase::Soft),
            FinalityStatus::Pending => None,
        }
    }

    fn check_cert(&self, cert: &Certificate) -> Result<(), AgreementError> {
        if cert.candidate_id() != self.candidate_id {
            return Err(AgreementError::CandidateMismatch {
                expected: self.candidate_id,
                got: cert.candidate_id(),
            });
        }
        Ok(())
    }

    /// Record soft finality. Fails if already soft-final.
    pub fn finalize_soft(&mut self, cert: Certificate) -> Result<(), AgreementError> {
        self.check_cert(&cert)?;
        if self.soft.is_some() {
            return Err(AgreementError::AlreadyFinalized {
                candidate_id: self.candidate_id,
                phase: AgreementPhase::Soft,
            });
        }
        self.soft = Some(cert);
        Ok(())
    }

    /// Record hard finality. Allowed straight from Pending.
    pub fn finalize_hard(&mut self, cert: Certificate) -> Result<(), AgreementError> {
        self.check_cert(&cert)?;
        if self.hard.is_some() {
            return Err(AgreementError::AlreadyFinalized {
                candidate_id: self.candidate_id,
                phase: AgreementPhase::Hard,
            });
        }
        self.hard = Some(cert);
        Ok(())
    }
}

/// Drives candidates through soft then hard finality using two policies.
pub struct AgreementTracker {
    soft: Arc<dyn FinalityPolicy>,
    hard: Arc<dyn FinalityPolicy>,
    states: RwLock<HashMap<Identifier, AgreementState>>,
}

impl AgreementTracker {
    pub fn new(soft: Arc<dyn FinalityPolicy>, hard: Arc<dyn FinalityPolicy>) -> Self {
        AgreementTracker {
            soft,
            hard,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Build both policies from a sequencer config (soft = ceil(beta_1*k),
    /// hard = ceil(beta_2*k)).
    ///
    /// Configs naming `L1_INCLUSION` need [`AgreementTracker::from_config_with_l1`].
    pub fn from_config(config: &SequencerConfig) -> Result<Self, TrackerBuildError> {
        Self::build(config, None)
    }

    /// Like `from_config`, with a settlement-chain verifier for `L1_INCLUSION`.
    pub fn from_config_with_l1(
        config: &SequencerConfig,
        verifier: Arc<dyn L1Verifier>,
    ) -> Result<Self, TrackerBuildError> {
        Self::build(config, Some(verifier))
    }

    fn build(
        config: &SequencerConfig,
        verifier: Option<Arc<dyn L1Verifier>>,
    ) -> Result<Self, TrackerBuildError> {
        config.validate()?;
        let mut soft = PolicyParams::for_phase(config, AgreementPhase::Soft);
        let mut hard = PolicyParams::for_phase(config, AgreementPhase::Hard);
        soft.l1_verifier = verifier.clone();
        hard.l1_verifier = verifier;
        let soft = build_policy(config.soft_policy, &soft)?;
        let hard = build_policy(config.hard_policy, &hard)?;
        Ok(Self::new(soft, hard))
    }

    pub fn soft_policy(&self) -> &Arc<dyn FinalityPolicy> {
        &self.soft
    }

    pub fn hard_policy(&self) -> &Arc<dyn FinalityPolicy> {
        &self.hard
    }

    /// Register a candidate with both policies. Idempotent.
    pub fn submit(&self, candidate: &Candidate) {
        self.soft.on_candidate(candidate);
        self.hard.on_candidate(candidate);
        self.states
            .write()
            .entry(candidate.id)
            .or_insert_with(|| AgreementState::new(candidate.id));
    }

    pub fn observe_vote(&self, vote: &Vote) -> Result<(), AgreementError> {
        if !self.states.read().contains_key(&vote.candidate_id) {
            return Err(AgreementError::CandidateNotFound(vote.candidate_id));
        }
        self.soft.on_vote(vote);
        self.hard.on_vote(vote);
        Ok(())
    }

    /// Try to move a candidate forward; returns the highest phase reached.
    ///
    /// Soft is attempted before hard and each is recorded at most once.
    pub fn advance(&self, candidate_id: &Identifier) -> Result<Option<AgreementPhase>, AgreementError> {
        let mut states = self.states.write();
        let state = states
            .get_mut(candidate_id)
            .ok_or(AgreementError::CandidateNotFound(*candidate_id))?;

        if !state.soft_finalized() {
            if let Some(cert) = self.soft.maybe_finalize(candidate_id) {
                state.finalize_soft(cert)?;
                info!("Candidate {} reached SOFT finality", candidate_id);
            }
        }
        if !state.hard_finalized() {
            if let Some(cert) = self.hard.maybe_finalize(candidate_id) {
                state.finalize_hard(cert)?;
                info!("Candidate {} reached HARD finality", candidate_id);
            }
        }
        Ok(state.phase())
    }

    /// Snapshot of a candidate's agreement state.
    pub fn state(&self, candidate_id: &Identifier) -> Option<AgreementState> {
        self.states.read().get(candidate_id).cloned()
    }

    pub fn hard_certificate(&self, candidate_id: &Identifier) -> Option<Certificate> {
        self.states
            .read()
            .get(candidate_id)
            .and_then(|s| s.hard_cert().cloned())
    }
}

/// Failure building a tracker from configuration.
#[derive(Debug, Error)]
pub enum TrackerBuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}
