// FINALITY POLICIES
// Pluggable rules that turn observed candidates and votes into certificates
//
// SAFETY INVARIANTS:
// 1. A policy issues at most one certificate per candidate; later calls to
//    maybe_finalize return the cached certificate unchanged
// 2. A policy never certifies a candidate it has not observed
// 3. QuorumPolicy counts each voter once (latest vote wins)

use crate::agreement::AgreementPhase;
use crate::config::SequencerConfig;
use crate::l1_policy::{L1Policy, L1Verifier};
use crate::quantum_policy::QuantumPolicy;
use crate::sample_policy::SamplePolicy;
use log::{debug, info};
use parking_lot::RwLock;
use seqnet_core::{Candidate, Certificate, Identifier, PolicyId, Vote};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Proof carried by self-certified (K=1) certificates.
pub const SELF_PROOF: &[u8] = b"self";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid threshold {0}: must be >= 1")]
    InvalidThreshold(usize),

    #[error("L1_INCLUSION finality needs an L1 verifier")]
    MissingL1Verifier,
}

/// Rule set deciding when a candidate is final in one phase.
pub trait FinalityPolicy: Send + Sync {
    fn policy_id(&self) -> PolicyId;

    /// Register a candidate. Re-registering is harmless.
    fn on_candidate(&self, candidate: &Candidate);

    fn on_vote(&self, vote: &Vote);

    /// Issue (or return the cached) certificate if the candidate is final.
    fn maybe_finalize(&self, candidate_id: &Identifier) -> Option<Certificate>;

    /// Structural check that a certificate could have come from this policy.
    fn verify(&self, cert: &Certificate) -> bool;
}

#[derive(Default)]
struct NoneState {
    heights: HashMap<Identifier, u64>,
    certs: HashMap<Identifier, Certificate>,
}

/// Immediate self-certified finality for every observed candidate.
#[derive(Default)]
pub struct NonePolicy {
    state: RwLock<NoneState>,
}

impl NonePolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FinalityPolicy for NonePolicy {
    fn policy_id(&self) -> PolicyId {
        PolicyId::None
    }

    fn on_candidate(&self, candidate: &Candidate) {
        self.state.write().heights.insert(candidate.id, candidate.height);
    }

    fn on_vote(&self, _vote: &Vote) {}

    fn maybe_finalize(&self, candidate_id: &Identifier) -> Option<Certificate> {
        let mut state = self.state.write();
        if let Some(cert) = state.certs.get(candidate_id) {
            return Some(cert.clone());
        }
        let height = *state.heights.get(candidate_id)?;
        let cert = Certificate::new(*candidate_id, height, PolicyId::None, SELF_PROOF.to_vec(), None);
        state.certs.insert(*candidate_id, cert.clone());
        Some(cert)
    }

    fn verify(&self, cert: &Certificate) -> bool {
        cert.policy_id() == PolicyId::None
    }
}

#[derive(Default)]
struct QuorumState {
    heights: HashMap<Identifier, u64>,
    // BTreeMap keeps voters ordered so proofs are deterministic
    votes: HashMap<Identifier, BTreeMap<Identifier, Vote>>,
    certs: HashMap<Identifier, Certificate>,
}

/// Threshold-of-committee finality.
///
/// A candidate finalizes once at least `threshold` distinct voters currently
/// prefer it. The proof is the concatenation of the accepting voters'
/// signatures and `signers` the concatenation of their IDs, both in voter-ID
/// order. Unsigned accepting votes count towards the threshold but contribute
/// nothing to the proof.
pub struct QuorumPolicy {
    threshold: usize,
    state: RwLock<QuorumState>,
}

impl QuorumPolicy {
    pub fn new(threshold: usize) -> Result<Self, PolicyError> {
        if threshold == 0 {
            return Err(PolicyError::InvalidThreshold(threshold));
        }
        Ok(QuorumPolicy {
            threshold,
            state: RwLock::new(QuorumState::default()),
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Distinct voters currently accepting `candidate_id`.
    pub fn accept_count(&self, candidate_id: &Identifier) -> usize {
        self.state
            .read()
            .votes
            .get(candidate_id)
            .map(|votes| votes.values().filter(|v| v.preference).count())
            .unwrap_or(0)
    }
}

impl FinalityPolicy for QuorumPolicy {
    fn policy_id(&self) -> PolicyId {
        PolicyId::Quorum
    }

    fn on_candidate(&self, candidate: &Candidate) {
        let mut state = self.state.write();
        state.heights.insert(candidate.id, candidate.height);
        state.votes.entry(candidate.id).or_default();
    }

    fn on_vote(&self, vote: &Vote) {
        self.state
            .write()
            .votes
            .entry(vote.candidate_id)
            .or_default()
            .insert(vote.voter_id, vote.clone());
    }

    fn maybe_finalize(&self, candidate_id: &Identifier) -> Option<Certificate> {
        let mut state = self.state.write();
        if let Some(cert) = state.certs.get(candidate_id) {
            return Some(cert.clone());
        }
        let height = *state.heights.get(candidate_id)?;
        let votes = state.votes.get(candidate_id)?;

        let accepting = votes.values().filter(|v| v.preference).count();
        if accepting < self.threshold {
            debug!(
                "Quorum not reached for {}: {}/{}",
                candidate_id, accepting, self.threshold
            );
            return None;
        }

        let mut proof = Vec::new();
        let mut signers = Vec::new();
        for (voter_id, vote) in votes.iter() {
            match &vote.signature {
                Some(sig) if vote.preference && !sig.is_empty() => {
                    proof.extend_from_slice(sig);
                    signers.extend_from_slice(voter_id.as_bytes());
                }
                _ => {}
            }
        }

        let cert = Certificate::new(*candidate_id, height, PolicyId::Quorum, proof, Some(signers));
        info!(
            "Quorum certificate issued for {} at height {} ({} accepting)",
            candidate_id, height, accepting
        );
        state.certs.insert(*candidate_id, cert.clone());
        Some(cert)
    }

    fn verify(&self, cert: &Certificate) -> bool {
        if cert.policy_id() != PolicyId::Quorum {
            return false;
        }
        let signer_bytes = cert.signers().map(<[u8]>::len).unwrap_or(0);
        !cert.proof().is_empty() && signer_bytes >= self.threshold.saturating_mul(32)
    }
}

/// Parameters a policy is built from.
///
/// `threshold` is the absolute count for the phase: voters for `QUORUM` and
/// `QUANTUM`, consecutive agreeing rounds for `SAMPLE_CONVERGENCE`.
#[derive(Clone)]
pub struct PolicyParams {
    pub k: usize,
    pub alpha: usize,
    pub threshold: usize,
    pub l1_verifier: Option<Arc<dyn L1Verifier>>,
}

impl PolicyParams {
    /// Committee of `threshold` voters that must all agree.
    pub fn with_threshold(threshold: usize) -> Self {
        PolicyParams {
            k: threshold,
            alpha: threshold,
            threshold,
            l1_verifier: None,
        }
    }

    /// Parameters for one agreement phase of a sequencer config.
    pub fn for_phase(config: &SequencerConfig, phase: AgreementPhase) -> Self {
        let threshold = match phase {
            AgreementPhase::Soft => config.soft_threshold(),
            AgreementPhase::Hard => config.hard_threshold(),
        };
        PolicyParams {
            k: config.k,
            alpha: config.alpha_count(),
            threshold,
            l1_verifier: None,
        }
    }

    pub fn with_l1_verifier(mut self, verifier: Arc<dyn L1Verifier>) -> Self {
        self.l1_verifier = Some(verifier);
        self
    }
}

/// Build the implementation of `policy_id`.
///
/// `L1_INCLUSION` needs `params.l1_verifier`; `NONE` ignores every parameter.
pub fn build_policy(
    policy_id: PolicyId,
    params: &PolicyParams,
) -> Result<Arc<dyn FinalityPolicy>, PolicyError> {
    match policy_id {
        PolicyId::None => Ok(Arc::new(NonePolicy::new())),
        PolicyId::Quorum => Ok(Arc::new(QuorumPolicy::new(params.threshold)?)),
        PolicyId::SampleConvergence => Ok(Arc::new(SamplePolicy::new(
            params.k,
            params.alpha,
            params.threshold,
        )?)),
        PolicyId::L1Inclusion => {
            let verifier = params
                .l1_verifier
                .clone()
                .ok_or(PolicyError::MissingL1Verifier)?;
            Ok(Arc::new(L1Policy::new(verifier)))
        }
        PolicyId::Quantum => Ok(Arc::new(QuantumPolicy::new(params.threshold)?)),
    }
}
