// SAMPLE CONVERGENCE POLICY
// Metastable finality for large validator sets: a candidate is final once
// `beta` consecutive sampled rounds agree on accepting it
//
// SAFETY INVARIANTS:
// 1. A round is evaluated exactly once, when its k-th distinct voter arrives
// 2. Confidence only grows while consecutive rounds agree; a flip resets it to 1
// 3. Only an accepting preference is ever certified

use crate::policy::{FinalityPolicy, PolicyError};
use log::{debug, info};
use parking_lot::RwLock;
use seqnet_core::{Candidate, Certificate, Identifier, PolicyId, Vote};
use std::collections::{BTreeSet, HashMap};

/// Length of a sample proof: confidence byte followed by the round (big-endian).
pub const SAMPLE_PROOF_LEN: usize = 9;

struct SampleState {
    height: u64,
    preference: bool,
    confidence: usize,
    current_round: u64,
    round_votes: HashMap<u64, HashMap<Identifier, bool>>,
    evaluated: BTreeSet<u64>,
}

impl SampleState {
    fn new(height: u64) -> Self {
        SampleState {
            height,
            preference: true,
            confidence: 0,
            current_round: 0,
            round_votes: HashMap::new(),
            evaluated: BTreeSet::new(),
        }
    }
}

#[derive(Default)]
struct SampleBook {
    candidates: HashMap<Identifier, SampleState>,
    certs: HashMap<Identifier, Certificate>,
}

/// Sample convergence over rounds of `k` voters.
///
/// A completed round prefers acceptance when at least `alpha` of its voters
/// accept. The candidate is final after `beta` consecutive completed rounds
/// prefer acceptance.
pub struct SamplePolicy {
    k: usize,
    alpha: usize,
    beta: usize,
    book: RwLock<SampleBook>,
}

impl SamplePolicy {
    pub fn new(k: usize, alpha: usize, beta: usize) -> Result<Self, PolicyError> {
        for value in [k, alpha, beta] {
            if value == 0 {
                return Err(PolicyError::InvalidThreshold(value));
            }
        }
        Ok(SamplePolicy {
            k,
            alpha,
            beta,
            book: RwLock::new(SampleBook::default()),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn alpha(&self) -> usize {
        self.alpha
    }

    pub fn beta(&self) -> usize {
        self.beta
    }

    /// Current `(preference, confidence)` for an observed candidate.
    pub fn confidence(&self, candidate_id: &Identifier) -> Option<(bool, usize)> {
        self.book
            .read()
            .candidates
            .get(candidate_id)
            .map(|s| (s.preference, s.confidence))
    }
}

impl FinalityPolicy for SamplePolicy {
    fn policy_id(&self) -> PolicyId {
        PolicyId::SampleConvergence
    }

    fn on_candidate(&self, candidate: &Candidate) {
        self.book
            .write()
            .candidates
            .entry(candidate.id)
            .or_insert_with(|| SampleState::new(candidate.height));
    }

    fn on_vote(&self, vote: &Vote) {
        let mut book = self.book.write();
        let Some(state) = book.candidates.get_mut(&vote.candidate_id) else {
            return;
        };
        if state.evaluated.contains(&vote.round) {
            return;
        }

        let round = state.round_votes.entry(vote.round).or_default();
        round.insert(vote.voter_id, vote.preference);
        if round.len() < self.k {
            return;
        }

        let yes = round.values().filter(|p| **p).count();
        let round_pref = yes >= self.alpha;
        if round_pref == state.preference {
            state.confidence += 1;
        } else {
            state.preference = round_pref;
            state.confidence = 1;
        }
        state.current_round = vote.round;
        state.evaluated.insert(vote.round);
        state.round_votes.remove(&vote.round);
        debug!(
            "Sample round {} for {}: {}/{} accept, confidence {}",
            vote.round, vote.candidate_id, yes, self.k, state.confidence
        );
    }

    fn maybe_finalize(&self, candidate_id: &Identifier) -> Option<Certificate> {
        let mut book = self.book.write();
        if let Some(cert) = book.certs.get(candidate_id) {
            return Some(cert.clone());
        }
        let state = book.candidates.get(candidate_id)?;
        if state.confidence < self.beta || !state.preference {
            return None;
        }

        let mut proof = Vec::with_capacity(SAMPLE_PROOF_LEN);
        proof.push(u8::try_from(state.confidence).unwrap_or(u8::MAX));
        proof.extend_from_slice(&state.current_round.to_be_bytes());

        let cert = Certificate::new(
            *candidate_id,
            state.height,
            PolicyId::SampleConvergence,
            proof,
            None,
        );
        info!(
            "Sample certificate issued for {} after {} agreeing rounds",
            candidate_id, state.confidence
        );
        book.certs.insert(*candidate_id, cert.clone());
        Some(cert)
    }

    fn verify(&self, cert: &Certificate) -> bool {
        cert.policy_id() == PolicyId::SampleConvergence
            && cert.proof().len() >= SAMPLE_PROOF_LEN
            && usize::from(cert.proof()[0]) >= self.beta.min(usize::from(u8::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqnet_core::voter_id_from_agent;

    fn round(policy: &SamplePolicy, c: &Candidate, round: u64, accepts: usize) {
        for i in 0..policy.k() {
            let vote = Vote::new(c.id, voter_id_from_agent(&format!("v{}", i)))
                .with_round(round)
                .with_preference(i < accepts);
            policy.on_vote(&vote);
        }
    }

    #[test]
    fn test_sample_finalizes_after_beta_rounds() {
        let policy = SamplePolicy::new(4, 3, 2).unwrap();
        let c = Candidate::new("main", "block", 7);
        policy.on_candidate(&c);

        round(&policy, &c, 1, 3);
        assert_eq!(policy.confidence(&c.id), Some((true, 1)));
        assert!(policy.maybe_finalize(&c.id).is_none());

        round(&policy, &c, 2, 4);
        let cert = policy.maybe_finalize(&c.id).unwrap();
        assert_eq!(cert.height(), 7);
        assert_eq!(cert.proof().len(), SAMPLE_PROOF_LEN);
        assert_eq!(cert.proof()[0], 2);
        assert_eq!(&cert.proof()[1..], &2u64.to_be_bytes());
        assert!(policy.verify(&cert));
        assert_eq!(policy.maybe_finalize(&c.id).unwrap(), cert);
    }

    #[test]
    fn test_sample_flip_resets_confidence() {
        let policy = SamplePolicy::new(3, 2, 2).unwrap();
        let c = Candidate::new("main", "block", 1);
        policy.on_candidate(&c);

        round(&policy, &c, 1, 3);
        round(&policy, &c, 2, 1);
        assert_eq!(policy.confidence(&c.id), Some((false, 1)));
        round(&policy, &c, 3, 0);
        // Converged on rejection: never certified
        assert_eq!(policy.confidence(&c.id), Some((false, 2)));
        assert!(policy.maybe_finalize(&c.id).is_none());

        round(&policy, &c, 4, 3);
        assert_eq!(policy.confidence(&c.id), Some((true, 1)));
        assert!(policy.maybe_finalize(&c.id).is_none());
    }

    #[test]
    fn test_sample_round_counted_once() {
        let policy = SamplePolicy::new(2, 2, 2).unwrap();
        let c = Candidate::new("main", "block", 1);
        policy.on_candidate(&c);
        round(&policy, &c, 1, 2);
        // Late and repeated votes for a finished round change nothing
        round(&policy, &c, 1, 2);
        policy.on_vote(&Vote::new(c.id, voter_id_from_agent("late")).with_round(1));
        assert_eq!(policy.confidence(&c.id), Some((true, 1)));
        assert!(policy.maybe_finalize(&c.id).is_none());
    }

    #[test]
    fn test_sample_ignores_unknown_candidates() {
        let policy = SamplePolicy::new(1, 1, 1).unwrap();
        let c = Candidate::new("main", "block", 1);
        policy.on_vote(&Vote::new(c.id, voter_id_from_agent("a")));
        assert!(policy.confidence(&c.id).is_none());
        assert!(policy.maybe_finalize(&c.id).is_none());
    }

    #[test]
    fn test_sample_verify_checks_confidence() {
        let policy = SamplePolicy::new(4, 3, 3).unwrap();
        let weak = Certificate::new(Identifier::ZERO, 0, PolicyId::SampleConvergence, vec![2; 9], None);
        let short = Certificate::new(Identifier::ZERO, 0, PolicyId::SampleConvergence, vec![9; 4], None);
        let foreign = Certificate::new(Identifier::ZERO, 0, PolicyId::Quorum, vec![9; 9], None);
        assert!(!policy.verify(&weak));
        assert!(!policy.verify(&short));
        assert!(!policy.verify(&foreign));
        assert!(SamplePolicy::new(0, 1, 1).is_err());
    }
}
