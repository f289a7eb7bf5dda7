// L1 INCLUSION POLICY
// Finality delegated to an external settlement chain
//
// SAFETY INVARIANTS:
// 1. Votes never influence L1 finality
// 2. A certificate's proof is exactly the inclusion proof the verifier returned

use crate::policy::FinalityPolicy;
use log::info;
use parking_lot::RwLock;
use seqnet_core::{Candidate, Certificate, Identifier, PolicyId, Vote};
use std::collections::HashMap;
use std::sync::Arc;

/// Settlement-chain client that knows whether a candidate was included.
pub trait L1Verifier: Send + Sync {
    /// Inclusion proof for the candidate, or `None` while it is not yet included.
    fn inclusion_proof(&self, candidate_id: &Identifier) -> Option<Vec<u8>>;

    fn verify_inclusion(&self, candidate_id: &Identifier, proof: &[u8]) -> bool;
}

#[derive(Default)]
struct L1Book {
    heights: HashMap<Identifier, u64>,
    certs: HashMap<Identifier, Certificate>,
}

pub struct L1Policy {
    verifier: Arc<dyn L1Verifier>,
    book: RwLock<L1Book>,
}

impl L1Policy {
    pub fn new(verifier: Arc<dyn L1Verifier>) -> Self {
        L1Policy {
            verifier,
            book: RwLock::new(L1Book::default()),
        }
    }
}

impl FinalityPolicy for L1Policy {
    fn policy_id(&self) -> PolicyId {
        PolicyId::L1Inclusion
    }

    fn on_candidate(&self, candidate: &Candidate) {
        self.book.write().heights.insert(candidate.id, candidate.height);
    }

    fn on_vote(&self, _vote: &Vote) {}

    fn maybe_finalize(&self, candidate_id: &Identifier) -> Option<Certificate> {
        let mut book = self.book.write();
        if let Some(cert) = book.certs.get(candidate_id) {
            return Some(cert.clone());
        }
        let height = *book.heights.get(candidate_id)?;
        let proof = self.verifier.inclusion_proof(candidate_id)?;

        let cert = Certificate::new(*candidate_id, height, PolicyId::L1Inclusion, proof, None);
        info!("L1 inclusion certificate issued for {} at height {}", candidate_id, height);
        book.certs.insert(*candidate_id, cert.clone());
        Some(cert)
    }

    fn verify(&self, cert: &Certificate) -> bool {
        cert.policy_id() == PolicyId::L1Inclusion
            && self.verifier.verify_inclusion(&cert.candidate_id(), cert.proof())
    }
}
