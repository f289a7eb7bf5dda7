// QUANTUM POLICY
// Hybrid finality requiring both a classical (BLS) and a post-quantum
// signature threshold over the same candidate
//
// SAFETY INVARIANTS:
// 1. Only accepting, signed votes are collected
// 2. Finality requires `threshold` BLS AND `threshold` post-quantum signers
// 3. The proof digest is computed over voters in ID order, so it is
//    independent of vote arrival order

use crate::policy::{FinalityPolicy, PolicyError};
use log::{debug, info};
use parking_lot::RwLock;
use seqnet_core::{Candidate, Certificate, Identifier, PolicyId, SignatureScheme, Vote};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Tag byte plus a SHA-256 digest.
pub const QUANTUM_PROOF_LEN: usize = 33;

#[derive(Default)]
struct SignatureBook {
    bls: BTreeMap<Identifier, Vec<u8>>,
    pq: BTreeMap<Identifier, Vec<u8>>,
}

#[derive(Default)]
struct QuantumBook {
    heights: HashMap<Identifier, u64>,
    sigs: HashMap<Identifier, SignatureBook>,
    certs: HashMap<Identifier, Certificate>,
}

/// Split a hybrid signature `[tag][bls_len u16 BE][bls][pq]` into its halves.
pub fn split_hybrid(signature: &[u8]) -> Option<(&[u8], &[u8])> {
    if signature.len() < 4 || signature[0] != SignatureScheme::TAG_HYBRID {
        return None;
    }
    let bls_len = usize::from(u16::from_be_bytes([signature[1], signature[2]]));
    let body = &signature[3..];
    if body.len() < bls_len {
        return None;
    }
    Some(body.split_at(bls_len))
}

pub struct QuantumPolicy {
    threshold: usize,
    book: RwLock<QuantumBook>,
}

impl QuantumPolicy {
    pub fn new(threshold: usize) -> Result<Self, PolicyError> {
        if threshold == 0 {
            return Err(PolicyError::InvalidThreshold(threshold));
        }
        Ok(QuantumPolicy {
            threshold,
            book: RwLock::new(QuantumBook::default()),
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// `(bls, post_quantum)` signer counts collected for a candidate.
    pub fn signer_counts(&self, candidate_id: &Identifier) -> (usize, usize) {
        self.book
            .read()
            .sigs
            .get(candidate_id)
            .map(|s| (s.bls.len(), s.pq.len()))
            .unwrap_or((0, 0))
    }
}

impl FinalityPolicy for QuantumPolicy {
    fn policy_id(&self) -> PolicyId {
        PolicyId::Quantum
    }

    fn on_candidate(&self, candidate: &Candidate) {
        let mut book = self.book.write();
        book.heights.insert(candidate.id, candidate.height);
        book.sigs.entry(candidate.id).or_default();
    }

    fn on_vote(&self, vote: &Vote) {
        let signature = match &vote.signature {
            Some(sig) if vote.preference && !sig.is_empty() => sig,
            _ => return,
        };
        let mut book = self.book.write();
        let entry = book.sigs.entry(vote.candidate_id).or_default();
        match vote.signature_scheme() {
            SignatureScheme::Bls => {
                entry.bls.insert(vote.voter_id, signature[1..].to_vec());
            }
            SignatureScheme::PostQuantum => {
                entry.pq.insert(vote.voter_id, signature[1..].to_vec());
            }
            SignatureScheme::Hybrid => match split_hybrid(signature) {
                Some((bls, pq)) => {
                    entry.bls.insert(vote.voter_id, bls.to_vec());
                    entry.pq.insert(vote.voter_id, pq.to_vec());
                }
                None => debug!("Malformed hybrid signature from {}", vote.voter_id),
            },
            _ => {}
        }
    }

    fn maybe_finalize(&self, candidate_id: &Identifier) -> Option<Certificate> {
        let mut book = self.book.write();
        if let Some(cert) = book.certs.get(candidate_id) {
            return Some(cert.clone());
        }
        let height = *book.heights.get(candidate_id)?;
        let sigs = book.sigs.get(candidate_id)?;
        if sigs.bls.len() < self.threshold || sigs.pq.len() < self.threshold {
            return None;
        }

        let mut hasher = Sha256::new();
        for sig in sigs.bls.values().chain(sigs.pq.values()) {
            hasher.update(sig);
        }
        let mut proof = Vec::with_capacity(QUANTUM_PROOF_LEN);
        proof.push(SignatureScheme::TAG_HYBRID);
        proof.extend_from_slice(&hasher.finalize());

        let signers: Vec<u8> = sigs.bls.keys().flat_map(|id| id.as_bytes().to_vec()).collect();
        let (bls, pq) = (sigs.bls.len(), sigs.pq.len());

        let cert = Certificate::new(*candidate_id, height, PolicyId::Quantum, proof, Some(signers));
        info!(
            "Quantum certificate issued for {} at height {} ({} BLS, {} PQ)",
            candidate_id, height, bls, pq
        );
        book.certs.insert(*candidate_id, cert.clone());
        Some(cert)
    }

    fn verify(&self, cert: &Certificate) -> bool {
        cert.policy_id() == PolicyId::Quantum
            && cert.proof().len() >= QUANTUM_PROOF_LEN
            && cert.proof()[0] == SignatureScheme::TAG_HYBRID
    }
}
