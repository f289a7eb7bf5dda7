// SIGNATURE ROUTING
// Dispatches vote signatures to scheme-specific verifiers by tag byte
//
// Cryptography itself lives in the registered verifiers; this module only
// reads the scheme tag and picks one.

use log::warn;
use seqnet_core::{Identifier, SignatureScheme, Vote};
use std::collections::HashMap;
use std::sync::Arc;

/// Checks a scheme-tagged signature over a message for a voter.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, voter_id: &Identifier, message: &[u8], signature: &[u8]) -> bool;
}

impl<F> SignatureVerifier for F
where
    F: Fn(&Identifier, &[u8], &[u8]) -> bool + Send + Sync,
{
    fn verify(&self, voter_id: &Identifier, message: &[u8], signature: &[u8]) -> bool {
        self(voter_id, message, signature)
    }
}

/// Scheme tag -> verifier table.
#[derive(Default, Clone)]
pub struct VerifierRegistry {
    verifiers: HashMap<u8, Arc<dyn SignatureVerifier>>,
    allow_unsigned: bool,
}

impl VerifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept unsigned (NONE-tagged) votes, as in K=1 deployments.
    pub fn allow_unsigned(mut self, allow: bool) -> Self {
        self.allow_unsigned = allow;
        self
    }

    /// Register a verifier, replacing any previous one for the scheme.
    pub fn register(&mut self, scheme: SignatureScheme, verifier: Arc<dyn SignatureVerifier>) {
        self.verifiers.insert(scheme.tag(), verifier);
    }

    pub fn supports(&self, scheme: SignatureScheme) -> bool {
        match scheme {
            SignatureScheme::None => self.allow_unsigned,
            other => self.verifiers.contains_key(&other.tag()),
        }
    }

    /// Verify a vote's signature over its signing message.
    pub fn verify_vote(&self, vote: &Vote) -> bool {
        let scheme = vote.signature_scheme();
        let signature = match (&vote.signature, scheme) {
            (_, SignatureScheme::None) => return self.allow_unsigned,
            (Some(sig), _) => sig.as_slice(),
            (None, _) => return false,
        };
        match self.verifiers.get(&scheme.tag()) {
            Some(verifier) => verifier.verify(&vote.voter_id, &vote.signing_message(), signature),
            None => {
                warn!(
                    "No verifier for signature scheme {:?} (voter {})",
                    scheme, vote.voter_id
                );
                false
            }
        }
    }
}
