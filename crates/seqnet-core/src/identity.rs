// IDENTITY DERIVATION
// Fixed-length identifiers derived from domain-tagged byte inputs
//
// INVARIANTS:
// 1. Every identifier is exactly 32 bytes (SHA-256 output)
// 2. Derivation is pure and deterministic across the whole deployment
// 3. IDs are only comparable within the same domain space

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length in bytes of every identifier.
pub const ID_LEN: usize = 32;

/// Domain for validator voter IDs. Voter IDs derived under this domain
/// equal the node IDs derived from the same public key.
pub const NODE_ID_DOMAIN: &str = "LuxNodeID/v1";

/// Domain for AI agent participants.
pub const AGENT_DOMAIN: &str = "agent";

/// A 32-byte content or participant identifier.
///
/// Equality is byte-exact, so identifiers are used directly as map keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identifier([u8; ID_LEN]);

impl Identifier {
    /// The all-zero identifier (genesis parent, genesis candidate).
    pub const ZERO: Identifier = Identifier([0u8; ID_LEN]);

    pub const fn new(bytes: [u8; ID_LEN]) -> Self {
        Identifier(bytes)
    }

    /// Build an identifier from a slice, returning `None` unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; ID_LEN] = bytes.try_into().ok()?;
        Some(Identifier(array))
    }

    /// Parse a lowercase or uppercase hex string of exactly 64 characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ID_LEN]
    }
}

impl From<[u8; ID_LEN]> for Identifier {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Identifier(bytes)
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable
        write!(f, "Identifier({}..)", &self.to_hex()[..12])
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Identifier::from_hex(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("expected {} hex-encoded bytes", ID_LEN))
        })
    }
}

fn sha256_concat(parts: &[&[u8]]) -> Identifier {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    Identifier(hasher.finalize().into())
}

/// Derive a voter ID: `H(domain || data)`.
///
/// Use [`NODE_ID_DOMAIN`] for validators and [`AGENT_DOMAIN`] for AI agents.
/// Do not invent new domains casually; IDs from different domains never collide
/// on purpose and cannot be compared.
pub fn derive_voter_id(domain: &str, data: &[u8]) -> Identifier {
    sha256_concat(&[domain.as_bytes(), data])
}

/// Voter ID of a validator, equal to its node ID.
pub fn voter_id_from_public_key(public_key: &[u8]) -> Identifier {
    derive_voter_id(NODE_ID_DOMAIN, public_key)
}

/// Voter ID of an AI agent identified by name.
pub fn voter_id_from_agent(agent_name: &str) -> Identifier {
    derive_voter_id(AGENT_DOMAIN, agent_name.as_bytes())
}

/// Derive an item ID from arbitrary data: `H(data)`.
pub fn derive_item_id(data: &[u8]) -> Identifier {
    sha256_concat(&[data])
}

/// Content-addressed candidate ID: `H(domain || payload)`.
pub fn compute_candidate_id(domain: &[u8], payload: &[u8]) -> Identifier {
    sha256_concat(&[domain, payload])
}
