// FINALITY POLICY & SIGNATURE SCHEME TAGS
// Closed enumerations carried on the wire as integers

use crate::codec::WireError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies how a certificate's finality was achieved.
///
/// The integer values are part of the wire format and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyId {
    /// K=1 self-sequencing
    None = 0,
    /// Threshold signature over a small committee (3/5, 2/3)
    Quorum = 1,
    /// Metastable repeated sampling for large validator sets
    SampleConvergence = 2,
    /// Inclusion in an external chain (rollup anchoring)
    L1Inclusion = 3,
    /// BLS aggregate plus post-quantum threshold signature
    Quantum = 4,
}

impl PolicyId {
    pub const ALL: [PolicyId; 5] = [
        PolicyId::None,
        PolicyId::Quorum,
        PolicyId::SampleConvergence,
        PolicyId::L1Inclusion,
        PolicyId::Quantum,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyId::None => "NONE",
            PolicyId::Quorum => "QUORUM",
            PolicyId::SampleConvergence => "SAMPLE_CONVERGENCE",
            PolicyId::L1Inclusion => "L1_INCLUSION",
            PolicyId::Quantum => "QUANTUM",
        }
    }
}

impl TryFrom<u64> for PolicyId {
    type Error = WireError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        PolicyId::ALL
            .iter()
            .copied()
            .find(|p| p.as_u8() as u64 == value)
            .ok_or(WireError::UnknownPolicyEnumerant(value))
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Signature scheme, selected by the first byte of a vote signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    /// No signature (absent or empty)
    None,
    Ed25519,
    Bls,
    /// Post-quantum lattice threshold scheme
    PostQuantum,
    /// Classical + post-quantum combined
    Hybrid,
    /// Tag byte outside the known range; never verifiable
    Unknown(u8),
}

impl SignatureScheme {
    pub const TAG_NONE: u8 = 0x00;
    pub const TAG_ED25519: u8 = 0x01;
    pub const TAG_BLS: u8 = 0x02;
    pub const TAG_POST_QUANTUM: u8 = 0x03;
    pub const TAG_HYBRID: u8 = 0x04;

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            Self::TAG_NONE => SignatureScheme::None,
            Self::TAG_ED25519 => SignatureScheme::Ed25519,
            Self::TAG_BLS => SignatureScheme::Bls,
            Self::TAG_POST_QUANTUM => SignatureScheme::PostQuantum,
            Self::TAG_HYBRID => SignatureScheme::Hybrid,
            other => SignatureScheme::Unknown(other),
        }
    }

    /// Route a raw signature by its leading tag byte.
    pub fn of_signature(signature: Option<&[u8]>) -> Self {
        match signature.and_then(|s| s.first()) {
            Some(tag) => Self::from_tag(*tag),
            None => SignatureScheme::None,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            SignatureScheme::None => Self::TAG_NONE,
            SignatureScheme::Ed25519 => Self::TAG_ED25519,
            SignatureScheme::Bls => Self::TAG_BLS,
            SignatureScheme::PostQuantum => Self::TAG_POST_QUANTUM,
            SignatureScheme::Hybrid => Self::TAG_HYBRID,
            SignatureScheme::Unknown(tag) => *tag,
        }
    }
}
