// SEQUENCER IDENTITY
// Who sequences a chain and where it sits in the recursive hierarchy
//
// INVARIANTS:
// 1. depth == 0 exactly when parent_chain_id is absent (roots)
// 2. RECURSIVE sequencers always have a parent
// 3. EXTERNAL sequencers may carry the RPC endpoint they are reached through
// 4. A chain is never its own parent

use crate::TopologyError;
use seqnet_core::codec::{
    as_object, hex_field, opt_string_field, opt_u64_field, u64_field, u64_or,
};
use seqnet_core::{WireCodec, WireError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequencerType {
    /// Participates in this protocol directly
    Native = 0,
    /// Third-party sequencer reached over RPC
    External = 1,
    /// Chain whose finality is anchored in a parent chain
    Recursive = 2,
}

impl SequencerType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u64> for SequencerType {
    type Error = WireError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SequencerType::Native),
            1 => Ok(SequencerType::External),
            2 => Ok(SequencerType::Recursive),
            other => Err(WireError::UnknownSequencerType(other)),
        }
    }
}

impl fmt::Display for SequencerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerType::Native => write!(f, "NATIVE"),
            SequencerType::External => write!(f, "EXTERNAL"),
            SequencerType::Recursive => write!(f, "RECURSIVE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerIdentity {
    pub sequencer_type: SequencerType,
    pub chain_id: u64,
    pub domain: Vec<u8>,
    pub parent_chain_id: Option<u64>,
    pub external_rpc: Option<String>,
    /// Distance from the root (0 for roots)
    pub depth: u32,
}

impl SequencerIdentity {
    pub fn is_root(&self) -> bool {
        self.parent_chain_id.is_none()
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        let invalid = |reason: &str| TopologyError::InvalidIdentity {
            chain_id: self.chain_id,
            reason: reason.to_string(),
        };

        if self.parent_chain_id.is_some() != (self.depth > 0) {
            return Err(invalid("parent_chain_id must be set exactly when depth > 0"));
        }
        if self.parent_chain_id == Some(self.chain_id) {
            return Err(invalid("a chain cannot be its own parent"));
        }
        if self.sequencer_type == SequencerType::Recursive && self.parent_chain_id.is_none() {
            return Err(invalid("recursive sequencers require a parent chain"));
        }
        Ok(())
    }
}

/// Root-level sequencer speaking this protocol natively.
pub fn native_sequencer(chain_id: u64, domain: impl Into<Vec<u8>>) -> SequencerIdentity {
    SequencerIdentity {
        sequencer_type: SequencerType::Native,
        chain_id,
        domain: domain.into(),
        parent_chain_id: None,
        external_rpc: None,
        depth: 0,
    }
}

/// Sequencer run by a third party (e.g. an OP Stack or Arbitrum sequencer).
pub fn external_sequencer(
    chain_id: u64,
    domain: impl Into<Vec<u8>>,
    rpc: impl Into<String>,
) -> SequencerIdentity {
    SequencerIdentity {
        sequencer_type: SequencerType::External,
        chain_id,
        domain: domain.into(),
        parent_chain_id: None,
        external_rpc: Some(rpc.into()),
        depth: 0,
    }
}

/// Chain anchored in `parent_chain_id` at `depth`.
pub fn recursive_sequencer(
    chain_id: u64,
    domain: impl Into<Vec<u8>>,
    parent_chain_id: u64,
    depth: u32,
) -> SequencerIdentity {
    SequencerIdentity {
        sequencer_type: SequencerType::Recursive,
        chain_id,
        domain: domain.into(),
        parent_chain_id: Some(parent_chain_id),
        external_rpc: None,
        depth,
    }
}

impl WireCodec for SequencerIdentity {
    fn to_wire(&self) -> Value {
        json!({
            "sequencer_type": self.sequencer_type.as_u8(),
            "chain_id": self.chain_id,
            "domain": hex::encode(&self.domain),
            "parent_chain_id": self.parent_chain_id,
            "external_rpc": self.external_rpc,
            "depth": self.depth,
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "identity")?;
        let depth = u64_or(obj, "depth", 0)?;
        Ok(SequencerIdentity {
            sequencer_type: SequencerType::try_from(u64_field(obj, "sequencer_type")?)?,
            chain_id: u64_field(obj, "chain_id")?,
            domain: hex_field(obj, "domain")?,
            parent_chain_id: opt_u64_field(obj, "parent_chain_id")?,
            external_rpc: opt_string_field(obj, "external_rpc")?,
            depth: u32::try_from(depth).map_err(|_| WireError::InvalidField {
                field: "depth",
                reason: format!("{} exceeds u32", depth),
            })?,
        })
    }
}
