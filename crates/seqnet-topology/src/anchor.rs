// CERTIFICATE ANCHORING
// Wraps a child chain's hard-finality certificate as a candidate payload
// for its parent, which is how finality propagates up the tree

use crate::network::NetworkNode;
use crate::TopologyError;
use log::debug;
use seqnet_core::codec::{as_object, u64_field};
use seqnet_core::{Candidate, CandidateMeta, Certificate, Identifier, WireCodec, WireError};
use serde_json::{json, Value};

/// A child certificate as carried inside a parent candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub child_chain_id: u64,
    pub certificate: Certificate,
}

impl WireCodec for Anchor {
    fn to_wire(&self) -> Value {
        json!({
            "child_chain_id": self.child_chain_id,
            "certificate": self.certificate.to_wire(),
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "anchor")?;
        Ok(Anchor {
            child_chain_id: u64_field(obj, "child_chain_id")?,
            certificate: Certificate::from_wire(
                obj.get("certificate")
                    .ok_or(WireError::MissingField("certificate"))?,
            )?,
        })
    }
}

/// Build the parent-domain candidate anchoring `cert` from a direct child.
pub fn anchor_candidate(
    parent: &NetworkNode,
    child_chain_id: u64,
    cert: &Certificate,
    height: u64,
    parent_id: Identifier,
) -> Result<Candidate, TopologyError> {
    if !parent
        .children()
        .iter()
        .any(|child| child.chain_id() == child_chain_id)
    {
        return Err(TopologyError::NotAChild {
            parent: parent.chain_id(),
            child: child_chain_id,
        });
    }

    let anchor = Anchor {
        child_chain_id,
        certificate: cert.clone(),
    };
    let mut meta = CandidateMeta::now();
    meta.chain_id = Some(child_chain_id.to_be_bytes().to_vec());

    let candidate = Candidate::with_parent(
        parent.identity().domain.clone(),
        anchor.to_json().into_bytes(),
        height,
        parent_id,
    )
    .with_meta(meta);
    debug!(
        "Anchored certificate for {} from chain {} into chain {} as {}",
        cert.candidate_id(),
        child_chain_id,
        parent.chain_id(),
        candidate.id
    );
    Ok(candidate)
}

/// Recover the anchored certificate from a candidate's payload.
pub fn decode_anchor(candidate: &Candidate) -> Result<Anchor, WireError> {
    let text = std::str::from_utf8(&candidate.payload).map_err(|e| WireError::InvalidField {
        field: "payload",
        reason: e.to_string(),
    })?;
    Anchor::from_json(text)
}
