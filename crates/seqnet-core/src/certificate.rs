// CERTIFICATE
// Proof that a candidate achieved finality under a named policy
//
// SAFETY INVARIANTS:
// 1. Certificates are immutable once constructed (no setters)
// 2. `proof` is policy-specific opaque bytes: threshold signature,
//    inclusion receipt, or a synthesis record for agent meshes

use crate::codec::{
    as_object, hex_field, id_field, opt_hex, opt_hex_field, u64_field, u64_or, WireCodec,
    WireError,
};
use crate::identity::Identifier;
use crate::now_ms;
use crate::policy::PolicyId;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    candidate_id: Identifier,
    height: u64,
    policy_id: PolicyId,
    proof: Vec<u8>,
    signers: Option<Vec<u8>>,
    timestamp_ms: u64,
}

impl Certificate {
    /// Create a certificate stamped with the current time.
    pub fn new(
        candidate_id: Identifier,
        height: u64,
        policy_id: PolicyId,
        proof: Vec<u8>,
        signers: Option<Vec<u8>>,
    ) -> Self {
        Self::with_timestamp(candidate_id, height, policy_id, proof, signers, now_ms())
    }

    pub fn with_timestamp(
        candidate_id: Identifier,
        height: u64,
        policy_id: PolicyId,
        proof: Vec<u8>,
        signers: Option<Vec<u8>>,
        timestamp_ms: u64,
    ) -> Self {
        Certificate {
            candidate_id,
            height,
            policy_id,
            proof,
            signers,
            timestamp_ms,
        }
    }

    pub fn candidate_id(&self) -> Identifier {
        self.candidate_id
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn policy_id(&self) -> PolicyId {
        self.policy_id
    }

    pub fn proof(&self) -> &[u8] {
        &self.proof
    }

    pub fn signers(&self) -> Option<&[u8]> {
        self.signers.as_deref()
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

impl WireCodec for Certificate {
    fn to_wire(&self) -> Value {
        json!({
            "candidate_id": self.candidate_id.to_hex(),
            "height": self.height,
            "policy_id": self.policy_id.as_u8(),
            "proof": hex::encode(&self.proof),
            "signers": opt_hex(&self.signers),
            "timestamp_ms": self.timestamp_ms,
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "certificate")?;
        Ok(Certificate {
            candidate_id: id_field(obj, "candidate_id")?,
            height: u64_field(obj, "height")?,
            policy_id: PolicyId::try_from(u64_field(obj, "policy_id")?)?,
            proof: hex_field(obj, "proof")?,
            signers: opt_hex_field(obj, "signers")?,
            timestamp_ms: u64_or(obj, "timestamp_ms", 0)?,
        })
    }
}
