// VOTE
// Attestation on a candidate by a single voter
//
// A vote is NOT self-verifying: signature validation is delegated to an
// external verifier keyed by voter_id and the signature's scheme tag.

use crate::codec::{
    as_object, bool_field, id_field, opt_hex, opt_hex_field, u64_or, WireCodec, WireError,
};
use crate::identity::Identifier;
use crate::now_ms;
use crate::policy::SignatureScheme;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub candidate_id: Identifier,
    pub voter_id: Identifier,
    pub round: u64,
    /// Accept (`true`) or reject (`false`)
    pub preference: bool,
    /// Scheme-tagged signature; first byte selects the scheme
    pub signature: Option<Vec<u8>>,
    pub timestamp_ms: u64,
}

impl Vote {
    /// Unsigned accepting vote in round 0, stamped with the current time.
    pub fn new(candidate_id: Identifier, voter_id: Identifier) -> Self {
        Vote {
            candidate_id,
            voter_id,
            round: 0,
            preference: true,
            signature: None,
            timestamp_ms: now_ms(),
        }
    }

    pub fn with_round(mut self, round: u64) -> Self {
        self.round = round;
        self
    }

    pub fn with_preference(mut self, preference: bool) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn signature_scheme(&self) -> SignatureScheme {
        SignatureScheme::of_signature(self.signature.as_deref())
    }

    /// Bytes a voter signs: `candidate_id || round (big-endian) || preference`.
    pub fn signing_message(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(32 + 8 + 1);
        msg.extend_from_slice(self.candidate_id.as_bytes());
        msg.extend_from_slice(&self.round.to_be_bytes());
        msg.push(self.preference as u8);
        msg
    }
}

impl WireCodec for Vote {
    fn to_wire(&self) -> Value {
        json!({
            "candidate_id": self.candidate_id.to_hex(),
            "voter_id": self.voter_id.to_hex(),
            "round": self.round,
            "preference": self.preference,
            "signature": opt_hex(&self.signature),
            "timestamp_ms": self.timestamp_ms,
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "vote")?;
        Ok(Vote {
            candidate_id: id_field(obj, "candidate_id")?,
            voter_id: id_field(obj, "voter_id")?,
            round: u64_or(obj, "round", 0)?,
            preference: bool_field(obj, "preference")?,
            signature: opt_hex_field(obj, "signature")?,
            timestamp_ms: u64_or(obj, "timestamp_ms", 0)?,
        })
    }
}
