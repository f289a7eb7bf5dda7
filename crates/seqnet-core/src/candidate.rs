// CANDIDATE
// Content-addressed unit being sequenced (block, transaction, agent decision)
//
// INVARIANTS:
// 1. id == H(domain || payload), checkable by any holder without network access
// 2. Genesis candidates point at the all-zero parent
// 3. meta never participates in the ID

use crate::codec::{
    as_object, hex_field, id_field, opt_hex, opt_hex_field, opt_id_field, string_or_default,
    u64_field, u64_or, WireCodec, WireError,
};
use crate::identity::{compute_candidate_id, Identifier};
use crate::now_ms;
use serde_json::{json, Value};

/// Optional candidate metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMeta {
    pub proposer_id: Option<Identifier>,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub chain_id: Option<Vec<u8>>,
    pub extra: Option<Vec<u8>>,
}

impl CandidateMeta {
    pub fn now() -> Self {
        CandidateMeta {
            timestamp_ms: now_ms(),
            ..Self::empty()
        }
    }

    /// Metadata with every field absent and a zero timestamp.
    pub fn empty() -> Self {
        CandidateMeta {
            proposer_id: None,
            timestamp_ms: 0,
            chain_id: None,
            extra: None,
        }
    }
}

impl Default for CandidateMeta {
    fn default() -> Self {
        Self::now()
    }
}

impl WireCodec for CandidateMeta {
    fn to_wire(&self) -> Value {
        json!({
            "proposer_id": self.proposer_id.map(|id| id.to_hex()),
            "timestamp_ms": self.timestamp_ms,
            "chain_id": opt_hex(&self.chain_id),
            "extra": opt_hex(&self.extra),
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "meta")?;
        Ok(CandidateMeta {
            proposer_id: opt_id_field(obj, "proposer_id")?,
            timestamp_ms: u64_or(obj, "timestamp_ms", 0)?,
            chain_id: opt_hex_field(obj, "chain_id")?,
            extra: opt_hex_field(obj, "extra")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: Identifier,
    pub parent_id: Identifier,
    /// Sequence number relative to `parent_id`
    pub height: u64,
    pub domain: Vec<u8>,
    pub payload: Vec<u8>,
    /// Data-availability reference (where the payload bytes live)
    pub da_ref: String,
    pub meta: CandidateMeta,
}

impl Candidate {
    /// Create a genesis-parented candidate with its content-addressed ID.
    pub fn new(domain: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>, height: u64) -> Self {
        Self::with_parent(domain, payload, height, Identifier::ZERO)
    }

    pub fn with_parent(
        domain: impl Into<Vec<u8>>,
        payload: impl Into<Vec<u8>>,
        height: u64,
        parent_id: Identifier,
    ) -> Self {
        let domain = domain.into();
        let payload = payload.into();
        Candidate {
            id: compute_candidate_id(&domain, &payload),
            parent_id,
            height,
            domain,
            payload,
            da_ref: String::new(),
            meta: CandidateMeta::now(),
        }
    }

    /// The always-accepted genesis candidate: zero ID, zero parent, height 0.
    pub fn genesis() -> Self {
        Candidate {
            id: Identifier::ZERO,
            parent_id: Identifier::ZERO,
            height: 0,
            domain: Vec::new(),
            payload: Vec::new(),
            da_ref: String::new(),
            meta: CandidateMeta::empty(),
        }
    }

    pub fn with_da_ref(mut self, da_ref: impl Into<String>) -> Self {
        self.da_ref = da_ref.into();
        self
    }

    pub fn with_meta(mut self, meta: CandidateMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Recompute the content address and compare it to the stored ID.
    pub fn verify(&self) -> bool {
        self.id == compute_candidate_id(&self.domain, &self.payload)
    }

    pub fn is_genesis(&self) -> bool {
        self.id.is_zero() && self.height == 0
    }
}

impl WireCodec for Candidate {
    fn to_wire(&self) -> Value {
        json!({
            "id": self.id.to_hex(),
            "parent_id": self.parent_id.to_hex(),
            "height": self.height,
            "domain": hex::encode(&self.domain),
            "payload": hex::encode(&self.payload),
            "da_ref": self.da_ref,
            "meta": self.meta.to_wire(),
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "candidate")?;
        let meta = match obj.get("meta") {
            None | Some(Value::Null) => CandidateMeta::empty(),
            Some(m) => CandidateMeta::from_wire(m)?,
        };
        Ok(Candidate {
            id: id_field(obj, "id")?,
            parent_id: id_field(obj, "parent_id")?,
            height: u64_field(obj, "height")?,
            domain: hex_field(obj, "domain")?,
            payload: hex_field(obj, "payload")?,
            da_ref: string_or_default(obj, "da_ref")?,
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_candidate_verifies() {
        let c = Candidate::new(b"ai-mesh".to_vec(), b"decision text".to_vec(), 1);
        assert!(c.verify());
        assert_eq!(c.parent_id, Identifier::ZERO);
        assert_eq!(c.height, 1);
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let mut c = Candidate::new("chain", "block 1", 1);
        c.payload = b"block 2".to_vec();
        assert!(!c.verify());
    }

    #[test]
    fn test_tampered_domain_fails_verification() {
        let mut c = Candidate::new("chain", "block 1", 1);
        c.domain = b"other".to_vec();
        assert!(!c.verify());
    }

    #[test]
    fn test_meta_does_not_affect_id() {
        let a = Candidate::new("d", "p", 3);
        let mut meta = CandidateMeta::now();
        meta.extra = Some(vec![1, 2, 3]);
        meta.proposer_id = Some(Identifier::new([7u8; 32]));
        let b = Candidate::new("d", "p", 3).with_meta(meta);
        assert_eq!(a.id, b.id);
        assert!(b.verify());
    }

    #[test]
    fn test_candidate_roundtrip() {
        let mut meta = CandidateMeta::now();
        meta.chain_id = Some(vec![]);
        meta.extra = Some(vec![0xde, 0xad]);
        let c = Candidate::with_parent("d", "payload", 9, Identifier::new([3u8; 32]))
            .with_da_ref("ipfs://cid")
            .with_meta(meta);
        let decoded = Candidate::from_json(&c.to_json()).unwrap();
        assert_eq!(decoded, c);
        assert_eq!(decoded.meta.chain_id, Some(vec![]));
    }

    #[test]
    fn test_decode_rejects_short_parent_id() {
        let mut value = Candidate::new("d", "p", 1).to_wire();
        value["parent_id"] = Value::String("00".repeat(31));
        assert_eq!(
            Candidate::from_wire(&value),
            Err(WireError::InvalidFixedLengthField { field: "parent_id", expected: 32, got: 31 })
        );
    }

    #[test]
    fn test_decode_rejects_missing_payload() {
        let mut value = Candidate::new("d", "p", 1).to_wire();
        value.as_object_mut().unwrap().remove("payload");
        assert_eq!(Candidate::from_wire(&value), Err(WireError::MissingField("payload")));
    }

    #[test]
    fn test_genesis() {
        let g = Candidate::genesis();
        assert!(g.is_genesis());
        assert!(!Candidate::new("d", "p", 0).is_genesis());
    }
}
