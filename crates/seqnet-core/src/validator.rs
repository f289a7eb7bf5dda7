// VALIDATOR SET
// Who may attest, and with how much weight, during an epoch
//
// INVARIANTS:
// 1. total_weight equals the sum of member weights unless explicitly overridden
// 2. A zero total_weight is recomputed from the members at construction

use crate::codec::{
    as_object, id_field, opt_hex, opt_hex_field, string_or_default, u64_field, u64_or,
    WireCodec, WireError,
};
use crate::identity::Identifier;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub id: Identifier,
    /// Voting power (1 for unweighted membership)
    pub weight: u64,
    /// Scheme-tagged public key
    pub public_key: Option<Vec<u8>>,
    pub transport_addr: String,
}

impl Validator {
    pub fn new(id: Identifier, weight: u64) -> Self {
        Validator {
            id,
            weight,
            public_key: None,
            transport_addr: String::new(),
        }
    }
}

impl WireCodec for Validator {
    fn to_wire(&self) -> Value {
        json!({
            "id": self.id.to_hex(),
            "weight": self.weight,
            "public_key": opt_hex(&self.public_key),
            "transport_addr": self.transport_addr,
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "validator")?;
        Ok(Validator {
            id: id_field(obj, "id")?,
            weight: u64_or(obj, "weight", 1)?,
            public_key: opt_hex_field(obj, "public_key")?,
            transport_addr: string_or_default(obj, "transport_addr")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSet {
    pub epoch: u64,
    pub validators: Vec<Validator>,
    pub total_weight: u64,
}

impl ValidatorSet {
    /// Build a set; `total_weight == 0` means "sum the members".
    pub fn new(epoch: u64, validators: Vec<Validator>, total_weight: u64) -> Self {
        let total_weight = if total_weight == 0 {
            validators
                .iter()
                .fold(0u64, |acc, v| acc.saturating_add(v.weight))
        } else {
            total_weight
        };
        ValidatorSet {
            epoch,
            validators,
            total_weight,
        }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.validators.iter().any(|v| &v.id == id)
    }

    /// Weight of a member; zero for non-members.
    pub fn weight_of(&self, id: &Identifier) -> u64 {
        self.validators
            .iter()
            .find(|v| &v.id == id)
            .map(|v| v.weight)
            .unwrap_or(0)
    }
}

impl WireCodec for ValidatorSet {
    fn to_wire(&self) -> Value {
        json!({
            "epoch": self.epoch,
            "validators": self.validators.iter().map(Validator::to_wire).collect::<Vec<_>>(),
            "total_weight": self.total_weight,
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "validator_set")?;
        let validators = match obj.get("validators") {
            None | Some(Value::Null) => Vec::new(),
            Some(list) => list
                .as_array()
                .ok_or(WireError::InvalidField {
                    field: "validators",
                    reason: "expected an array".to_string(),
                })?
                .iter()
                .map(Validator::from_wire)
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(ValidatorSet::new(
            u64_field(obj, "epoch")?,
            validators,
            u64_or(obj, "total_weight", 0)?,
        ))
    }
}
