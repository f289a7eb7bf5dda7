// WIRE CODEC
// Canonical JSON object encoding shared by every wire type
//
// RULES:
// 1. Byte fields render as lowercase hex
// 2. Absent optional byte fields render as null; an empty value renders as ""
// 3. Integers and booleans render natively
// 4. decode(encode(x)) == x exactly

use crate::identity::{Identifier, ID_LEN};
use serde_json::{Map, Value};
use thiserror::Error;

/// Decode-time failures. Every variant is recoverable; decoding never panics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// A fixed-size field (identifiers) did not decode to exactly 32 bytes.
    #[error("field `{field}` must be {expected} bytes, got {got}")]
    InvalidFixedLengthField {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A field is present but has the wrong JSON type or malformed hex.
    #[error("invalid value for field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unknown policy enumerant {0}")]
    UnknownPolicyEnumerant(u64),

    #[error("unknown sequencer type {0}")]
    UnknownSequencerType(u64),

    #[error("malformed JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        WireError::Json(err.to_string())
    }
}

/// Structural encode/decode contract implemented by every wire type.
pub trait WireCodec: Sized {
    fn to_wire(&self) -> Value;

    fn from_wire(value: &Value) -> Result<Self, WireError>;

    fn to_json(&self) -> String {
        self.to_wire().to_string()
    }

    fn from_json(data: &str) -> Result<Self, WireError> {
        let value: Value = serde_json::from_str(data)?;
        Self::from_wire(&value)
    }
}

/// Render optional bytes as hex or null.
pub fn opt_hex(bytes: &Option<Vec<u8>>) -> Value {
    match bytes {
        Some(b) => Value::String(hex::encode(b)),
        None => Value::Null,
    }
}

pub fn as_object<'a>(value: &'a Value, what: &'static str) -> Result<&'a Map<String, Value>, WireError> {
    value.as_object().ok_or(WireError::InvalidField {
        field: what,
        reason: "expected a JSON object".to_string(),
    })
}

/// Fetch a required field; an explicit `null` counts as missing.
pub fn required<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, WireError> {
    match obj.get(field) {
        Some(Value::Null) | None => Err(WireError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

fn optional<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    match obj.get(field) {
        Some(Value::Null) | None => None,
        Some(v) => Some(v),
    }
}

fn decode_hex_value(value: &Value, field: &'static str) -> Result<Vec<u8>, WireError> {
    let s = value.as_str().ok_or(WireError::InvalidField {
        field,
        reason: "expected a hex string".to_string(),
    })?;
    hex::decode(s).map_err(|e| WireError::InvalidField {
        field,
        reason: e.to_string(),
    })
}

pub fn hex_field(obj: &Map<String, Value>, field: &'static str) -> Result<Vec<u8>, WireError> {
    decode_hex_value(required(obj, field)?, field)
}

pub fn opt_hex_field(obj: &Map<String, Value>, field: &'static str) -> Result<Option<Vec<u8>>, WireError> {
    optional(obj, field)
        .map(|v| decode_hex_value(v, field))
        .transpose()
}

fn to_identifier(bytes: Vec<u8>, field: &'static str) -> Result<Identifier, WireError> {
    Identifier::from_slice(&bytes).ok_or(WireError::InvalidFixedLengthField {
        field,
        expected: ID_LEN,
        got: bytes.len(),
    })
}

pub fn id_field(obj: &Map<String, Value>, field: &'static str) -> Result<Identifier, WireError> {
    to_identifier(hex_field(obj, field)?, field)
}

pub fn opt_id_field(obj: &Map<String, Value>, field: &'static str) -> Result<Option<Identifier>, WireError> {
    opt_hex_field(obj, field)?
        .map(|bytes| to_identifier(bytes, field))
        .transpose()
}

pub fn u64_field(obj: &Map<String, Value>, field: &'static str) -> Result<u64, WireError> {
    required(obj, field)?.as_u64().ok_or(WireError::InvalidField {
        field,
        reason: "expected a non-negative integer".to_string(),
    })
}

/// Optional integer with a default when absent.
pub fn u64_or(obj: &Map<String, Value>, field: &'static str, default: u64) -> Result<u64, WireError> {
    match optional(obj, field) {
        None => Ok(default),
        Some(v) => v.as_u64().ok_or(WireError::InvalidField {
            field,
            reason: "expected a non-negative integer".to_string(),
        }),
    }
}

pub fn opt_u64_field(obj: &Map<String, Value>, field: &'static str) -> Result<Option<u64>, WireError> {
    optional(obj, field)
        .map(|v| {
            v.as_u64().ok_or(WireError::InvalidField {
                field,
                reason: "expected a non-negative integer".to_string(),
            })
        })
        .transpose()
}

pub fn f64_field(obj: &Map<String, Value>, field: &'static str) -> Result<f64, WireError> {
    required(obj, field)?.as_f64().ok_or(WireError::InvalidField {
        field,
        reason: "expected a number".to_string(),
    })
}

pub fn bool_field(obj: &Map<String, Value>, field: &'static str) -> Result<bool, WireError> {
    required(obj, field)?.as_bool().ok_or(WireError::InvalidField {
        field,
        reason: "expected a boolean".to_string(),
    })
}

pub fn string_or_default(obj: &Map<String, Value>, field: &'static str) -> Result<String, WireError> {
    match optional(obj, field) {
        None => Ok(String::new()),
        Some(v) => v.as_str().map(str::to_string).ok_or(WireError::InvalidField {
            field,
            reason: "expected a string".to_string(),
        }),
    }
}

pub fn opt_string_field(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>, WireError> {
    optional(obj, field)
        .map(|v| {
            v.as_str().map(str::to_string).ok_or(WireError::InvalidField {
                field,
                reason: "expected a string".to_string(),
            })
        })
        .transpose()
}
