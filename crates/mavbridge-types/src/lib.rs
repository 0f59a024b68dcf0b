//! `mavbridge-types` – shared vocabulary of the MAVLink ↔ MQTT bridge.
//!
//! - [`ProtocolMessage`] – the introspection capability every vehicle
//!   message exposes: a stable type name and an ordered list of named fields.
//! - [`FieldValue`] – one borrowed field value (number, text, enum, bytes,
//!   array or nested message).
//! - [`GenericValue`] – the string/number/mapping tree carried as JSON on the
//!   bus.
//! - [`messages`] – the concrete MAVLink messages the bridge understands,
//!   gathered in the closed [`MavMessage`] enum.
//! - [`BridgeError`] – workspace-wide error type.

pub mod messages;

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Number, Value};
use thiserror::Error;

pub use messages::{
    Attitude, CommandAck, CommandLong, GlobalPositionInt, Heartbeat, MavAutopilot, MavMessage,
    MavResult, MavSeverity, MavState, MavType, StatusText, SysStatus,
};

// ────────────────────────────────────────────────────────────────────────────
// Protocol message capability
// ────────────────────────────────────────────────────────────────────────────

/// A typed vehicle protocol message that can describe its own fields.
///
/// The bridge never inspects concrete message types when serializing
/// telemetry; it only walks the `(name, value)` pairs returned by
/// [`fields`][Self::fields], in declaration order.
pub trait ProtocolMessage: fmt::Debug {
    /// Stable message name, e.g. `"HEARTBEAT"`.  Used for topic naming.
    fn type_name(&self) -> &'static str;

    /// Ordered `(field name, value)` pairs.
    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)>;
}

/// One field value borrowed from a [`ProtocolMessage`].
#[derive(Debug, Clone)]
pub enum FieldValue<'a> {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(&'a str),
    /// Raw payload bytes, rendered as lowercase hex.
    Bytes(&'a [u8]),
    /// Symbolic enumerator name, e.g. `"MAV_TYPE_QUADROTOR"`.
    Enum(&'static str),
    Array(Vec<FieldValue<'a>>),
    Message(&'a dyn ProtocolMessage),
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::UInt(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Bytes(bytes) => {
                for b in bytes.iter() {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            FieldValue::Enum(name) => f.write_str(name),
            FieldValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            FieldValue::Message(m) => f.write_str(m.type_name()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generic structure
// ────────────────────────────────────────────────────────────────────────────

/// Recursive bus payload content: an ordered mapping, a number or a string.
///
/// No other leaf kinds exist.  Serializes to a JSON object, number or string.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericValue {
    Map(Vec<(String, GenericValue)>),
    Number(Number),
    Text(String),
}

impl GenericValue {
    /// Convert parsed JSON into a [`GenericValue`].
    ///
    /// Objects and numbers keep their shape; every other JSON kind (bool,
    /// null, array) collapses to its JSON text so the leaf invariant holds.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => GenericValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, GenericValue::from_json(v)))
                    .collect(),
            ),
            Value::Number(n) => GenericValue::Number(n),
            Value::String(s) => GenericValue::Text(s),
            other => GenericValue::Text(other.to_string()),
        }
    }

    /// Parse UTF-8 JSON text.
    pub fn from_slice(payload: &[u8]) -> Result<Self, BridgeError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| BridgeError::Decode(format!("payload is not UTF-8: {e}")))?;
        let value: Value = serde_json::from_str(text)
            .map_err(|e| BridgeError::Decode(format!("payload is not JSON: {e}")))?;
        Ok(GenericValue::from_json(value))
    }

    /// Serialize to compact JSON text.
    pub fn to_json_string(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::Serialization(e.to_string()))
    }

    /// Look up `key` when this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&GenericValue> {
        match self {
            GenericValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            GenericValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            GenericValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// `true` for every value whose leaves are all numbers or strings.
    ///
    /// Always holds for values built through this type; exposed for tests
    /// and assertions on decoded payloads.
    pub fn leaves_are_scalars(&self) -> bool {
        match self {
            GenericValue::Map(entries) => entries.iter().all(|(_, v)| v.leaves_are_scalars()),
            GenericValue::Number(_) | GenericValue::Text(_) => true,
        }
    }
}

impl Serialize for GenericValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GenericValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            GenericValue::Number(n) => n.serialize(serializer),
            GenericValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by every bridge crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Bus transport error: {0}")]
    Transport(String),

    #[error("Bus not connected")]
    NotConnected,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Field {field} out of range: {details}")]
    OutOfRange { field: &'static str, details: String },

    #[error("Command queue closed")]
    QueueClosed,

    #[error("Vehicle link error: {0}")]
    Link(String),

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generic_value_serializes_in_insertion_order() {
        let value = GenericValue::Map(vec![
            ("zeta".to_string(), GenericValue::Number(Number::from(1))),
            ("alpha".to_string(), GenericValue::Text("x".to_string())),
        ]);
        assert_eq!(value.to_json_string().unwrap(), r#"{"zeta":1,"alpha":"x"}"#);
    }

    #[test]
    fn from_json_collapses_non_scalar_leaves() {
        let value = GenericValue::from_json(json!({
            "flag": true,
            "nothing": null,
            "list": [1, 2],
            "nested": { "n": 2.5 }
        }));
        assert_eq!(value.get("flag"), Some(&GenericValue::Text("true".into())));
        assert_eq!(value.get("nothing"), Some(&GenericValue::Text("null".into())));
        assert_eq!(value.get("list"), Some(&GenericValue::Text("[1,2]".into())));
        assert!(value.get("nested").and_then(|n| n.get("n")).is_some());
        assert!(value.leaves_are_scalars());
    }

    #[test]
    fn from_slice_rejects_non_json() {
        let err = GenericValue::from_slice(b"not json at all").unwrap_err();
        assert!(matches!(err, BridgeError::Decode(_)));
    }

    #[test]
    fn from_slice_rejects_invalid_utf8() {
        let err = GenericValue::from_slice(&[0xff, 0xfe, 0x7b]).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn get_on_non_map_is_none() {
        assert!(GenericValue::Text("x".into()).get("x").is_none());
    }

    #[test]
    fn field_value_display() {
        assert_eq!(FieldValue::Bytes(&[0x0a, 0xff]).to_string(), "0aff");
        assert_eq!(
            FieldValue::Array(vec![FieldValue::UInt(1), FieldValue::Int(-2)]).to_string(),
            "[1, -2]"
        );
        assert_eq!(FieldValue::Bool(true).to_string(), "true");
        assert_eq!(FieldValue::Enum("MAV_STATE_ACTIVE").to_string(), "MAV_STATE_ACTIVE");
    }

    #[test]
    fn bridge_error_display() {
        let err = BridgeError::OutOfRange {
            field: "target_system",
            details: "300 does not fit in u8".to_string(),
        };
        assert!(err.to_string().contains("target_system"));
        assert_eq!(BridgeError::NotConnected.to_string(), "Bus not connected");
    }
}
