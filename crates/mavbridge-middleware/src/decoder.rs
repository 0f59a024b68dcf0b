//! Command decoder: [`GenericValue`] → `COMMAND_LONG`.
//!
//! Bus payloads may carry any subset of the eleven `COMMAND_LONG` keys.
//! Absent keys, and keys holding something other than a number, fall back
//! to the defaults of [`CommandLong::default`] (system 1, component 1,
//! everything else zero).  A number that cannot be represented in its wire
//! field is a [`BridgeError::OutOfRange`].  A payload whose top level is
//! not a mapping is a [`BridgeError::Decode`].

use std::any::type_name;

use mavbridge_types::{BridgeError, CommandLong, GenericValue};
use serde_json::Number;

/// Build a `COMMAND_LONG` from a decoded bus payload.
///
/// # Errors
///
/// Returns [`BridgeError::Decode`] when `payload` is not a mapping, and
/// [`BridgeError::OutOfRange`] when an integer field receives a
/// value outside its wire type or a fractional value, or when a parameter
/// exceeds the `f32` range.
pub fn decode_command(payload: &GenericValue) -> Result<CommandLong, BridgeError> {
    let found = match payload {
        GenericValue::Map(_) => None,
        GenericValue::Number(n) => Some(n.to_string()),
        GenericValue::Text(s) => Some(format!("{s:?}")),
    };
    if let Some(found) = found {
        return Err(BridgeError::Decode(format!(
            "command payload must be a JSON object, got {found}"
        )));
    }
    let defaults = CommandLong::default();
    Ok(CommandLong {
        target_system: int_field(payload, "target_system", defaults.target_system)?,
        target_component: int_field(payload, "target_component", defaults.target_component)?,
        command: int_field(payload, "command", defaults.command)?,
        confirmation: int_field(payload, "confirmation", defaults.confirmation)?,
        param1: param_field(payload, "param1", defaults.param1)?,
        param2: param_field(payload, "param2", defaults.param2)?,
        param3: param_field(payload, "param3", defaults.param3)?,
        param4: param_field(payload, "param4", defaults.param4)?,
        param5: param_field(payload, "param5", defaults.param5)?,
        param6: param_field(payload, "param6", defaults.param6)?,
        param7: param_field(payload, "param7", defaults.param7)?,
    })
}

fn number_at<'a>(payload: &'a GenericValue, key: &str) -> Option<&'a Number> {
    payload.get(key).and_then(GenericValue::as_number)
}

fn int_field<T>(payload: &GenericValue, key: &'static str, default: T) -> Result<T, BridgeError>
where
    T: TryFrom<i64>,
{
    let Some(n) = number_at(payload, key) else {
        return Ok(default);
    };

    let as_int = if let Some(i) = n.as_i64() {
        i
    } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64) {
        // JSON encoders often emit `400.0` for integral values.
        f as i64
    } else {
        return Err(BridgeError::OutOfRange {
            field: key,
            details: format!("{n} is not an integer of type {}", type_name::<T>()),
        });
    };

    T::try_from(as_int).map_err(|_| BridgeError::OutOfRange {
        field: key,
        details: format!("{as_int} does not fit in {}", type_name::<T>()),
    })
}

fn param_field(payload: &GenericValue, key: &'static str, default: f32) -> Result<f32, BridgeError> {
    let Some(n) = number_at(payload, key) else {
        return Ok(default);
    };
    let value = n.as_f64().ok_or_else(|| BridgeError::OutOfRange {
        field: key,
        details: format!("{n} is not representable as a float"),
    })?;
    if value.abs() > f64::from(f32::MAX) {
        return Err(BridgeError::OutOfRange {
            field: key,
            details: format!("{value} exceeds the f32 range"),
        });
    }
    Ok(value as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_json(v: serde_json::Value) -> Result<CommandLong, BridgeError> {
        decode_command(&GenericValue::from_json(v))
    }

    #[test]
    fn command_only_payload_gets_defaults() {
        let cmd = decode_json(json!({ "command": 400 })).unwrap();
        assert_eq!(cmd.target_system, 1);
        assert_eq!(cmd.target_component, 1);
        assert_eq!(cmd.command, 400);
        assert_eq!(cmd.confirmation, 0);
        assert_eq!(cmd.params(), [0.0; 7]);
    }

    #[test]
    fn all_keys_are_taken_verbatim() {
        let cmd = decode_json(json!({
            "target_system": 3,
            "target_component": 190,
            "command": 22,
            "confirmation": 2,
            "param1": 1.5,
            "param2": -2,
            "param3": 3,
            "param4": 4.25,
            "param5": -35.36,
            "param6": 149.16,
            "param7": 10
        }))
        .unwrap();
        assert_eq!(
            cmd,
            CommandLong {
                target_system: 3,
                target_component: 190,
                command: 22,
                confirmation: 2,
                param1: 1.5,
                param2: -2.0,
                param3: 3.0,
                param4: 4.25,
                param5: -35.36,
                param6: 149.16,
                param7: 10.0,
            }
        );
    }

    #[test]
    fn empty_object_is_all_defaults() {
        assert_eq!(decode_json(json!({})).unwrap(), CommandLong::default());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        for payload in [json!(null), json!("arm"), json!(42), json!([]), json!(true)] {
            let err = decode_json(payload.clone()).unwrap_err();
            assert!(matches!(err, BridgeError::Decode(_)), "{payload} gave {err:?}");
        }
    }

    #[test]
    fn wrong_shape_values_fall_back_to_defaults() {
        let cmd = decode_json(json!({
            "target_system": "two",
            "command": { "id": 400 },
            "param1": null,
            "param2": [1, 2],
            "confirmation": true
        }))
        .unwrap();
        assert_eq!(cmd, CommandLong::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cmd = decode_json(json!({ "command": 20, "type": "COMMAND_INT" })).unwrap();
        assert_eq!(cmd.command, 20);
    }

    #[test]
    fn integral_floats_are_accepted_for_integer_fields() {
        let cmd = decode_json(json!({ "command": 400.0, "target_system": 2.0 })).unwrap();
        assert_eq!(cmd.command, 400);
        assert_eq!(cmd.target_system, 2);
    }

    #[test]
    fn out_of_range_integer_is_rejected() {
        let err = decode_json(json!({ "target_system": 300 })).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfRange { field: "target_system", .. }));

        let err = decode_json(json!({ "command": -1 })).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfRange { field: "command", .. }));

        let err = decode_json(json!({ "confirmation": u64::MAX })).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfRange { field: "confirmation", .. }));
    }

    #[test]
    fn fractional_integer_field_is_rejected() {
        let err = decode_json(json!({ "command": 400.5 })).unwrap_err();
        assert!(err.to_string().contains("command"));
    }

    #[test]
    fn oversized_param_is_rejected() {
        let err = decode_json(json!({ "param7": 1e300 })).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfRange { field: "param7", .. }));
    }
}
