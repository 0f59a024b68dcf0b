//! Structural encoder: typed protocol message → [`GenericValue`].
//!
//! Messages become ordered mappings (recursing into nested messages),
//! numbers stay numbers, and every other field kind is rendered as text.
//! The encoder is total: there is no error path.

use mavbridge_types::{FieldValue, GenericValue, ProtocolMessage};
use serde_json::Number;

/// Encode a whole message as a mapping of field name → encoded value.
pub fn encode_message(message: &dyn ProtocolMessage) -> GenericValue {
    GenericValue::Map(
        message
            .fields()
            .into_iter()
            .map(|(name, value)| (name.to_string(), encode(&value)))
            .collect(),
    )
}

/// Encode a single field value.
pub fn encode(value: &FieldValue<'_>) -> GenericValue {
    match value {
        FieldValue::Message(nested) => encode_message(*nested),
        FieldValue::Int(v) => GenericValue::Number(Number::from(*v)),
        FieldValue::UInt(v) => GenericValue::Number(Number::from(*v)),
        // NaN and infinities have no JSON number form.
        FieldValue::Float(v) => match Number::from_f64(*v) {
            Some(n) => GenericValue::Number(n),
            None => GenericValue::Text(v.to_string()),
        },
        other => GenericValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavbridge_types::{Heartbeat, MavAutopilot, MavState, MavType, StatusText, MavSeverity};

    /// Message with one nested level, standing in for protocol extensions
    /// that carry sub-structures.
    #[derive(Debug)]
    struct Vector3 {
        x: f32,
        y: f32,
        z: f32,
    }

    impl ProtocolMessage for Vector3 {
        fn type_name(&self) -> &'static str {
            "VECTOR3"
        }

        fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
            vec![
                ("x", FieldValue::Float(self.x.into())),
                ("y", FieldValue::Float(self.y.into())),
                ("z", FieldValue::Float(self.z.into())),
            ]
        }
    }

    #[derive(Debug)]
    struct Pose {
        label: String,
        valid: bool,
        raw: Vec<u8>,
        samples: Vec<u16>,
        position: Vector3,
        child: Option<Box<Pose>>,
    }

    impl ProtocolMessage for Pose {
        fn type_name(&self) -> &'static str {
            "POSE"
        }

        fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
            let mut fields = vec![
                ("label", FieldValue::Text(&self.label)),
                ("valid", FieldValue::Bool(self.valid)),
                ("raw", FieldValue::Bytes(&self.raw)),
                (
                    "samples",
                    FieldValue::Array(
                        self.samples.iter().map(|s| FieldValue::UInt((*s).into())).collect(),
                    ),
                ),
                ("position", FieldValue::Message(&self.position)),
            ];
            if let Some(child) = &self.child {
                fields.push(("child", FieldValue::Message(child.as_ref())));
            }
            fields
        }
    }

    fn pose_chain(depth: usize) -> Pose {
        let mut pose = Pose {
            label: "leaf".to_string(),
            valid: true,
            raw: vec![0xde, 0xad],
            samples: vec![1, 2, 3],
            position: Vector3 { x: 1.0, y: -2.0, z: 0.5 },
            child: None,
        };
        for i in 0..depth {
            pose = Pose {
                label: format!("level{i}"),
                valid: i % 2 == 0,
                raw: vec![i as u8],
                samples: vec![],
                position: Vector3 { x: i as f32, y: 0.0, z: f32::NAN },
                child: Some(Box::new(pose)),
            };
        }
        pose
    }

    fn leaf_count(value: &GenericValue) -> usize {
        match value {
            GenericValue::Map(entries) => entries.iter().map(|(_, v)| leaf_count(v)).sum(),
            _ => 1,
        }
    }

    #[test]
    fn heartbeat_encodes_enums_as_text_and_ints_as_numbers() {
        let hb = Heartbeat {
            mav_type: MavType::Quadrotor,
            autopilot: MavAutopilot::Ardupilotmega,
            base_mode: 81,
            custom_mode: 4,
            system_status: MavState::Active,
            mavlink_version: 3,
        };
        let json = encode_message(&hb).to_json_string().unwrap();
        assert_eq!(
            json,
            r#"{"type":"MAV_TYPE_QUADROTOR","autopilot":"MAV_AUTOPILOT_ARDUPILOTMEGA","base_mode":81,"custom_mode":4,"system_status":"MAV_STATE_ACTIVE","mavlink_version":3}"#
        );
    }

    #[test]
    fn text_fields_stay_text() {
        let st = StatusText {
            severity: MavSeverity::Warning,
            text: "PreArm: Battery below minimum".to_string(),
        };
        let encoded = encode_message(&st);
        assert_eq!(
            encoded.get("text").and_then(GenericValue::as_text),
            Some("PreArm: Battery below minimum")
        );
    }

    #[test]
    fn nested_messages_become_nested_maps() {
        let encoded = encode_message(&pose_chain(0));
        let position = encoded.get("position").expect("position present");
        assert!(matches!(position, GenericValue::Map(_)));
        assert_eq!(position.get("y").and_then(|v| v.as_number()).and_then(|n| n.as_f64()), Some(-2.0));
        assert_eq!(encoded.get("valid").and_then(GenericValue::as_text), Some("true"));
        assert_eq!(encoded.get("raw").and_then(GenericValue::as_text), Some("dead"));
        assert_eq!(encoded.get("samples").and_then(GenericValue::as_text), Some("[1, 2, 3]"));
    }

    #[test]
    fn non_finite_floats_degrade_to_text() {
        assert_eq!(encode(&FieldValue::Float(f64::NAN)), GenericValue::Text("NaN".into()));
        assert_eq!(
            encode(&FieldValue::Float(f64::NEG_INFINITY)),
            GenericValue::Text("-inf".into())
        );
    }

    #[test]
    fn encoding_deep_trees_terminates_with_scalar_leaves() {
        for depth in [0, 1, 5, 32] {
            let encoded = encode_message(&pose_chain(depth));
            assert!(encoded.leaves_are_scalars(), "depth {depth}");
            // Leaf levels carry 7 leaves (label, valid, raw, samples, x, y, z);
            // every wrapping level adds the same 7.
            assert_eq!(leaf_count(&encoded), 7 * (depth + 1));
            assert!(encoded.to_json_string().is_ok());
        }
    }
}
