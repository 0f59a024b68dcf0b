//! MAVLink messages understood by the bridge.
//!
//! Each message is a plain struct whose [`ProtocolMessage`] impl lists the
//! wire fields in MAVLink definition order under their MAVLink names.
//! [`MavMessage`] is the closed set carried across the vehicle link.

use crate::{FieldValue, ProtocolMessage};

// ────────────────────────────────────────────────────────────────────────────
// Enumerations
// ────────────────────────────────────────────────────────────────────────────

/// `MAV_TYPE` – vehicle airframe class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MavType {
    Generic,
    FixedWing,
    Quadrotor,
    Helicopter,
    Gcs,
    GroundRover,
    SurfaceBoat,
    Submarine,
}

impl MavType {
    pub fn name(self) -> &'static str {
        match self {
            MavType::Generic => "MAV_TYPE_GENERIC",
            MavType::FixedWing => "MAV_TYPE_FIXED_WING",
            MavType::Quadrotor => "MAV_TYPE_QUADROTOR",
            MavType::Helicopter => "MAV_TYPE_HELICOPTER",
            MavType::Gcs => "MAV_TYPE_GCS",
            MavType::GroundRover => "MAV_TYPE_GROUND_ROVER",
            MavType::SurfaceBoat => "MAV_TYPE_SURFACE_BOAT",
            MavType::Submarine => "MAV_TYPE_SUBMARINE",
        }
    }
}

/// `MAV_AUTOPILOT` – flight stack identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MavAutopilot {
    Generic,
    Ardupilotmega,
    Px4,
    Invalid,
}

impl MavAutopilot {
    pub fn name(self) -> &'static str {
        match self {
            MavAutopilot::Generic => "MAV_AUTOPILOT_GENERIC",
            MavAutopilot::Ardupilotmega => "MAV_AUTOPILOT_ARDUPILOTMEGA",
            MavAutopilot::Px4 => "MAV_AUTOPILOT_PX4",
            MavAutopilot::Invalid => "MAV_AUTOPILOT_INVALID",
        }
    }
}

/// `MAV_STATE` – system status flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MavState {
    Uninit,
    Boot,
    Calibrating,
    Standby,
    Active,
    Critical,
    Emergency,
    Poweroff,
}

impl MavState {
    pub fn name(self) -> &'static str {
        match self {
            MavState::Uninit => "MAV_STATE_UNINIT",
            MavState::Boot => "MAV_STATE_BOOT",
            MavState::Calibrating => "MAV_STATE_CALIBRATING",
            MavState::Standby => "MAV_STATE_STANDBY",
            MavState::Active => "MAV_STATE_ACTIVE",
            MavState::Critical => "MAV_STATE_CRITICAL",
            MavState::Emergency => "MAV_STATE_EMERGENCY",
            MavState::Poweroff => "MAV_STATE_POWEROFF",
        }
    }
}

/// `MAV_SEVERITY` – STATUSTEXT severity (RFC-5424 levels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MavSeverity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl MavSeverity {
    pub fn name(self) -> &'static str {
        match self {
            MavSeverity::Emergency => "MAV_SEVERITY_EMERGENCY",
            MavSeverity::Alert => "MAV_SEVERITY_ALERT",
            MavSeverity::Critical => "MAV_SEVERITY_CRITICAL",
            MavSeverity::Error => "MAV_SEVERITY_ERROR",
            MavSeverity::Warning => "MAV_SEVERITY_WARNING",
            MavSeverity::Notice => "MAV_SEVERITY_NOTICE",
            MavSeverity::Info => "MAV_SEVERITY_INFO",
            MavSeverity::Debug => "MAV_SEVERITY_DEBUG",
        }
    }
}

/// `MAV_RESULT` – outcome reported in COMMAND_ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MavResult {
    Accepted,
    TemporarilyRejected,
    Denied,
    Unsupported,
    Failed,
    InProgress,
}

impl MavResult {
    pub fn name(self) -> &'static str {
        match self {
            MavResult::Accepted => "MAV_RESULT_ACCEPTED",
            MavResult::TemporarilyRejected => "MAV_RESULT_TEMPORARILY_REJECTED",
            MavResult::Denied => "MAV_RESULT_DENIED",
            MavResult::Unsupported => "MAV_RESULT_UNSUPPORTED",
            MavResult::Failed => "MAV_RESULT_FAILED",
            MavResult::InProgress => "MAV_RESULT_IN_PROGRESS",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Messages
// ────────────────────────────────────────────────────────────────────────────

/// HEARTBEAT (#0).
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    pub mav_type: MavType,
    pub autopilot: MavAutopilot,
    pub base_mode: u8,
    pub custom_mode: u32,
    pub system_status: MavState,
    pub mavlink_version: u8,
}

impl ProtocolMessage for Heartbeat {
    fn type_name(&self) -> &'static str {
        "HEARTBEAT"
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("type", FieldValue::Enum(self.mav_type.name())),
            ("autopilot", FieldValue::Enum(self.autopilot.name())),
            ("base_mode", FieldValue::UInt(self.base_mode.into())),
            ("custom_mode", FieldValue::UInt(self.custom_mode.into())),
            ("system_status", FieldValue::Enum(self.system_status.name())),
            ("mavlink_version", FieldValue::UInt(self.mavlink_version.into())),
        ]
    }
}

/// SYS_STATUS (#1), without the autopilot-specific error counters.
#[derive(Debug, Clone, PartialEq)]
pub struct SysStatus {
    pub onboard_control_sensors_present: u32,
    pub onboard_control_sensors_enabled: u32,
    pub onboard_control_sensors_health: u32,
    /// Main loop load, in 0.1 % units.
    pub load: u16,
    /// Millivolts.
    pub voltage_battery: u16,
    /// Centiamps, -1 when unknown.
    pub current_battery: i16,
    /// Percent, -1 when unknown.
    pub battery_remaining: i8,
    pub drop_rate_comm: u16,
    pub errors_comm: u16,
}

impl ProtocolMessage for SysStatus {
    fn type_name(&self) -> &'static str {
        "SYS_STATUS"
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            (
                "onboard_control_sensors_present",
                FieldValue::UInt(self.onboard_control_sensors_present.into()),
            ),
            (
                "onboard_control_sensors_enabled",
                FieldValue::UInt(self.onboard_control_sensors_enabled.into()),
            ),
            (
                "onboard_control_sensors_health",
                FieldValue::UInt(self.onboard_control_sensors_health.into()),
            ),
            ("load", FieldValue::UInt(self.load.into())),
            ("voltage_battery", FieldValue::UInt(self.voltage_battery.into())),
            ("current_battery", FieldValue::Int(self.current_battery.into())),
            ("battery_remaining", FieldValue::Int(self.battery_remaining.into())),
            ("drop_rate_comm", FieldValue::UInt(self.drop_rate_comm.into())),
            ("errors_comm", FieldValue::UInt(self.errors_comm.into())),
        ]
    }
}

/// ATTITUDE (#30).  Angles in radians, rates in rad/s.
#[derive(Debug, Clone, PartialEq)]
pub struct Attitude {
    pub time_boot_ms: u32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub rollspeed: f32,
    pub pitchspeed: f32,
    pub yawspeed: f32,
}

impl ProtocolMessage for Attitude {
    fn type_name(&self) -> &'static str {
        "ATTITUDE"
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("time_boot_ms", FieldValue::UInt(self.time_boot_ms.into())),
            ("roll", FieldValue::Float(self.roll.into())),
            ("pitch", FieldValue::Float(self.pitch.into())),
            ("yaw", FieldValue::Float(self.yaw.into())),
            ("rollspeed", FieldValue::Float(self.rollspeed.into())),
            ("pitchspeed", FieldValue::Float(self.pitchspeed.into())),
            ("yawspeed", FieldValue::Float(self.yawspeed.into())),
        ]
    }
}

/// GLOBAL_POSITION_INT (#33).  Lat/lon in degE7, altitudes in mm,
/// velocities in cm/s, heading in cdeg.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalPositionInt {
    pub time_boot_ms: u32,
    pub lat: i32,
    pub lon: i32,
    pub alt: i32,
    pub relative_alt: i32,
    pub vx: i16,
    pub vy: i16,
    pub vz: i16,
    pub hdg: u16,
}

impl ProtocolMessage for GlobalPositionInt {
    fn type_name(&self) -> &'static str {
        "GLOBAL_POSITION_INT"
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("time_boot_ms", FieldValue::UInt(self.time_boot_ms.into())),
            ("lat", FieldValue::Int(self.lat.into())),
            ("lon", FieldValue::Int(self.lon.into())),
            ("alt", FieldValue::Int(self.alt.into())),
            ("relative_alt", FieldValue::Int(self.relative_alt.into())),
            ("vx", FieldValue::Int(self.vx.into())),
            ("vy", FieldValue::Int(self.vy.into())),
            ("vz", FieldValue::Int(self.vz.into())),
            ("hdg", FieldValue::UInt(self.hdg.into())),
        ]
    }
}

/// STATUSTEXT (#253).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusText {
    pub severity: MavSeverity,
    pub text: String,
}

impl ProtocolMessage for StatusText {
    fn type_name(&self) -> &'static str {
        "STATUSTEXT"
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("severity", FieldValue::Enum(self.severity.name())),
            ("text", FieldValue::Text(&self.text)),
        ]
    }
}

/// COMMAND_LONG (#76) – the one command shape the bridge builds from bus
/// payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLong {
    pub target_system: u8,
    pub target_component: u8,
    /// `MAV_CMD` code.
    pub command: u16,
    pub confirmation: u8,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub param5: f32,
    pub param6: f32,
    pub param7: f32,
}

impl CommandLong {
    /// Parameters as an array, `param1` first.
    pub fn params(&self) -> [f32; 7] {
        [
            self.param1,
            self.param2,
            self.param3,
            self.param4,
            self.param5,
            self.param6,
            self.param7,
        ]
    }
}

impl Default for CommandLong {
    /// Addressed to system 1 / component 1, everything else zero.
    fn default() -> Self {
        Self {
            target_system: 1,
            target_component: 1,
            command: 0,
            confirmation: 0,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            param5: 0.0,
            param6: 0.0,
            param7: 0.0,
        }
    }
}

impl ProtocolMessage for CommandLong {
    fn type_name(&self) -> &'static str {
        "COMMAND_LONG"
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("target_system", FieldValue::UInt(self.target_system.into())),
            ("target_component", FieldValue::UInt(self.target_component.into())),
            ("command", FieldValue::UInt(self.command.into())),
            ("confirmation", FieldValue::UInt(self.confirmation.into())),
            ("param1", FieldValue::Float(self.param1.into())),
            ("param2", FieldValue::Float(self.param2.into())),
            ("param3", FieldValue::Float(self.param3.into())),
            ("param4", FieldValue::Float(self.param4.into())),
            ("param5", FieldValue::Float(self.param5.into())),
            ("param6", FieldValue::Float(self.param6.into())),
            ("param7", FieldValue::Float(self.param7.into())),
        ]
    }
}

/// COMMAND_ACK (#77).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandAck {
    pub command: u16,
    pub result: MavResult,
}

impl ProtocolMessage for CommandAck {
    fn type_name(&self) -> &'static str {
        "COMMAND_ACK"
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("command", FieldValue::UInt(self.command.into())),
            ("result", FieldValue::Enum(self.result.name())),
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MavMessage
// ────────────────────────────────────────────────────────────────────────────

/// Every message that can cross the vehicle link.
#[derive(Debug, Clone, PartialEq)]
pub enum MavMessage {
    Heartbeat(Heartbeat),
    SysStatus(SysStatus),
    Attitude(Attitude),
    GlobalPositionInt(GlobalPositionInt),
    StatusText(StatusText),
    CommandLong(CommandLong),
    CommandAck(CommandAck),
}

impl MavMessage {
    fn inner(&self) -> &dyn ProtocolMessage {
        match self {
            MavMessage::Heartbeat(m) => m,
            MavMessage::SysStatus(m) => m,
            MavMessage::Attitude(m) => m,
            MavMessage::GlobalPositionInt(m) => m,
            MavMessage::StatusText(m) => m,
            MavMessage::CommandLong(m) => m,
            MavMessage::CommandAck(m) => m,
        }
    }
}

impl ProtocolMessage for MavMessage {
    fn type_name(&self) -> &'static str {
        self.inner().type_name()
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        self.inner().fields()
    }
}

macro_rules! impl_from_message {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for MavMessage {
                fn from(m: $variant) -> Self {
                    MavMessage::$variant(m)
                }
            }
        )*
    };
}

impl_from_message!(
    Heartbeat,
    SysStatus,
    Attitude,
    GlobalPositionInt,
    StatusText,
    CommandLong,
    CommandAck,
);
