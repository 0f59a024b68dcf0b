//! In-process simulated vehicle for running the bridge without hardware.
//!
//! [`SimVehicle`] behaves like a small ArduPilot quadrotor on the far end of
//! a link: every telemetry period it emits `HEARTBEAT`, `SYS_STATUS`,
//! `ATTITUDE` and `GLOBAL_POSITION_INT`, and it answers `COMMAND_LONG` with
//! `COMMAND_ACK` plus a `STATUSTEXT` describing what happened.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use mavbridge_link::{SimVehicle, VehicleLink};
//! use mavbridge_types::{CommandLong, MavMessage};
//!
//! let mut sim = SimVehicle::new()
//!     .with_system_id(1)
//!     .with_telemetry_interval(Duration::from_secs(3600));
//!
//! // Arm.
//! sim.send(&MavMessage::from(CommandLong {
//!     command: 400,
//!     param1: 1.0,
//!     ..Default::default()
//! }))
//! .expect("sim send must succeed");
//! assert!(sim.is_armed());
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use mavbridge_types::{
    Attitude, BridgeError, CommandAck, CommandLong, GlobalPositionInt, Heartbeat, MavAutopilot,
    MavMessage, MavResult, MavSeverity, MavState, MavType, StatusText, SysStatus,
};
use tracing::debug;

use crate::link::VehicleLink;

/// `MAV_CMD_NAV_RETURN_TO_LAUNCH`
pub const MAV_CMD_NAV_RETURN_TO_LAUNCH: u16 = 20;
/// `MAV_CMD_NAV_LAND`
pub const MAV_CMD_NAV_LAND: u16 = 21;
/// `MAV_CMD_NAV_TAKEOFF`
pub const MAV_CMD_NAV_TAKEOFF: u16 = 22;
/// `MAV_CMD_COMPONENT_ARM_DISARM`
pub const MAV_CMD_COMPONENT_ARM_DISARM: u16 = 400;

/// `MAV_MODE_FLAG_CUSTOM_MODE_ENABLED`
const MODE_FLAG_CUSTOM_MODE_ENABLED: u8 = 0x01;
/// `MAV_MODE_FLAG_SAFETY_ARMED`
const MODE_FLAG_SAFETY_ARMED: u8 = 0x80;

/// ArduCopter custom modes used by the simulator.
const COPTER_MODE_GUIDED: u32 = 4;
const COPTER_MODE_RTL: u32 = 6;
const COPTER_MODE_LAND: u32 = 9;

const DEFAULT_TELEMETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Home position (degE7) the simulator reports until it is moved.
const HOME_LAT: i32 = -353_632_610;
const HOME_LON: i32 = 1_491_652_300;
const HOME_ALT_MM: i32 = 584_000;

/// A simulated quadrotor.  Never fails.
pub struct SimVehicle {
    system_id: u8,
    component_id: u8,
    telemetry_interval: Duration,
    boot: Instant,
    next_telemetry: Instant,
    outbox: VecDeque<MavMessage>,
    armed: bool,
    custom_mode: u32,
    relative_alt_mm: i32,
    yaw: f32,
    battery_mv: u16,
}

impl Default for SimVehicle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimVehicle {
    /// Create a disarmed vehicle with system id 1, component id 1.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            system_id: 1,
            component_id: 1,
            telemetry_interval: DEFAULT_TELEMETRY_INTERVAL,
            boot: now,
            next_telemetry: now,
            outbox: VecDeque::new(),
            armed: false,
            custom_mode: 0,
            relative_alt_mm: 0,
            yaw: 0.0,
            battery_mv: 12_600,
        }
    }

    pub fn with_system_id(mut self, system_id: u8) -> Self {
        self.system_id = system_id;
        self
    }

    pub fn with_component_id(mut self, component_id: u8) -> Self {
        self.component_id = component_id;
        self
    }

    /// Period between telemetry bursts.  The first burst is due immediately.
    pub fn with_telemetry_interval(mut self, interval: Duration) -> Self {
        self.telemetry_interval = interval;
        self
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn custom_mode(&self) -> u32 {
        self.custom_mode
    }

    /// Altitude above home in millimetres.
    pub fn relative_alt_mm(&self) -> i32 {
        self.relative_alt_mm
    }

    fn time_boot_ms(&self) -> u32 {
        u32::try_from(self.boot.elapsed().as_millis()).unwrap_or(u32::MAX)
    }

    fn queue_telemetry(&mut self) {
        let time_boot_ms = self.time_boot_ms();
        let mut base_mode = MODE_FLAG_CUSTOM_MODE_ENABLED;
        if self.armed {
            base_mode |= MODE_FLAG_SAFETY_ARMED;
        }

        self.yaw = (self.yaw + 0.01) % std::f32::consts::TAU;
        if self.armed {
            self.battery_mv = self.battery_mv.saturating_sub(1);
        }

        self.outbox.push_back(
            Heartbeat {
                mav_type: MavType::Quadrotor,
                autopilot: MavAutopilot::Ardupilotmega,
                base_mode,
                custom_mode: self.custom_mode,
                system_status: if self.armed {
                    MavState::Active
                } else {
                    MavState::Standby
                },
                mavlink_version: 3,
            }
            .into(),
        );
        self.outbox.push_back(
            SysStatus {
                onboard_control_sensors_present: 0x0020_fc2f,
                onboard_control_sensors_enabled: 0x0020_fc2f,
                onboard_control_sensors_health: 0x0020_fc2f,
                load: 120,
                voltage_battery: self.battery_mv,
                current_battery: if self.armed { 1_250 } else { 0 },
                battery_remaining: 100,
                drop_rate_comm: 0,
                errors_comm: 0,
            }
            .into(),
        );
        self.outbox.push_back(
            Attitude {
                time_boot_ms,
                roll: 0.0,
                pitch: 0.0,
                yaw: self.yaw,
                rollspeed: 0.0,
                pitchspeed: 0.0,
                yawspeed: 0.0,
            }
            .into(),
        );
        self.outbox.push_back(
            GlobalPositionInt {
                time_boot_ms,
                lat: HOME_LAT,
                lon: HOME_LON,
                alt: HOME_ALT_MM + self.relative_alt_mm,
                relative_alt: self.relative_alt_mm,
                vx: 0,
                vy: 0,
                vz: 0,
                // Yaw in [0, TAU) maps onto [0, 36000) cdeg.
                hdg: (self.yaw.to_degrees() * 100.0) as u16,
            }
            .into(),
        );
    }

    fn acknowledge(&mut self, command: u16, result: MavResult, text: impl Into<String>) {
        self.outbox
            .push_back(CommandAck { command, result }.into());
        let severity = if result == MavResult::Accepted {
            MavSeverity::Info
        } else {
            MavSeverity::Warning
        };
        self.outbox.push_back(
            StatusText {
                severity,
                text: text.into(),
            }
            .into(),
        );
    }

    fn handle_command(&mut self, cmd: &CommandLong) {
        // 0 is the MAVLink broadcast address.
        let for_system = cmd.target_system == 0 || cmd.target_system == self.system_id;
        let for_component = cmd.target_component == 0 || cmd.target_component == self.component_id;
        if !(for_system && for_component) {
            debug!(
                target_system = cmd.target_system,
                target_component = cmd.target_component,
                "sim: command addressed elsewhere, ignoring"
            );
            return;
        }

        match cmd.command {
            MAV_CMD_COMPONENT_ARM_DISARM => {
                self.armed = cmd.param1 >= 0.5;
                let text = if self.armed { "Arming motors" } else { "Disarming motors" };
                self.acknowledge(cmd.command, MavResult::Accepted, text);
            }
            MAV_CMD_NAV_TAKEOFF if !self.armed => {
                self.acknowledge(cmd.command, MavResult::Denied, "Takeoff refused: not armed");
            }
            MAV_CMD_NAV_TAKEOFF => {
                self.custom_mode = COPTER_MODE_GUIDED;
                self.relative_alt_mm = (cmd.param7.max(0.0) * 1000.0) as i32;
                self.acknowledge(cmd.command, MavResult::Accepted, "Takeoff started");
            }
            MAV_CMD_NAV_LAND => {
                self.custom_mode = COPTER_MODE_LAND;
                self.relative_alt_mm = 0;
                self.armed = false;
                self.acknowledge(cmd.command, MavResult::Accepted, "Landed");
            }
            MAV_CMD_NAV_RETURN_TO_LAUNCH => {
                self.custom_mode = COPTER_MODE_RTL;
                self.acknowledge(cmd.command, MavResult::Accepted, "Returning to launch");
            }
            other => {
                self.acknowledge(
                    other,
                    MavResult::Unsupported,
                    format!("Unsupported command {other}"),
                );
            }
        }
    }
}

impl VehicleLink for SimVehicle {
    fn try_recv(&mut self) -> Result<Option<MavMessage>, BridgeError> {
        let now = Instant::now();
        if self.outbox.is_empty() && now >= self.next_telemetry {
            self.queue_telemetry();
            self.next_telemetry = now + self.telemetry_interval;
        }
        Ok(self.outbox.pop_front())
    }

    fn send(&mut self, msg: &MavMessage) -> Result<(), BridgeError> {
        match msg {
            MavMessage::CommandLong(cmd) => self.handle_command(cmd),
            other => debug!(kind = ?other, "sim: ignoring non-command message"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavbridge_types::ProtocolMessage;

    fn quiet_sim() -> SimVehicle {
        SimVehicle::new().with_telemetry_interval(Duration::from_secs(3600))
    }

    fn drain(sim: &mut SimVehicle) -> Vec<MavMessage> {
        let mut out = Vec::new();
        while let Some(m) = sim.try_recv().unwrap() {
            out.push(m);
        }
        out
    }

    #[test]
    fn first_poll_emits_telemetry_burst() {
        let mut sim = quiet_sim();
        let names: Vec<&str> = drain(&mut sim).iter().map(|m| m.type_name()).collect();
        assert_eq!(
            names,
            vec!["HEARTBEAT", "SYS_STATUS", "ATTITUDE", "GLOBAL_POSITION_INT"]
        );
    }

    #[test]
    fn no_second_burst_before_interval() {
        let mut sim = quiet_sim();
        drain(&mut sim);
        assert!(sim.try_recv().unwrap().is_none());
    }

    #[test]
    fn arm_command_is_acknowledged() {
        let mut sim = quiet_sim();
        drain(&mut sim);

        sim.send(
            &CommandLong {
                command: MAV_CMD_COMPONENT_ARM_DISARM,
                param1: 1.0,
                ..Default::default()
            }
            .into(),
        )
        .unwrap();

        assert!(sim.is_armed());
        let replies = drain(&mut sim);
        assert!(matches!(
            &replies[0],
            MavMessage::CommandAck(CommandAck { command: 400, result: MavResult::Accepted })
        ));
        assert!(matches!(&replies[1], MavMessage::StatusText(t) if t.text == "Arming motors"));
    }

    #[test]
    fn takeoff_requires_arming() {
        let mut sim = quiet_sim();
        drain(&mut sim);
        sim.send(
            &CommandLong {
                command: MAV_CMD_NAV_TAKEOFF,
                param7: 10.0,
                ..Default::default()
            }
            .into(),
        )
        .unwrap();

        let replies = drain(&mut sim);
        assert!(matches!(
            &replies[0],
            MavMessage::CommandAck(CommandAck { result: MavResult::Denied, .. })
        ));
        assert_eq!(sim.relative_alt_mm(), 0);
    }

    #[test]
    fn takeoff_after_arming_climbs() {
        let mut sim = quiet_sim();
        for cmd in [
            CommandLong {
                command: MAV_CMD_COMPONENT_ARM_DISARM,
                param1: 1.0,
                ..Default::default()
            },
            CommandLong {
                command: MAV_CMD_NAV_TAKEOFF,
                param7: 12.5,
                ..Default::default()
            },
        ] {
            sim.send(&cmd.into()).unwrap();
        }
        assert_eq!(sim.relative_alt_mm(), 12_500);
        assert_eq!(sim.custom_mode(), COPTER_MODE_GUIDED);
    }

    #[test]
    fn command_for_other_system_is_ignored() {
        let mut sim = quiet_sim().with_system_id(7);
        drain(&mut sim);
        sim.send(
            &CommandLong {
                target_system: 3,
                command: MAV_CMD_COMPONENT_ARM_DISARM,
                param1: 1.0,
                ..Default::default()
            }
            .into(),
        )
        .unwrap();
        assert!(!sim.is_armed());
        assert!(drain(&mut sim).is_empty());
    }

    #[test]
    fn unknown_command_reports_unsupported() {
        let mut sim = quiet_sim();
        drain(&mut sim);
        sim.send(
            &CommandLong {
                command: 31_000,
                ..Default::default()
            }
            .into(),
        )
        .unwrap();
        let replies = drain(&mut sim);
        assert!(matches!(
            &replies[0],
            MavMessage::CommandAck(CommandAck { command: 31_000, result: MavResult::Unsupported })
        ));
    }
}
