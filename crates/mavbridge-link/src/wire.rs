//! [`MavlinkLink`] – a real vehicle connection through the `mavlink` crate.
//!
//! The connection string is handed to [`mavlink::connect`] untouched, so
//! every transport it knows works here:
//!
//! | Address | Meaning |
//! |---|---|
//! | `udpin:0.0.0.0:14550` | listen for a vehicle or SITL streaming UDP |
//! | `udpout:192.168.1.10:14550` | send to a known vehicle address |
//! | `tcpout:127.0.0.1:5760` | connect to SITL's TCP port |
//! | `serial:/dev/ttyACM0:115200` | direct serial / USB telemetry radio |
//!
//! `mavlink`'s `recv` blocks, so a reader thread owns the receive side and
//! hands decoded frames to [`try_recv`][VehicleLink::try_recv] through a
//! channel.  Sends happen on the caller's context, which keeps the link
//! single-owner from the bridge's point of view.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use mavlink::common::{self as wire, MavModeFlag};
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader};
use num_traits::FromPrimitive;
use tracing::{debug, info, warn};

use mavbridge_types::{
    Attitude, BridgeError, CommandAck, CommandLong, GlobalPositionInt, Heartbeat, MavAutopilot,
    MavMessage, MavResult, MavSeverity, MavState, MavType, ProtocolMessage, StatusText, SysStatus,
};

use crate::link::VehicleLink;

/// Ground station identity used when none is configured.
pub const DEFAULT_SOURCE_SYSTEM: u8 = 255;
/// `MAV_COMP_ID_MISSIONPLANNER`
pub const DEFAULT_SOURCE_COMPONENT: u8 = 190;

type Connection = dyn MavConnection<wire::MavMessage> + Send + Sync;

/// A [`VehicleLink`] over a live MAVLink connection.
pub struct MavlinkLink {
    address: String,
    connection: Arc<Connection>,
    inbound: Receiver<MavMessage>,
    stop: Arc<AtomicBool>,
    header: MavHeader,
    reader_gone: bool,
}

impl MavlinkLink {
    /// Open `address` and start the reader thread.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Link`] when the address is malformed or the transport
    /// cannot be opened.
    pub fn connect(address: &str) -> Result<Self, BridgeError> {
        let connection: Arc<Connection> = Arc::from(
            mavlink::connect::<wire::MavMessage>(address)
                .map_err(|e| BridgeError::Link(format!("cannot open '{address}': {e}")))?,
        );

        let (tx, inbound) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let reader_conn = connection.clone();
        let reader_stop = stop.clone();
        let reader_addr = address.to_string();
        thread::Builder::new()
            .name("mavbridge-link-rx".to_string())
            .spawn(move || read_frames(&reader_addr, reader_conn.as_ref(), &tx, &reader_stop))
            .map_err(|e| BridgeError::Link(format!("cannot start link reader: {e}")))?;

        info!(address = %address, "vehicle link open");
        Ok(Self {
            address: address.to_string(),
            connection,
            inbound,
            stop,
            header: MavHeader {
                system_id: DEFAULT_SOURCE_SYSTEM,
                component_id: DEFAULT_SOURCE_COMPONENT,
                sequence: 0,
            },
            reader_gone: false,
        })
    }

    /// Set the system/component id stamped on outbound frames.
    pub fn with_source(mut self, system_id: u8, component_id: u8) -> Self {
        self.header.system_id = system_id;
        self.header.component_id = component_id;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl VehicleLink for MavlinkLink {
    fn try_recv(&mut self) -> Result<Option<MavMessage>, BridgeError> {
        if self.reader_gone {
            return Ok(None);
        }
        match self.inbound.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                // Report once; afterwards the link is just quiet.
                self.reader_gone = true;
                Err(BridgeError::Link(format!("connection '{}' closed", self.address)))
            }
        }
    }

    fn send(&mut self, msg: &MavMessage) -> Result<(), BridgeError> {
        let frame = to_wire(msg)?;
        self.connection
            .send(&self.header, &frame)
            .map_err(|e| BridgeError::Link(format!("write to '{}' failed: {e}", self.address)))?;
        self.header.sequence = self.header.sequence.wrapping_add(1);
        Ok(())
    }
}

impl Drop for MavlinkLink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for MavlinkLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MavlinkLink")
            .field("address", &self.address)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

fn read_frames(
    address: &str,
    connection: &Connection,
    tx: &mpsc::Sender<MavMessage>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::Relaxed) {
        match connection.recv() {
            Ok((header, frame)) => {
                let Some(message) = from_wire(&frame) else {
                    continue;
                };
                if tx.send(message).is_err() {
                    break;
                }
                debug!(system = header.system_id, component = header.component_id, "frame received");
            }
            Err(MessageReadError::Parse(e)) => debug!(error = ?e, "skipping undecodable frame"),
            Err(MessageReadError::Io(e))
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(MessageReadError::Io(e)) => {
                warn!(address = %address, error = %e, "vehicle link read failed; reader stopping");
                break;
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire ↔ bridge translation
// ────────────────────────────────────────────────────────────────────────────

/// Translate an outbound bridge message into its wire form.
///
/// Only `COMMAND_LONG` travels towards the vehicle.
pub fn to_wire(msg: &MavMessage) -> Result<wire::MavMessage, BridgeError> {
    match msg {
        MavMessage::CommandLong(c) => {
            let command = wire::MavCmd::from_u16(c.command).ok_or_else(|| {
                BridgeError::Link(format!("MAV_CMD {} is not in the common dialect", c.command))
            })?;
            Ok(wire::MavMessage::COMMAND_LONG(wire::COMMAND_LONG_DATA {
                param1: c.param1,
                param2: c.param2,
                param3: c.param3,
                param4: c.param4,
                param5: c.param5,
                param6: c.param6,
                param7: c.param7,
                command,
                target_system: c.target_system,
                target_component: c.target_component,
                confirmation: c.confirmation,
            }))
        }
        other => Err(BridgeError::Link(format!(
            "{} is not sent to the vehicle",
            other.type_name()
        ))),
    }
}

/// Translate an inbound wire frame.  Frames the bridge has no type for
/// yield `None`.
pub fn from_wire(frame: &wire::MavMessage) -> Option<MavMessage> {
    let message = match frame {
        wire::MavMessage::HEARTBEAT(hb) => Heartbeat {
            mav_type: mav_type(hb.mavtype),
            autopilot: autopilot(hb.autopilot),
            base_mode: mode_bits(hb.base_mode),
            custom_mode: hb.custom_mode,
            system_status: mav_state(hb.system_status),
            mavlink_version: hb.mavlink_version,
        }
        .into(),
        wire::MavMessage::SYS_STATUS(s) => SysStatus {
            onboard_control_sensors_present: s.onboard_control_sensors_present.bits(),
            onboard_control_sensors_enabled: s.onboard_control_sensors_enabled.bits(),
            onboard_control_sensors_health: s.onboard_control_sensors_health.bits(),
            load: s.load,
            voltage_battery: s.voltage_battery,
            current_battery: s.current_battery,
            battery_remaining: s.battery_remaining,
            drop_rate_comm: s.drop_rate_comm,
            errors_comm: s.errors_comm,
        }
        .into(),
        wire::MavMessage::ATTITUDE(a) => Attitude {
            time_boot_ms: a.time_boot_ms,
            roll: a.roll,
            pitch: a.pitch,
            yaw: a.yaw,
            rollspeed: a.rollspeed,
            pitchspeed: a.pitchspeed,
            yawspeed: a.yawspeed,
        }
        .into(),
        wire::MavMessage::GLOBAL_POSITION_INT(p) => GlobalPositionInt {
            time_boot_ms: p.time_boot_ms,
            lat: p.lat,
            lon: p.lon,
            alt: p.alt,
            relative_alt: p.relative_alt,
            vx: p.vx,
            vy: p.vy,
            vz: p.vz,
            hdg: p.hdg,
        }
        .into(),
        wire::MavMessage::STATUSTEXT(t) => StatusText {
            severity: severity(t.severity),
            text: text_from_wire(&t.text),
        }
        .into(),
        wire::MavMessage::COMMAND_LONG(c) => CommandLong {
            target_system: c.target_system,
            target_component: c.target_component,
            command: c.command as u16,
            confirmation: c.confirmation,
            param1: c.param1,
            param2: c.param2,
            param3: c.param3,
            param4: c.param4,
            param5: c.param5,
            param6: c.param6,
            param7: c.param7,
        }
        .into(),
        wire::MavMessage::COMMAND_ACK(ack) => CommandAck {
            command: ack.command as u16,
            result: mav_result(ack.result),
        }
        .into(),
        _ => return None,
    };
    Some(message)
}

/// STATUSTEXT carries a NUL-padded, possibly unterminated, 50-byte field.
fn text_from_wire(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn mode_bits(flags: MavModeFlag) -> u8 {
    flags.bits()
}

fn mav_type(t: wire::MavType) -> MavType {
    use wire::MavType as W;
    match t {
        W::MAV_TYPE_FIXED_WING => MavType::FixedWing,
        W::MAV_TYPE_QUADROTOR => MavType::Quadrotor,
        W::MAV_TYPE_HELICOPTER => MavType::Helicopter,
        W::MAV_TYPE_GCS => MavType::Gcs,
        W::MAV_TYPE_GROUND_ROVER => MavType::GroundRover,
        W::MAV_TYPE_SURFACE_BOAT => MavType::SurfaceBoat,
        W::MAV_TYPE_SUBMARINE => MavType::Submarine,
        _ => MavType::Generic,
    }
}

fn autopilot(a: wire::MavAutopilot) -> MavAutopilot {
    use wire::MavAutopilot as W;
    match a {
        W::MAV_AUTOPILOT_ARDUPILOTMEGA => MavAutopilot::Ardupilotmega,
        W::MAV_AUTOPILOT_PX4 => MavAutopilot::Px4,
        W::MAV_AUTOPILOT_INVALID => MavAutopilot::Invalid,
        _ => MavAutopilot::Generic,
    }
}

fn mav_state(s: wire::MavState) -> MavState {
    use wire::MavState as W;
    match s {
        W::MAV_STATE_BOOT => MavState::Boot,
        W::MAV_STATE_CALIBRATING => MavState::Calibrating,
        W::MAV_STATE_STANDBY => MavState::Standby,
        W::MAV_STATE_ACTIVE => MavState::Active,
        W::MAV_STATE_CRITICAL => MavState::Critical,
        W::MAV_STATE_EMERGENCY => MavState::Emergency,
        W::MAV_STATE_POWEROFF => MavState::Poweroff,
        _ => MavState::Uninit,
    }
}

fn severity(s: wire::MavSeverity) -> MavSeverity {
    use wire::MavSeverity as W;
    match s {
        W::MAV_SEVERITY_EMERGENCY => MavSeverity::Emergency,
        W::MAV_SEVERITY_ALERT => MavSeverity::Alert,
        W::MAV_SEVERITY_CRITICAL => MavSeverity::Critical,
        W::MAV_SEVERITY_ERROR => MavSeverity::Error,
        W::MAV_SEVERITY_WARNING => MavSeverity::Warning,
        W::MAV_SEVERITY_NOTICE => MavSeverity::Notice,
        W::MAV_SEVERITY_INFO => MavSeverity::Info,
        _ => MavSeverity::Debug,
    }
}

fn mav_result(r: wire::MavResult) -> MavResult {
    use wire::MavResult as W;
    match r {
        W::MAV_RESULT_ACCEPTED => MavResult::Accepted,
        W::MAV_RESULT_TEMPORARILY_REJECTED => MavResult::TemporarilyRejected,
        W::MAV_RESULT_DENIED => MavResult::Denied,
        W::MAV_RESULT_UNSUPPORTED => MavResult::Unsupported,
        W::MAV_RESULT_IN_PROGRESS => MavResult::InProgress,
        _ => MavResult::Failed,
    }
}
