//! [`Bridge`] – the explicit context tying one vehicle link to one bus.
//!
//! Owns the [`LinkPump`], the [`TelemetryPublisher`], the bus session, the
//! producer end of the command queue (inside [`CommandIngress`]) and the
//! runtime [`BridgeSettings`].  The owner drives it by calling
//! [`tick`][Bridge::tick] periodically; every vehicle read and write happens
//! inside that call.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mavbridge_link::SimVehicle;
//! use mavbridge_middleware::{BridgeSettings, RecordingBus};
//! use mavbridge_runtime::Bridge;
//!
//! let bus = Arc::new(RecordingBus::new());
//! let mut bridge = Bridge::new(Box::new(SimVehicle::new()), bus.clone(), BridgeSettings::default());
//!
//! bridge.tick();
//! assert!(bus.published().iter().any(|(topic, _)| topic == "ardupilot/gcs/HEARTBEAT"));
//! ```

use std::fmt;
use std::sync::Arc;

use mavbridge_link::VehicleLink;
use mavbridge_middleware::{
    BridgeSettings, BusSession, BusTransport, CommandIngress, ConnectionState, TelemetryPublisher,
    command_queue,
};
use mavbridge_types::BridgeError;
use tracing::{info, warn};

use crate::pump::{LinkPump, PumpOutcome};

/// Upper bound on inbound messages forwarded per tick.
pub const MAX_INBOUND_PER_TICK: usize = 64;

/// What one [`Bridge::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub forwarded: usize,
    pub pump: PumpOutcome,
}

/// Snapshot for `mqtt status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatus {
    pub state: ConnectionState,
    pub endpoint: String,
    pub queue_depth: usize,
    pub telemetry_published: u64,
    pub telemetry_failed: u64,
    pub commands_accepted: u64,
    pub commands_rejected: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "state       : {} ({})", self.state, self.endpoint)?;
        writeln!(f, "queue depth : {}", self.queue_depth)?;
        writeln!(
            f,
            "telemetry   : {} published, {} failed",
            self.telemetry_published, self.telemetry_failed
        )?;
        write!(
            f,
            "commands    : {} accepted, {} rejected, {} sent, {} dropped",
            self.commands_accepted, self.commands_rejected, self.commands_sent, self.commands_dropped
        )
    }
}

pub struct Bridge {
    pump: LinkPump,
    publisher: TelemetryPublisher,
    bus: Arc<dyn BusSession>,
    ingress: Arc<CommandIngress>,
    settings: BridgeSettings,
}

impl Bridge {
    pub fn new<B>(link: Box<dyn VehicleLink>, bus: Arc<B>, settings: BridgeSettings) -> Self
    where
        B: BusSession + 'static,
    {
        let (tx, rx) = command_queue();
        let transport: Arc<dyn BusTransport> = bus.clone();
        Self {
            pump: LinkPump::new(link, rx),
            publisher: TelemetryPublisher::new(transport, settings.prefix.clone()),
            bus,
            ingress: Arc::new(CommandIngress::new(tx)),
            settings,
        }
    }

    /// One unit of idle work: forward pending telemetry, then send at most
    /// one queued command.
    pub fn tick(&mut self) -> TickReport {
        let publisher = &mut self.publisher;
        let forwarded = self
            .pump
            .poll_inbound(MAX_INBOUND_PER_TICK, |m| publisher.on_inbound_message(m));
        let pump = self.pump.pump_once();
        TickReport { forwarded, pump }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Change a named setting.  A new `prefix` applies to the next published
    /// message; endpoint and topic changes apply on the next `connect`.
    ///
    /// # Errors
    ///
    /// Whatever [`BridgeSettings::set`] rejects.
    pub fn set_setting(&mut self, name: &str, value: &str) -> Result<(), BridgeError> {
        self.settings.set(name, value)?;
        if name == "prefix" {
            self.publisher.set_prefix(self.settings.prefix.clone());
        }
        info!(setting = name, value = self.settings.get(name).unwrap_or_default(), "setting updated");
        Ok(())
    }

    /// Open a bus session with the current settings.
    ///
    /// # Errors
    ///
    /// Whatever the bus session rejects, typically [`BridgeError::Config`].
    pub fn connect(&self) -> Result<(), BridgeError> {
        let handler = self.ingress.clone();
        self.bus.connect(&self.settings, handler).inspect_err(|e| {
            warn!(error = %e, endpoint = %self.settings.endpoint, "MQTT connect failed");
        })
    }

    pub fn disconnect(&self) {
        self.bus.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.bus.state()
    }

    pub fn status(&self) -> BridgeStatus {
        let published = self.publisher.counters();
        let pumped = self.pump.stats();
        BridgeStatus {
            state: self.bus.state(),
            endpoint: self.settings.endpoint.clone(),
            queue_depth: self.pump.queue_depth(),
            telemetry_published: published.published,
            telemetry_failed: published.failed,
            commands_accepted: self.ingress.accepted(),
            commands_rejected: self.ingress.rejected(),
            commands_sent: pumped.sent,
            commands_dropped: pumped.dropped,
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("pump", &self.pump)
            .field("publisher", &self.publisher)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavbridge_link::{RecordingLink, SimVehicle};
    use mavbridge_middleware::RecordingBus;
    use mavbridge_types::{CommandLong, Heartbeat, MavAutopilot, MavMessage, MavState, MavType};
    use std::time::Duration;

    fn heartbeat() -> Heartbeat {
        Heartbeat {
            mav_type: MavType::Quadrotor,
            autopilot: MavAutopilot::Ardupilotmega,
            base_mode: 0,
            custom_mode: 0,
            system_status: MavState::Standby,
            mavlink_version: 3,
        }
    }

    fn quiet_sim() -> SimVehicle {
        SimVehicle::new().with_telemetry_interval(Duration::from_secs(3600))
    }

    #[test]
    fn tick_forwards_inbound_telemetry() {
        let mut link = RecordingLink::new();
        link.push_inbound(heartbeat());
        let bus = Arc::new(RecordingBus::new());
        let mut bridge = Bridge::new(Box::new(link), bus.clone(), BridgeSettings::default());

        let report = bridge.tick();

        assert_eq!(report, TickReport { forwarded: 1, pump: PumpOutcome::Idle });
        assert_eq!(bus.published()[0].0, "ardupilot/gcs/HEARTBEAT");
    }

    #[test]
    fn bus_command_reaches_link_on_next_tick() {
        let link = RecordingLink::new();
        let sent = link.sent();
        let bus = Arc::new(RecordingBus::new());
        let mut bridge = Bridge::new(Box::new(link), bus.clone(), BridgeSettings::default());
        bridge.connect().unwrap();

        assert!(bus.deliver("ardupilot/cmd", br#"{"command": 400, "param1": 1}"#));
        assert!(sent.is_empty(), "nothing is sent outside a tick");

        assert_eq!(bridge.tick().pump, PumpOutcome::Sent);
        assert_eq!(
            sent.messages(),
            vec![MavMessage::CommandLong(CommandLong {
                command: 400,
                param1: 1.0,
                ..Default::default()
            })]
        );
    }

    #[test]
    fn each_tick_sends_at_most_one_command() {
        let link = RecordingLink::new();
        let sent = link.sent();
        let bus = Arc::new(RecordingBus::new());
        let mut bridge = Bridge::new(Box::new(link), bus.clone(), BridgeSettings::default());
        bridge.connect().unwrap();

        for _ in 0..3 {
            bus.deliver("ardupilot/cmd", br#"{"command": 20}"#);
        }
        bridge.tick();
        assert_eq!(sent.len(), 1);
        assert_eq!(bridge.status().queue_depth, 2);
    }

    #[test]
    fn prefix_setting_applies_to_next_message() {
        let mut link = RecordingLink::new();
        link.push_inbound(heartbeat());
        let bus = Arc::new(RecordingBus::new());
        let mut bridge = Bridge::new(Box::new(link), bus.clone(), BridgeSettings::default());

        bridge.set_setting("prefix", "fleet/7").unwrap();
        bridge.tick();
        assert_eq!(bus.published()[0].0, "fleet/7/HEARTBEAT");
    }

    #[test]
    fn unknown_setting_is_rejected() {
        let bus = Arc::new(RecordingBus::new());
        let mut bridge = Bridge::new(Box::new(RecordingLink::new()), bus, BridgeSettings::default());
        assert_eq!(
            bridge.set_setting("qos", "2"),
            Err(BridgeError::UnknownSetting("qos".to_string()))
        );
    }

    #[test]
    fn disconnected_bus_drops_telemetry_but_keeps_ticking() {
        let mut link = RecordingLink::new();
        link.push_inbound(heartbeat());
        link.push_inbound(heartbeat());
        let bus = Arc::new(RecordingBus::new());
        let mut bridge = Bridge::new(Box::new(link), bus.clone(), BridgeSettings::default());
        bridge.disconnect();

        assert_eq!(bridge.tick().forwarded, 2);
        let status = bridge.status();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.telemetry_failed, 2);
        assert!(bus.published().is_empty());
    }

    #[test]
    fn sim_round_trip_arms_vehicle_and_publishes_ack() {
        let bus = Arc::new(RecordingBus::new());
        let mut bridge = Bridge::new(Box::new(quiet_sim()), bus.clone(), BridgeSettings::default());
        bridge.connect().unwrap();

        bus.deliver("ardupilot/cmd", br#"{"command": 400, "param1": 1}"#);
        bridge.tick(); // send
        bridge.tick(); // forward the reply

        let topics: Vec<String> = bus.published().into_iter().map(|(t, _)| t).collect();
        assert!(topics.contains(&"ardupilot/gcs/COMMAND_ACK".to_string()), "{topics:?}");
        let status = bridge.status();
        assert_eq!(status.commands_accepted, 1);
        assert_eq!(status.commands_sent, 1);
    }

    #[test]
    fn malformed_bus_payload_is_counted_and_ignored() {
        let bus = Arc::new(RecordingBus::new());
        let mut bridge =
            Bridge::new(Box::new(RecordingLink::new()), bus.clone(), BridgeSettings::default());
        bridge.connect().unwrap();

        bus.deliver("ardupilot/cmd", b"arm now");
        assert_eq!(bridge.tick().pump, PumpOutcome::Idle);
        assert_eq!(bridge.status().commands_rejected, 1);
    }

    #[test]
    fn status_renders_every_counter() {
        let bus = Arc::new(RecordingBus::new());
        let bridge = Bridge::new(Box::new(RecordingLink::new()), bus, BridgeSettings::default());
        let text = bridge.status().to_string();
        assert!(text.contains("connected (localhost:1883)"));
        assert!(text.contains("queue depth : 0"));
        assert!(text.contains("0 accepted, 0 rejected, 0 sent, 0 dropped"));
    }
}
