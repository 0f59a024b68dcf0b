//! `mavbridge-link` – the vehicle side of the bridge.
//!
//! The bridge never speaks the MAVLink wire format itself.  It talks to a
//! [`VehicleLink`], which yields decoded [`MavMessage`][mavbridge_types::MavMessage]
//! values and accepts outbound ones.  A link is **not** thread-safe: exactly
//! one execution context owns it.
//!
//! # Modules
//!
//! - [`link`] – the [`VehicleLink`] trait and [`RecordingLink`], an in-memory
//!   link that records sends and can be told to fail.
//! - [`sim`] – [`SimVehicle`], a simulated ArduPilot quadrotor that streams
//!   telemetry and reacts to `COMMAND_LONG` for headless runs and tests.
//! - [`wire`] – [`MavlinkLink`], a live UDP/TCP/serial connection through the
//!   `mavlink` crate.

pub mod link;
pub mod sim;
pub mod wire;

pub use link::{RecordingLink, SentLog, VehicleLink};
pub use sim::SimVehicle;
pub use wire::MavlinkLink;
