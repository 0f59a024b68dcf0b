//! `mavbridge-runtime` – the link-owning side of the bridge
//!
//! # Modules
//!
//! - [`pump`] – [`LinkPump`][pump::LinkPump]: sole owner of the vehicle link.
//!   Reads inbound messages and sends at most one queued command per call.
//! - [`bridge`] – [`Bridge`][bridge::Bridge]: the context that wires a link
//!   pump, a telemetry publisher, a bus session and the command queue
//!   together, driven by periodic [`tick`][bridge::Bridge::tick] calls.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to enable export.

pub mod bridge;
pub mod pump;
pub mod telemetry;

pub use bridge::{Bridge, BridgeStatus, MAX_INBOUND_PER_TICK, TickReport};
pub use pump::{LinkPump, PumpOutcome, PumpStats};
pub use telemetry::{TracerProviderGuard, init_tracing};
