//! `mavbridge-middleware` – bus side of the bridge
//!
//! Everything between a typed vehicle message and an MQTT broker.
//!
//! # Modules
//!
//! - [`encoder`] – typed message → [`GenericValue`][mavbridge_types::GenericValue]
//!   mapping, recursing into nested messages.
//! - [`decoder`] – generic bus payload → `COMMAND_LONG`, with defaults for
//!   absent keys.
//! - [`queue`] – the thread-safe FIFO that carries decoded commands from the
//!   bus context to the link-owning context.
//! - [`transport`] – [`BusTransport`] / [`BusSession`] / [`BusMessageHandler`]
//!   seam plus the in-memory [`RecordingBus`].
//! - [`mqtt`] – [`MqttBus`], the `rumqttc` implementation of the seam.
//! - [`publisher`] – [`TelemetryPublisher`]: encode, serialize, publish on
//!   `<prefix>/<TYPE>`.
//! - [`ingress`] – [`CommandIngress`]: parse, decode, enqueue.
//! - [`settings`] – [`BridgeSettings`], the runtime-mutable named settings.

pub mod decoder;
pub mod encoder;
pub mod ingress;
pub mod mqtt;
pub mod publisher;
pub mod queue;
pub mod settings;
pub mod transport;

pub use decoder::decode_command;
pub use encoder::{encode, encode_message};
pub use ingress::CommandIngress;
pub use mqtt::MqttBus;
pub use publisher::{PublishCounters, TelemetryPublisher, topic_for};
pub use queue::{CommandReceiver, CommandSender, command_queue};
pub use settings::{BridgeSettings, SETTING_NAMES};
pub use transport::{
    BusMessageHandler, BusSession, BusTransport, ConnectionState, RecordingBus,
    SharedConnectionState,
};
