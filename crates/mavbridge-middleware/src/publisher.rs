//! Telemetry publisher: vehicle message → bus topic.
//!
//! Every inbound MAVLink message is encoded with
//! [`encode_message`][crate::encoder::encode_message], serialized to JSON and
//! published on `<prefix>/<MESSAGE_TYPE>`.  Publish failures are logged and
//! counted; they never reach the caller, so one bad message cannot stop the
//! stream.

use std::sync::Arc;

use mavbridge_types::{BridgeError, ProtocolMessage};
use tracing::{debug, trace, warn};

use crate::encoder::encode_message;
use crate::transport::BusTransport;

/// Topic a message of type `type_name` is published on.
pub fn topic_for(prefix: &str, type_name: &str) -> String {
    format!("{prefix}/{type_name}")
}

/// Running totals for `mqtt status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishCounters {
    pub published: u64,
    pub failed: u64,
}

pub struct TelemetryPublisher {
    bus: Arc<dyn BusTransport>,
    prefix: String,
    counters: PublishCounters,
}

impl TelemetryPublisher {
    pub fn new(bus: Arc<dyn BusTransport>, prefix: impl Into<String>) -> Self {
        Self {
            bus,
            prefix: prefix.into(),
            counters: PublishCounters::default(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Takes effect from the next published message.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub fn counters(&self) -> PublishCounters {
        self.counters
    }

    /// Forward one vehicle message to the bus.
    pub fn on_inbound_message(&mut self, message: &dyn ProtocolMessage) {
        let topic = topic_for(&self.prefix, message.type_name());
        match self.publish(&topic, message) {
            Ok(()) => {
                self.counters.published += 1;
                trace!(topic = %topic, "telemetry published");
            }
            Err(BridgeError::NotConnected) => {
                self.counters.failed += 1;
                debug!(topic = %topic, "bus not connected; telemetry dropped");
            }
            Err(e) => {
                self.counters.failed += 1;
                warn!(topic = %topic, error = %e, "telemetry publish failed");
            }
        }
    }

    fn publish(&self, topic: &str, message: &dyn ProtocolMessage) -> Result<(), BridgeError> {
        let payload = encode_message(message).to_json_string()?;
        self.bus.publish(topic, payload.into_bytes())
    }
}

impl std::fmt::Debug for TelemetryPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPublisher")
            .field("prefix", &self.prefix)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}
