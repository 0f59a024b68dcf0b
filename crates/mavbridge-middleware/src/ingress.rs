//! Command ingress: bus payload → queued `COMMAND_LONG`.
//!
//! Runs on the bus transport's background context.  It parses, decodes and
//! enqueues; it never touches the vehicle link.  Anything that fails along
//! the way is logged and discarded, leaving the queue unchanged.

use std::sync::atomic::{AtomicU64, Ordering};

use mavbridge_types::{BridgeError, GenericValue, MavMessage};
use tracing::{debug, warn};

use crate::decoder::decode_command;
use crate::queue::CommandSender;
use crate::transport::BusMessageHandler;

#[derive(Debug)]
pub struct CommandIngress {
    queue: CommandSender,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl CommandIngress {
    pub fn new(queue: CommandSender) -> Self {
        Self {
            queue,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Payloads turned into queued commands.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Payloads discarded because they failed to parse, decode or enqueue.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn ingest(&self, payload: &[u8]) -> Result<u16, BridgeError> {
        let value = GenericValue::from_slice(payload)?;
        let command = decode_command(&value)?;
        let id = command.command;
        self.queue.enqueue(MavMessage::CommandLong(command))?;
        Ok(id)
    }
}

impl BusMessageHandler for CommandIngress {
    fn on_bus_message(&self, topic: &str, payload: &[u8]) {
        match self.ingest(payload) {
            Ok(command) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                debug!(topic = %topic, command, "command queued");
            }
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %topic, error = %e, "discarding bus command");
            }
        }
    }
}
