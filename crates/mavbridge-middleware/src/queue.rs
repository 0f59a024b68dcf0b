//! Inbound command queue: the only state shared between the bus context and
//! the link-owning context.
//!
//! Built on [`tokio::sync::mpsc::unbounded_channel`]:
//!
//! * [`CommandSender::enqueue`] never blocks and never waits for the consumer.
//! * [`CommandReceiver::try_dequeue`] returns `None` immediately when empty.
//! * Order of delivery matches order of enqueue; nothing is lost or
//!   duplicated.
//!
//! The receiver is not `Clone`, so there is exactly one consumer.

use mavbridge_types::{BridgeError, MavMessage};
use tokio::sync::mpsc;

/// Create a connected sender/receiver pair.
pub fn command_queue() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Producer half.  Cheap to clone.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<MavMessage>,
}

impl CommandSender {
    /// Append `msg` to the queue.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::QueueClosed`] once the receiver has been
    /// dropped.
    pub fn enqueue(&self, msg: MavMessage) -> Result<(), BridgeError> {
        self.tx.send(msg).map_err(|_| BridgeError::QueueClosed)
    }
}

/// Consumer half, owned by the link pump.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<MavMessage>,
}

impl CommandReceiver {
    /// Take the oldest queued message, if any.
    pub fn try_dequeue(&mut self) -> Option<MavMessage> {
        self.rx.try_recv().ok()
    }

    /// Number of messages waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
