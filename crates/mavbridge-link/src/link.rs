//! Generic [`VehicleLink`] trait for anything that carries MAVLink frames.
//!
//! Implementations wrap a serial port, a UDP socket or a simulator.  The rest
//! of the bridge only talks to the trait, so links can be swapped without
//! touching the translation logic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use mavbridge_types::{BridgeError, MavMessage};

/// A single-owner connection to a vehicle.
///
/// Neither method may block: the owning context ticks the link cooperatively
/// alongside other duties.
pub trait VehicleLink: Send {
    /// Return the next decoded inbound message, or `Ok(None)` when nothing is
    /// pending right now.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Link`] when the underlying channel fails.
    fn try_recv(&mut self) -> Result<Option<MavMessage>, BridgeError>;

    /// Send `msg` to the vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Link`] when the frame cannot be written.
    fn send(&mut self, msg: &MavMessage) -> Result<(), BridgeError>;
}

/// Shared view of everything a [`RecordingLink`] was asked to send.
///
/// Cloneable so a test can keep a handle after the link itself has been
/// moved into its owner.
#[derive(Clone, Default, Debug)]
pub struct SentLog(Arc<Mutex<Vec<MavMessage>>>);

impl SentLog {
    /// Snapshot of the messages sent so far, oldest first.
    pub fn messages(&self) -> Vec<MavMessage> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, msg: MavMessage) {
        if let Ok(mut v) = self.0.lock() {
            v.push(msg);
        }
    }
}

/// In-memory link: inbound messages are scripted with
/// [`push_inbound`][Self::push_inbound], outbound sends land in a
/// [`SentLog`].
///
/// [`fail_next_sends`][Self::fail_next_sends] makes the next `n` sends return
/// [`BridgeError::Link`] without recording them.
#[derive(Default)]
pub struct RecordingLink {
    inbound: VecDeque<MavMessage>,
    sent: SentLog,
    failures_pending: usize,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `msg` to be returned by a later [`VehicleLink::try_recv`].
    pub fn push_inbound(&mut self, msg: impl Into<MavMessage>) {
        self.inbound.push_back(msg.into());
    }

    /// Handle onto the record of sent messages.
    pub fn sent(&self) -> SentLog {
        self.sent.clone()
    }

    /// Make the next `n` calls to [`VehicleLink::send`] fail.
    pub fn fail_next_sends(&mut self, n: usize) {
        self.failures_pending = n;
    }
}

impl VehicleLink for RecordingLink {
    fn try_recv(&mut self) -> Result<Option<MavMessage>, BridgeError> {
        Ok(self.inbound.pop_front())
    }

    fn send(&mut self, msg: &MavMessage) -> Result<(), BridgeError> {
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(BridgeError::Link("simulated write failure".to_string()));
        }
        self.sent.push(msg.clone());
        Ok(())
    }
}
