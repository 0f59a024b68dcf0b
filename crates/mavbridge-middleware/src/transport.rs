//! The bus seam.
//!
//! The bridge never talks to an MQTT client directly.  Telemetry goes out
//! through a [`BusTransport`]; inbound bus traffic arrives through a
//! [`BusMessageHandler`] that the transport calls from its own background
//! context.
//!
//! [`BusSession`] adds the connection lifecycle on top of [`BusTransport`].
//!
//! - [`MqttBus`][crate::mqtt::MqttBus] – the real transport (rumqttc).
//! - [`RecordingBus`] – in-memory transport for tests and dry runs.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use mavbridge_types::BridgeError;

use crate::settings::BridgeSettings;

/// Outbound side of a topic-based broker transport.
pub trait BusTransport: Send + Sync {
    /// Publish `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotConnected`] when there is no session and
    /// [`BridgeError::Transport`] when the client rejects the request.
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError>;
}

/// Inbound side: invoked by the transport for every received message.
///
/// Runs on the transport's background context, so implementations must not
/// block and must not touch the vehicle link.
pub trait BusMessageHandler: Send + Sync {
    fn on_bus_message(&self, topic: &str, payload: &[u8]);
}

/// A transport with a connect/disconnect lifecycle.
pub trait BusSession: BusTransport {
    /// Start a session using `settings`, delivering inbound messages on the
    /// configured subscribe topic to `handler`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] when the settings cannot describe a session.
    fn connect(
        &self,
        settings: &BridgeSettings,
        handler: Arc<dyn BusMessageHandler>,
    ) -> Result<(), BridgeError>;

    fn disconnect(&self);

    fn state(&self) -> ConnectionState;
}

/// Lifecycle of a bus session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// [`ConnectionState`] readable and writable from any thread.
#[derive(Debug)]
pub struct SharedConnectionState(AtomicU8);

impl Default for SharedConnectionState {
    fn default() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected.as_u8()))
    }
}

impl SharedConnectionState {
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: ConnectionState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }
}

/// In-memory [`BusSession`] that records every publish.
///
/// Starts connected.  [`set_connected(false)`][Self::set_connected] makes
/// publishes fail with [`BridgeError::NotConnected`];
/// [`fail_next_publishes`][Self::fail_next_publishes] injects transport
/// errors.  Failed publishes are still counted in
/// [`attempts`][Self::attempts].  [`deliver`][Self::deliver] plays the
/// broker, handing a message to whatever handler `connect` installed.
pub struct RecordingBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    attempts: Mutex<Vec<String>>,
    connected: AtomicBool,
    failures_pending: AtomicU8,
    handler: Mutex<Option<Arc<dyn BusMessageHandler>>>,
}

impl Default for RecordingBus {
    fn default() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            failures_pending: AtomicU8::new(0),
            handler: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for RecordingBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingBus")
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .field("published", &self.published().len())
            .finish_non_exhaustive()
    }
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_next_publishes(&self, n: u8) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Successful publishes, oldest first.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Topics of every publish attempt, successful or not.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Hand `payload` to the installed handler.  Returns `false` when no
    /// session is open.
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> bool {
        let handler = self.handler.lock().ok().and_then(|h| h.clone());
        match handler {
            Some(handler) => {
                handler.on_bus_message(topic, payload);
                true
            }
            None => false,
        }
    }
}

impl BusSession for RecordingBus {
    fn connect(
        &self,
        settings: &BridgeSettings,
        handler: Arc<dyn BusMessageHandler>,
    ) -> Result<(), BridgeError> {
        settings.broker_address()?;
        *self
            .handler
            .lock()
            .map_err(|e| BridgeError::Transport(e.to_string()))? = Some(handler);
        self.set_connected(true);
        Ok(())
    }

    fn disconnect(&self) {
        if let Ok(mut handler) = self.handler.lock() {
            *handler = None;
        }
        self.set_connected(false);
    }

    fn state(&self) -> ConnectionState {
        if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

impl BusTransport for RecordingBus {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(topic.to_string());
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BridgeError::NotConnected);
        }
        let poisoned = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if poisoned {
            return Err(BridgeError::Transport("simulated publish rejection".to_string()));
        }
        self.published
            .lock()
            .map_err(|e| BridgeError::Transport(e.to_string()))?
            .push((topic.to_string(), payload));
        Ok(())
    }
}
