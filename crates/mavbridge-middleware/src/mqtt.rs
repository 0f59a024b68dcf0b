//! MQTT transport built on [`rumqttc`].
//!
//! [`MqttBus`] implements [`BusSession`]: `connect` creates a client, spawns
//! the event loop on the tokio runtime and returns immediately.  The
//! background task drives the session:
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──CONNACK──▶ Connected
//!       ▲                        │                      │
//!       └──── error / refused ───┴──── error / disconnect ┘
//! ```
//!
//! On CONNACK the task subscribes to the configured command topic; every
//! PUBLISH that arrives afterwards is handed to the [`BusMessageHandler`].
//! A lost session is not re-established automatically; run `connect` again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mavbridge_types::BridgeError;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, Outgoing, Packet,
    QoS,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::settings::BridgeSettings;
use crate::transport::{
    BusMessageHandler, BusSession, BusTransport, ConnectionState, SharedConnectionState,
};

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 64;
const KEEP_ALIVE: Duration = Duration::from_secs(30);

struct Session {
    client: AsyncClient,
    task: JoinHandle<()>,
}

pub struct MqttBus {
    runtime: Handle,
    state: Arc<SharedConnectionState>,
    session: Mutex<Option<Session>>,
    /// Bumped on every connect; a task only reports state for its own session.
    generation: Arc<AtomicU64>,
}

impl MqttBus {
    /// Create a disconnected bus whose background work runs on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            state: Arc::new(SharedConnectionState::default()),
            session: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl BusTransport for MqttBus {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError> {
        if self.state.get() != ConnectionState::Connected {
            return Err(BridgeError::NotConnected);
        }
        let session = self
            .session
            .lock()
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        let session = session.as_ref().ok_or(BridgeError::NotConnected)?;
        session
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }
}

impl BusSession for MqttBus {
    /// Open a session to the broker named in `settings`.
    ///
    /// An existing session is closed first.  Returns as soon as the
    /// connection attempt is under way; watch [`state`][Self::state] for the
    /// outcome.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] when the endpoint cannot be parsed.
    fn connect(
        &self,
        settings: &BridgeSettings,
        handler: Arc<dyn BusMessageHandler>,
    ) -> Result<(), BridgeError> {
        let (host, port) = settings.broker_address()?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        if let Some(old) = session.take() {
            warn!("replacing existing MQTT session");
            close(old);
        }

        let mut options = MqttOptions::new(settings.name.clone(), host.clone(), port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.set(ConnectionState::Connecting);
        info!(host = %host, port, client_id = %settings.name, "connecting to MQTT broker");

        let task = self.runtime.spawn(drive_session(SessionTask {
            client: client.clone(),
            eventloop,
            subscribe_topic: settings.subscribe_topic.clone(),
            handler,
            state: self.state.clone(),
            generation,
            current: self.generation.clone(),
        }));

        *session = Some(Session { client, task });
        Ok(())
    }

    /// Close the current session, if any.
    fn disconnect(&self) {
        let old = match self.session.lock() {
            Ok(mut session) => session.take(),
            Err(e) => {
                warn!(error = %e, "MQTT session lock poisoned");
                None
            }
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.set(ConnectionState::Disconnected);
        match old {
            Some(old) => {
                close(old);
                info!("MQTT session closed");
            }
            None => debug!("disconnect requested with no MQTT session"),
        }
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        if let Ok(mut session) = self.session.lock() {
            if let Some(old) = session.take() {
                close(old);
            }
        }
    }
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// The task exits on its own once DISCONNECT is written; it is aborted only
/// when the request cannot be queued.
fn close(session: Session) {
    if let Err(e) = session.client.try_disconnect() {
        debug!(error = %e, "MQTT disconnect request not delivered");
        session.task.abort();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Event loop task
// ────────────────────────────────────────────────────────────────────────────

struct SessionTask {
    client: AsyncClient,
    eventloop: EventLoop,
    subscribe_topic: String,
    handler: Arc<dyn BusMessageHandler>,
    state: Arc<SharedConnectionState>,
    generation: u64,
    current: Arc<AtomicU64>,
}

impl SessionTask {
    fn report(&self, state: ConnectionState) {
        if self.current.load(Ordering::SeqCst) == self.generation {
            self.state.set(state);
        }
    }
}

async fn drive_session(mut task: SessionTask) {
    loop {
        match task.eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code != ConnectReturnCode::Success {
                    warn!(code = ?ack.code, "MQTT broker refused connection");
                    break;
                }
                task.report(ConnectionState::Connected);
                info!(topic = %task.subscribe_topic, "MQTT connected; subscribing");
                let filter = task.subscribe_topic.clone();
                if let Err(e) = task.client.try_subscribe(filter, QoS::AtMostOnce) {
                    warn!(error = %e, "MQTT subscribe request failed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                task.handler.on_bus_message(&publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                info!("MQTT broker closed the session");
                break;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection lost");
                break;
            }
        }
    }
    task.report(ConnectionState::Disconnected);
}
