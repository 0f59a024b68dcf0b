//! Runtime-mutable bridge settings.
//!
//! A small fixed set of named string settings, each with a default.  The
//! console edits them with `mqtt set <name> <value>`; the publisher reads the
//! topic prefix, [`BusSession::connect`][crate::transport::BusSession::connect]
//! reads the rest.
//!
//! | Name | Default | Meaning |
//! |---|---|---|
//! | `endpoint` | `localhost:1883` | Broker address, `host[:port]` or `[v6]:port`, optionally `mqtt://` or `tcp://` prefixed |
//! | `name` | `mavproxy` | MQTT client identity |
//! | `prefix` | `ardupilot/gcs` | Telemetry topic prefix |
//! | `subscribe_topic` | `ardupilot/cmd` | Command topic filter |

use mavbridge_types::BridgeError;

pub const DEFAULT_ENDPOINT: &str = "localhost:1883";
pub const DEFAULT_CLIENT_NAME: &str = "mavproxy";
pub const DEFAULT_PREFIX: &str = "ardupilot/gcs";
pub const DEFAULT_SUBSCRIBE_TOPIC: &str = "ardupilot/cmd";

const DEFAULT_MQTT_PORT: u16 = 1883;

/// Every setting name, in display order.
pub const SETTING_NAMES: [&str; 4] = ["endpoint", "name", "prefix", "subscribe_topic"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub endpoint: String,
    pub name: String,
    pub prefix: String,
    pub subscribe_topic: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            name: DEFAULT_CLIENT_NAME.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            subscribe_topic: DEFAULT_SUBSCRIBE_TOPIC.to_string(),
        }
    }
}

impl BridgeSettings {
    /// Current value of setting `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "endpoint" => Some(&self.endpoint),
            "name" => Some(&self.name),
            "prefix" => Some(&self.prefix),
            "subscribe_topic" => Some(&self.subscribe_topic),
            _ => None,
        }
    }

    /// Update setting `name`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownSetting`] for names outside [`SETTING_NAMES`];
    /// [`BridgeError::Config`] for an empty value.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), BridgeError> {
        let value = value.trim();
        let slot = match name {
            "endpoint" => &mut self.endpoint,
            "name" => &mut self.name,
            "prefix" => &mut self.prefix,
            "subscribe_topic" => &mut self.subscribe_topic,
            other => return Err(BridgeError::UnknownSetting(other.to_string())),
        };
        if value.is_empty() {
            return Err(BridgeError::Config(format!("{name} must not be empty")));
        }
        *slot = value.to_string();
        Ok(())
    }

    /// `(name, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        SETTING_NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|v| (*name, v)))
    }

    pub fn names() -> &'static [&'static str] {
        &SETTING_NAMES
    }

    /// Setting names starting with `partial`, for console completion.
    pub fn completions(partial: &str) -> Vec<&'static str> {
        SETTING_NAMES
            .iter()
            .copied()
            .filter(|name| name.starts_with(partial))
            .collect()
    }

    /// Split [`endpoint`][Self::endpoint] into host and port.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] when the host is empty or the port is not a
    /// valid `u16`.
    pub fn broker_address(&self) -> Result<(String, u16), BridgeError> {
        let raw = self.endpoint.trim();
        let raw = raw
            .strip_prefix("mqtt://")
            .or_else(|| raw.strip_prefix("tcp://"))
            .unwrap_or(raw);

        let bad_port = |e: std::num::ParseIntError| {
            BridgeError::Config(format!("invalid port in endpoint '{}': {e}", self.endpoint))
        };

        // `[v6]:port`, `[v6]`, bare `v6`, `host:port` or `host`.
        let (host, port) = if let Some(bracketed) = raw.strip_prefix('[') {
            let (host, rest) = bracketed.split_once(']').ok_or_else(|| {
                BridgeError::Config(format!("unterminated '[' in endpoint '{}'", self.endpoint))
            })?;
            let port = match rest {
                "" => DEFAULT_MQTT_PORT,
                rest => match rest.strip_prefix(':') {
                    Some(port) => port.parse::<u16>().map_err(bad_port)?,
                    None => {
                        return Err(BridgeError::Config(format!(
                            "unexpected '{rest}' after ']' in endpoint '{}'",
                            self.endpoint
                        )));
                    }
                },
            };
            (host, port)
        } else if let Some((host, port)) = raw.split_once(':').filter(|(_, p)| !p.contains(':')) {
            (host, port.parse::<u16>().map_err(bad_port)?)
        } else {
            (raw, DEFAULT_MQTT_PORT)
        };

        if host.is_empty() {
            return Err(BridgeError::Config(format!(
                "endpoint '{}' has no host",
                self.endpoint
            )));
        }
        Ok((host.to_string(), port))
    }
}
