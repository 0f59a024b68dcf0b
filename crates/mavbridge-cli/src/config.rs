//! Configuration file – reads/writes `~/.mavbridge/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mavbridge_link::wire::{DEFAULT_SOURCE_COMPONENT, DEFAULT_SOURCE_SYSTEM};
use mavbridge_middleware::BridgeSettings;
use mavbridge_types::BridgeError;
use mavbridge_middleware::settings::{
    DEFAULT_CLIENT_NAME, DEFAULT_ENDPOINT, DEFAULT_PREFIX, DEFAULT_SUBSCRIBE_TOPIC,
};

/// `[link] connection` value selecting the built-in simulator.
pub const SIM_CONNECTION: &str = "sim";

/// `[mqtt]` section: seeds the runtime [`BridgeSettings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Client identity presented to the broker.
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_subscribe_topic")]
    pub subscribe_topic: String,
}

/// `[link]` section: which vehicle to bridge and the tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// `sim` for the built-in simulator, otherwise a MAVLink address such as
    /// `udpin:0.0.0.0:14550`, `tcpout:127.0.0.1:5760` or
    /// `serial:/dev/ttyACM0:115200`.
    #[serde(default = "default_connection")]
    pub connection: String,

    /// Ground station identity on outbound frames of a real link.
    #[serde(default = "default_source_system")]
    pub source_system: u8,

    #[serde(default = "default_source_component")]
    pub source_component: u8,

    /// Simulator identity.
    #[serde(default = "default_system_id")]
    pub system_id: u8,

    #[serde(default = "default_component_id")]
    pub component_id: u8,

    /// Period between telemetry bursts from the vehicle.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Period between bridge ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Persisted configuration stored in `~/.mavbridge/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub link: LinkConfig,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}
fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}
fn default_subscribe_topic() -> String {
    DEFAULT_SUBSCRIBE_TOPIC.to_string()
}
fn default_connection() -> String {
    SIM_CONNECTION.to_string()
}
fn default_source_system() -> u8 {
    DEFAULT_SOURCE_SYSTEM
}
fn default_source_component() -> u8 {
    DEFAULT_SOURCE_COMPONENT
}
fn default_system_id() -> u8 {
    1
}
fn default_component_id() -> u8 {
    1
}
fn default_heartbeat_interval_ms() -> u64 {
    1000
}
fn default_tick_interval_ms() -> u64 {
    50
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            name: default_name(),
            prefix: default_prefix(),
            subscribe_topic: default_subscribe_topic(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            source_system: default_source_system(),
            source_component: default_source_component(),
            system_id: default_system_id(),
            component_id: default_component_id(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Config {
    /// Runtime settings seeded from `[mqtt]`, validated like `mqtt set`.
    pub fn settings(&self) -> Result<BridgeSettings, BridgeError> {
        let mut settings = BridgeSettings::default();
        settings.set("endpoint", &self.mqtt.endpoint)?;
        settings.set("name", &self.mqtt.name)?;
        settings.set("prefix", &self.mqtt.prefix)?;
        settings.set("subscribe_topic", &self.mqtt.subscribe_topic)?;
        Ok(settings)
    }

    /// Tick period, never below 1 ms.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.link.tick_interval_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.link.heartbeat_interval_ms)
    }

    pub fn uses_simulator(&self) -> bool {
        self.link.connection.trim().eq_ignore_ascii_case(SIM_CONNECTION)
    }
}

/// Return the path to `~/.mavbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mavbridge").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    cfg.settings()
        .map_err(|e| format!("Invalid [mqtt] section in {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// Apply `MAVBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MAVBRIDGE_MQTT_ENDPOINT` | `mqtt.endpoint` |
/// | `MAVBRIDGE_MQTT_NAME` | `mqtt.name` |
/// | `MAVBRIDGE_MQTT_PREFIX` | `mqtt.prefix` |
/// | `MAVBRIDGE_MQTT_SUBSCRIBE_TOPIC` | `mqtt.subscribe_topic` |
/// | `MAVBRIDGE_LINK` | `link.connection` |
/// | `MAVBRIDGE_TICK_MS` | `link.tick_interval_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MAVBRIDGE_MQTT_ENDPOINT") {
        cfg.mqtt.endpoint = v;
    }
    if let Ok(v) = std::env::var("MAVBRIDGE_MQTT_NAME") {
        cfg.mqtt.name = v;
    }
    if let Ok(v) = std::env::var("MAVBRIDGE_MQTT_PREFIX") {
        cfg.mqtt.prefix = v;
    }
    if let Ok(v) = std::env::var("MAVBRIDGE_MQTT_SUBSCRIBE_TOPIC") {
        cfg.mqtt.subscribe_topic = v;
    }
    if let Ok(v) = std::env::var("MAVBRIDGE_LINK") {
        cfg.link.connection = v;
    }
    if let Ok(v) = std::env::var("MAVBRIDGE_TICK_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.link.tick_interval_ms = ms;
    }
}

/// Save the config to disk, creating `~/.mavbridge/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // rwx------
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    // rw-------
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        assert_eq!(dir_meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
        assert_eq!(loaded.mqtt.prefix, "ardupilot/gcs");
        assert_eq!(loaded.link.tick_interval_ms, 50);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[mqtt]\nendpoint = \"broker.lan:1884\"\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.mqtt.endpoint, "broker.lan:1884");
        assert_eq!(loaded.mqtt.subscribe_topic, "ardupilot/cmd");
        assert_eq!(loaded.link, LinkConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[mqtt\nendpoint = ").unwrap();
        assert!(load_from(&path).unwrap_err().contains("parse"));
    }

    #[test]
    fn config_path_points_to_mavbridge_dir() {
        let p = config_path_for_home("/home/pilot");
        assert!(p.to_string_lossy().contains(".mavbridge"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn settings_mirror_mqtt_section() {
        let mut cfg = Config::default();
        cfg.mqtt.prefix = "fleet/3".to_string();
        let settings = cfg.settings().expect("valid settings");
        assert_eq!(settings.prefix, "fleet/3");
        assert_eq!(settings.get("subscribe_topic"), Some("ardupilot/cmd"));
    }

    #[test]
    fn empty_mqtt_values_are_rejected() {
        let mut cfg = Config::default();
        cfg.mqtt.prefix = "  ".to_string();
        assert!(matches!(cfg.settings(), Err(BridgeError::Config(_))));

        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[mqtt]\nendpoint = \"\"\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("endpoint must not be empty"), "{err}");
    }

    #[test]
    fn simulator_is_the_default_link() {
        let cfg = Config::default();
        assert!(cfg.uses_simulator());
        assert_eq!(cfg.link.source_system, 255);
    }

    #[test]
    fn link_connection_selects_a_real_vehicle() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[link]\nconnection = \"udpin:0.0.0.0:14550\"\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert!(!loaded.uses_simulator());
        assert_eq!(loaded.link.connection, "udpin:0.0.0.0:14550");
        assert_eq!(loaded.link.source_component, 190);
        assert_eq!(loaded.link.tick_interval_ms, 50);
    }

    #[test]
    fn zero_tick_interval_is_clamped() {
        let mut cfg = Config::default();
        cfg.link.tick_interval_ms = 0;
        assert_eq!(cfg.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn apply_env_overrides_changes_endpoint() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("MAVBRIDGE_MQTT_ENDPOINT", "mqtt://10.0.0.2:1883") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.mqtt.endpoint, "mqtt://10.0.0.2:1883");
        unsafe { std::env::remove_var("MAVBRIDGE_MQTT_ENDPOINT") };
    }

    #[test]
    fn apply_env_overrides_changes_prefix() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("MAVBRIDGE_MQTT_PREFIX", "fleet/9") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.mqtt.prefix, "fleet/9");
        unsafe { std::env::remove_var("MAVBRIDGE_MQTT_PREFIX") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_tick() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("MAVBRIDGE_TICK_MS", "fast") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.link.tick_interval_ms, 50);
        unsafe { std::env::remove_var("MAVBRIDGE_TICK_MS") };
    }
}
