//! Shared configuration for the fieldmon console.
//!
//! TOML profiles naming a gateway and the devices to stream, merged with
//! `FIELDMON_`-prefixed environment variables, and translation into
//! `fieldmon_api` connection types.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fieldmon_api::{ConnectionConfig, GatewayOrigin, RawConnectionConfig, TransportOptions};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Streaming interval in seconds when a profile sets none.
    #[serde(default = "default_interval")]
    pub interval: f64,

    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Event-log ring size.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            interval: default_interval(),
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            log_capacity: default_log_capacity(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_interval() -> f64 {
    fieldmon_api::endpoint::DEFAULT_INTERVAL_SECS
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_reconnect_delay_secs() -> u64 {
    5
}
fn default_log_capacity() -> usize {
    100
}

/// A named gateway profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Gateway base URL (e.g., "http://192.168.1.20:8000").
    pub gateway: String,

    /// Stream a single device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Stream several devices over one socket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_ids: Option<Vec<String>>,

    /// Override the default interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,

    /// Restrict streamed parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "fieldmon", "fieldmon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fieldmon");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Nested keys use a double underscore:
/// `FIELDMON_DEFAULTS__INTERVAL=0.5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FIELDMON_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to pretty TOML at `path`, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Resolution ──────────────────────────────────────────────────────

impl Config {
    /// Look up `name`, or the default profile when `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

/// Parse a gateway base URL into the origin the stream URL is built from.
pub fn resolve_gateway(gateway: &str) -> Result<GatewayOrigin, ConfigError> {
    let url: url::Url = gateway.parse().map_err(|_| ConfigError::Validation {
        field: "gateway".into(),
        reason: format!("invalid URL: {gateway}"),
    })?;
    GatewayOrigin::from_url(&url).map_err(|e| ConfigError::Validation {
        field: "gateway".into(),
        reason: e.to_string(),
    })
}

/// Build a validated `ConnectionConfig` from a profile plus defaults.
pub fn resolve_connection(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ConnectionConfig, ConfigError> {
    let raw = RawConnectionConfig {
        device_id: profile.device_id.clone(),
        device_ids: profile.device_ids.clone(),
        interval: Some(profile.interval.unwrap_or(defaults.interval)),
        parameters: profile.parameters.clone(),
        ..RawConnectionConfig::default()
    };
    ConnectionConfig::try_from(raw).map_err(|e| ConfigError::Validation {
        field: "device selection".into(),
        reason: e.to_string(),
    })
}

/// Heartbeat and reconnect timings from the defaults section.
pub fn transport_options(defaults: &Defaults) -> TransportOptions {
    TransportOptions {
        heartbeat_interval: Duration::from_secs(defaults.heartbeat_secs.max(1)),
        reconnect_delay: Duration::from_secs(defaults.reconnect_delay_secs),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
default_profile = "plant"

[defaults]
interval = 2.0

[profiles.plant]
gateway = "https://scada.example.com"
device_ids = ["3", "4"]
parameters = ["voltage", "current"]

[profiles.bench]
gateway = "http://localhost:8000"
device_id = "17"
interval = 0.5
"#;

    #[test]
    fn loads_profiles_and_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;

            assert_eq!(cfg.default_profile.as_deref(), Some("plant"));
            assert_eq!(cfg.defaults.interval, 2.0);
            assert_eq!(cfg.defaults.heartbeat_secs, 30);
            assert_eq!(cfg.profiles.len(), 2);

            let (name, profile) = cfg.profile(None).map_err(|e| e.to_string())?;
            assert_eq!(name, "plant");
            assert_eq!(profile.gateway, "https://scada.example.com");
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("FIELDMON_DEFAULTS__INTERVAL", "0.25");
            jail.set_env("FIELDMON_DEFAULT_PROFILE", "bench");
            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;

            assert_eq!(cfg.defaults.interval, 0.25);
            assert_eq!(cfg.default_profile.as_deref(), Some("bench"));
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        // Inside a jail so env set by other tests cannot leak in.
        figment::Jail::expect_with(|_| {
            let cfg = load_config_from(Path::new("absent.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.defaults, Defaults::default());
            assert!(cfg.profiles.is_empty());
            Ok(())
        });
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "bench".into(),
            Profile {
                gateway: "http://localhost:8000".into(),
                device_id: Some("17".into()),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[profiles.bench]"));
        let loaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(loaded.profiles["bench"], cfg.profiles["bench"]);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        let err = cfg.profile(Some("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::ProfileNotFound { name } if name == "nope"));
    }

    #[test]
    fn resolves_connection_with_default_interval() {
        let cfg: Config = toml::from_str(SAMPLE).unwrap();
        let (_, plant) = cfg.profile(Some("plant")).unwrap();
        let conn = resolve_connection(plant, &cfg.defaults).unwrap();
        assert_eq!(conn.interval(), 2.0);
        assert_eq!(conn.target().device_ids(), vec!["3", "4"]);

        let (_, bench) = cfg.profile(Some("bench")).unwrap();
        let conn = resolve_connection(bench, &cfg.defaults).unwrap();
        assert_eq!(conn.interval(), 0.5);
    }

    #[test]
    fn profile_without_devices_is_rejected() {
        let profile = Profile {
            gateway: "http://localhost".into(),
            ..Profile::default()
        };
        let err = resolve_connection(&profile, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn resolves_gateway_origin() {
        let origin = resolve_gateway("https://scada.example.com:8443").unwrap();
        assert!(origin.is_secure());
        assert_eq!(origin.host(), "scada.example.com:8443");

        assert!(resolve_gateway("not a url").is_err());
        assert!(resolve_gateway("ftp://example.com").is_err());
    }

    #[test]
    fn transport_options_from_defaults() {
        let options = transport_options(&Defaults {
            heartbeat_secs: 10,
            reconnect_delay_secs: 2,
            ..Defaults::default()
        });
        assert_eq!(options.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(options.reconnect_delay, Duration::from_secs(2));
    }
}
