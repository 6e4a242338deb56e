// ── Stream endpoint ──
//
// Immutable per-session descriptor (`ConnectionConfig`) and the
// deterministic WebSocket URL derived from it plus the gateway origin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Default streaming interval in seconds.
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

// ── MonitorMode / DeviceTarget ───────────────────────────────────────

/// Which streaming endpoint a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    Single,
    Multiple,
}

/// The resolved, non-empty set of devices a session streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTarget {
    Single(String),
    /// Ordered; order is preserved in the stream URL.
    Multiple(Vec<String>),
}

impl DeviceTarget {
    pub fn mode(&self) -> MonitorMode {
        match self {
            Self::Single(_) => MonitorMode::Single,
            Self::Multiple(_) => MonitorMode::Multiple,
        }
    }

    /// All device ids in this target, in configured order.
    pub fn device_ids(&self) -> Vec<&str> {
        match self {
            Self::Single(id) => vec![id.as_str()],
            Self::Multiple(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(id) => f.write_str(id),
            Self::Multiple(ids) => f.write_str(&ids.join(", ")),
        }
    }
}

// ── ConnectionConfig ─────────────────────────────────────────────────

/// Validated descriptor for one monitoring session.
///
/// Exactly one non-empty device selection is guaranteed by construction,
/// so every value of this type yields a valid stream URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConnectionConfig", into = "RawConnectionConfig")]
pub struct ConnectionConfig {
    target: DeviceTarget,
    interval: f64,
    parameters: Option<Vec<String>>,
    auto_reconnect: bool,
}

impl ConnectionConfig {
    /// Stream a single device.
    pub fn single(device_id: impl Into<String>) -> Result<Self, Error> {
        let device_id = device_id.into();
        validate_device_id(&device_id)?;
        Ok(Self::from_target(DeviceTarget::Single(device_id)))
    }

    /// Stream several devices over one socket, preserving the given order.
    pub fn multiple<I, S>(device_ids: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = device_ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(Error::invalid_config("device_ids must not be empty"));
        }
        for id in &ids {
            validate_device_id(id)?;
        }
        Ok(Self::from_target(DeviceTarget::Multiple(ids)))
    }

    fn from_target(target: DeviceTarget) -> Self {
        Self {
            target,
            interval: DEFAULT_INTERVAL_SECS,
            parameters: None,
            auto_reconnect: true,
        }
    }

    /// Set the streaming interval in seconds. Must be positive and finite.
    pub fn with_interval(mut self, interval: f64) -> Result<Self, Error> {
        validate_interval(interval)?;
        self.interval = interval;
        Ok(self)
    }

    /// Restrict the stream to the named parameters. An empty list means
    /// "no restriction".
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let params: Vec<String> = parameters.into_iter().map(Into::into).collect();
        self.parameters = if params.is_empty() { None } else { Some(params) };
        self
    }

    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub fn mode(&self) -> MonitorMode {
        self.target.mode()
    }

    pub fn target(&self) -> &DeviceTarget {
        &self.target
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn parameters(&self) -> Option<&[String]> {
        self.parameters.as_deref()
    }

    /// Informational only: reconnection is governed by the transport.
    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }
}

fn validate_device_id(id: &str) -> Result<(), Error> {
    if id.trim().is_empty() {
        return Err(Error::invalid_config("device id must not be empty"));
    }
    Ok(())
}

fn validate_interval(interval: f64) -> Result<(), Error> {
    if !interval.is_finite() || interval <= 0.0 {
        return Err(Error::invalid_config(format!(
            "interval must be a positive number of seconds, got {interval}"
        )));
    }
    Ok(())
}

/// Loose wire/config shape. Mode is inferred from whichever id field is
/// populated when not given explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConnectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<MonitorMode>,
    #[serde(default, alias = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, alias = "deviceIds", skip_serializing_if = "Option::is_none")]
    pub device_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    #[serde(default, alias = "autoReconnect", skip_serializing_if = "Option::is_none")]
    pub auto_reconnect: Option<bool>,
}

impl TryFrom<RawConnectionConfig> for ConnectionConfig {
    type Error = Error;

    fn try_from(raw: RawConnectionConfig) -> Result<Self, Self::Error> {
        let has_single = raw.device_id.as_deref().is_some_and(|s| !s.trim().is_empty());
        let has_multiple = raw.device_ids.as_ref().is_some_and(|ids| !ids.is_empty());

        let mode = match raw.mode {
            Some(mode) => mode,
            None => match (has_single, has_multiple) {
                (true, false) => MonitorMode::Single,
                (false, true) => MonitorMode::Multiple,
                (true, true) => {
                    return Err(Error::invalid_config(
                        "both device_id and device_ids are set; specify mode explicitly",
                    ));
                }
                (false, false) => {
                    return Err(Error::invalid_config(
                        "one of device_id or device_ids is required",
                    ));
                }
            },
        };

        let config = match mode {
            MonitorMode::Single => Self::single(raw.device_id.unwrap_or_default())?,
            MonitorMode::Multiple => Self::multiple(raw.device_ids.unwrap_or_default())?,
        };

        let config = match raw.interval {
            Some(interval) => config.with_interval(interval)?,
            None => config,
        };

        Ok(config
            .with_parameters(raw.parameters.unwrap_or_default())
            .with_auto_reconnect(raw.auto_reconnect.unwrap_or(true)))
    }
}

impl From<ConnectionConfig> for RawConnectionConfig {
    fn from(config: ConnectionConfig) -> Self {
        let (device_id, device_ids) = match config.target {
            DeviceTarget::Single(id) => (Some(id), None),
            DeviceTarget::Multiple(ids) => (None, Some(ids)),
        };
        Self {
            mode: Some(if device_id.is_some() {
                MonitorMode::Single
            } else {
                MonitorMode::Multiple
            }),
            device_id,
            device_ids,
            interval: Some(config.interval),
            parameters: config.parameters,
            auto_reconnect: Some(config.auto_reconnect),
        }
    }
}

// ── GatewayOrigin ────────────────────────────────────────────────────

/// Scheme security and `host[:port]` of the gateway serving the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrigin {
    secure: bool,
    host: String,
}

impl GatewayOrigin {
    pub fn new(secure: bool, host: impl Into<String>) -> Self {
        Self {
            secure,
            host: host.into(),
        }
    }

    /// Derive the origin from the gateway's base URL.
    ///
    /// `https`/`wss` select the secure WebSocket scheme; `http`/`ws` the
    /// plain one. The port is kept only when it is not the scheme default.
    pub fn from_url(url: &Url) -> Result<Self, Error> {
        let secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => {
                return Err(Error::invalid_config(format!(
                    "unsupported gateway scheme '{other}'"
                )));
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| Error::invalid_config(format!("gateway URL has no host: {url}")))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        Ok(Self { secure, host })
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn ws_scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Build the stream URL for `config`.
    ///
    /// - single: `{scheme}://{host}/api/monitoring/device/{id}?interval=..[&parameters=..]`
    /// - multiple: `{scheme}://{host}/api/monitoring/devices?device_ids=a,b&interval=..[&parameters=..]`
    pub fn websocket_url(&self, config: &ConnectionConfig) -> Result<Url, Error> {
        let scheme = self.ws_scheme();
        let host = &self.host;
        let interval = config.interval();

        let mut raw = match config.target() {
            DeviceTarget::Single(id) => {
                format!("{scheme}://{host}/api/monitoring/device/{id}?interval={interval}")
            }
            DeviceTarget::Multiple(ids) => format!(
                "{scheme}://{host}/api/monitoring/devices?device_ids={}&interval={interval}",
                ids.join(",")
            ),
        };
        if let Some(params) = config.parameters() {
            raw.push_str("&parameters=");
            raw.push_str(&params.join(","));
        }

        Ok(Url::parse(&raw)?)
    }
}

impl FromStr for GatewayOrigin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_url(&Url::parse(s)?)
    }
}

impl fmt::Display for GatewayOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "https" } else { "http" };
        write!(f, "{scheme}://{}", self.host)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
