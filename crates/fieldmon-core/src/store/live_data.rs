// ── Live-data reconciler ──
//
// Turns classified `data` frames into per-device snapshots. Each frame
// replaces a device's snapshot wholesale; parameters missing from the
// newer frame are gone afterwards.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use fieldmon_api::DataFrame;

use super::collection::EntityCollection;
use crate::stream::EntityStream;

// ── Snapshot types ───────────────────────────────────────────────────

/// Latest known parameter set for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    /// ISO-8601; the frame's timestamp, or receipt time when absent.
    pub timestamp: String,
    /// Parameter name → reading, as sent by the gateway.
    pub parameters: Map<String, Value>,
}

/// One parameter value with its optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterReading {
    pub value: Value,
    pub unit: Option<String>,
    pub quality: Option<String>,
    pub timestamp: Option<String>,
}

impl ParameterReading {
    /// Accepts `{value, unit?, quality?, timestamp?}` or a bare scalar.
    fn from_value(raw: &Value) -> Self {
        let Some(obj) = raw.as_object().filter(|o| o.contains_key("value")) else {
            return Self {
                value: raw.clone(),
                unit: None,
                quality: None,
                timestamp: None,
            };
        };
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(String::from);
        Self {
            value: obj.get("value").cloned().unwrap_or(Value::Null),
            unit: text("unit"),
            quality: text("quality"),
            timestamp: text("timestamp"),
        }
    }

    /// Value rendered for display, with the unit appended when known.
    pub fn display_value(&self) -> String {
        let value = match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match &self.unit {
            Some(unit) if !unit.is_empty() => format!("{value} {unit}"),
            _ => value,
        }
    }
}

impl DeviceSnapshot {
    pub fn reading(&self, name: &str) -> Option<ParameterReading> {
        self.parameters.get(name).map(ParameterReading::from_value)
    }

    /// All readings in parameter-name order.
    pub fn readings(&self) -> Vec<(&str, ParameterReading)> {
        self.parameters
            .iter()
            .map(|(name, raw)| (name.as_str(), ParameterReading::from_value(raw)))
            .collect()
    }
}

// ── LiveDataStore ────────────────────────────────────────────────────

/// Per-device live state, owned by the reconciler.
///
/// Reads are lock-free; subscribers are notified once per applied frame.
pub struct LiveDataStore {
    devices: EntityCollection<DeviceSnapshot>,
    last_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl LiveDataStore {
    pub fn new() -> Self {
        let (last_update, _) = watch::channel(None);
        Self {
            devices: EntityCollection::new(),
            last_update,
        }
    }

    /// Apply one data frame. Returns the ids of the devices replaced.
    pub fn apply(&self, frame: &DataFrame) -> Vec<String> {
        let now = Utc::now();
        let fallback = || now.to_rfc3339_opts(SecondsFormat::Millis, true);

        let updates: Vec<(String, DeviceSnapshot)> = match frame {
            DataFrame::Single {
                device_id,
                timestamp,
                data,
            } => vec![(
                device_id.clone(),
                DeviceSnapshot {
                    device_id: device_id.clone(),
                    timestamp: timestamp.clone().unwrap_or_else(fallback),
                    parameters: data.clone(),
                },
            )],
            DataFrame::Multiple { timestamp, devices } => devices
                .iter()
                .filter_map(|(device_id, params)| {
                    let Some(parameters) = params.as_object() else {
                        warn!(
                            device_id = %device_id,
                            "skipping non-object device entry in data frame"
                        );
                        return None;
                    };
                    Some((
                        device_id.clone(),
                        DeviceSnapshot {
                            device_id: device_id.clone(),
                            timestamp: timestamp.clone(),
                            parameters: parameters.clone(),
                        },
                    ))
                })
                .collect(),
        };

        let ids: Vec<String> = updates.iter().map(|(id, _)| id.clone()).collect();
        if self.devices.upsert_many(updates) > 0 {
            self.last_update.send_replace(Some(now));
            debug!(devices = ?ids, "live data updated");
        }
        ids
    }

    pub fn snapshot(&self, device_id: &str) -> Option<Arc<DeviceSnapshot>> {
        self.devices.get(device_id)
    }

    /// All snapshots ordered by device id.
    pub fn snapshots(&self) -> Arc<Vec<Arc<DeviceSnapshot>>> {
        self.devices.snapshot()
    }

    pub fn subscribe(&self) -> EntityStream<DeviceSnapshot> {
        EntityStream::new(self.devices.subscribe())
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.devices.keys()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Monotonic change counter, bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.devices.version()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    pub fn subscribe_last_update(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_update.subscribe()
    }

    pub fn clear(&self) {
        self.devices.clear();
        self.last_update.send_replace(None);
    }
}

impl Default for LiveDataStore {
    fn default() -> Self {
        Self::new()
    }
}
