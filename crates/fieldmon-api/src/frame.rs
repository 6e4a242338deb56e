// ── Inbound frame classification ──
//
// Structural predicates over an untyped decoded frame, plus the typed
// payload of each recognised kind. Shapes that fail validation are
// `Frame::Unrecognized`, never an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Structural predicates ────────────────────────────────────────────

/// The `type` discriminant, if present and a string.
pub fn frame_type(frame: &Value) -> Option<&str> {
    frame.get("type").and_then(Value::as_str)
}

fn has_string(frame: &Value, field: &str) -> bool {
    frame.get(field).is_some_and(Value::is_string)
}

fn has_object(frame: &Value, field: &str) -> bool {
    frame.get(field).is_some_and(Value::is_object)
}

pub fn is_connected_frame(frame: &Value) -> bool {
    frame_type(frame) == Some("connected")
}

/// Single-device shape (`device_id` + `data` object) or multi-device
/// shape (`devices` object + `timestamp` string).
pub fn is_data_frame(frame: &Value) -> bool {
    frame_type(frame) == Some("data")
        && ((has_string(frame, "device_id") && has_object(frame, "data"))
            || (has_object(frame, "devices") && has_string(frame, "timestamp")))
}

pub fn is_write_result_frame(frame: &Value) -> bool {
    frame_type(frame) == Some("write_result")
        && has_string(frame, "device_id")
        && has_string(frame, "parameter")
        && frame
            .get("value")
            .is_some_and(|v| v.is_number() || v.is_string() || v.is_boolean())
}

pub fn is_pong_frame(frame: &Value) -> bool {
    frame_type(frame) == Some("pong")
}

pub fn is_error_frame(frame: &Value) -> bool {
    frame_type(frame) == Some("error")
}

// ── Typed payloads ───────────────────────────────────────────────────

/// Handshake frame promoting a session from connecting to connected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectedFrame {
    pub device_ids: Option<Vec<String>>,
    pub message: Option<String>,
}

impl ConnectedFrame {
    fn from_value(frame: &Value) -> Self {
        let payload = frame.get("data").filter(|d| d.is_object()).unwrap_or(frame);
        let device_ids = payload
            .get("device_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(id_to_string).collect());
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(String::from);
        Self {
            device_ids,
            message,
        }
    }
}

/// Device ids may arrive as strings or as bare slave numbers.
fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Live parameter data for one or more devices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataFrame {
    Single {
        device_id: String,
        timestamp: Option<String>,
        /// Parameter name → reading, forwarded verbatim.
        data: Map<String, Value>,
    },
    Multiple {
        timestamp: String,
        /// Device id → parameter map, forwarded verbatim.
        devices: Map<String, Value>,
    },
}

impl DataFrame {
    fn from_value(frame: &Value) -> Option<Self> {
        let timestamp = frame.get("timestamp").and_then(Value::as_str);

        if let (Some(device_id), Some(data)) = (
            frame.get("device_id").and_then(Value::as_str),
            frame.get("data").and_then(Value::as_object),
        ) {
            return Some(Self::Single {
                device_id: device_id.to_owned(),
                timestamp: timestamp.map(String::from),
                data: data.clone(),
            });
        }

        let devices = frame.get("devices").and_then(Value::as_object)?;
        Some(Self::Multiple {
            timestamp: timestamp?.to_owned(),
            devices: devices.clone(),
        })
    }

    /// Frame-level timestamp, if the gateway sent one.
    pub fn timestamp(&self) -> Option<&str> {
        match self {
            Self::Single { timestamp, .. } => timestamp.as_deref(),
            Self::Multiple { timestamp, .. } => Some(timestamp),
        }
    }

    /// Device ids named by this frame.
    pub fn device_ids(&self) -> Vec<&str> {
        match self {
            Self::Single { device_id, .. } => vec![device_id.as_str()],
            Self::Multiple { devices, .. } => devices.keys().map(String::as_str).collect(),
        }
    }
}

/// Outcome of a previously issued `write` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResultFrame {
    pub device_id: String,
    pub parameter: String,
    pub value: Value,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub new_value: Option<Value>,
}

/// Protocol-level error reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorFrame {
    pub message: Option<String>,
    pub code: Option<String>,
}

impl ErrorFrame {
    fn from_value(frame: &Value) -> Self {
        let payload = frame.get("data").filter(|d| d.is_object()).unwrap_or(frame);
        let field = |name: &str| payload.get(name).and_then(Value::as_str).map(String::from);
        Self {
            message: field("message"),
            code: field("code"),
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────────

/// One decoded inbound message, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Frame {
    Connected(ConnectedFrame),
    Data(DataFrame),
    WriteResult(WriteResultFrame),
    Pong,
    Error(ErrorFrame),
    Unrecognized,
}

impl Frame {
    /// Classify a decoded frame, checking kinds in priority order:
    /// connected, data, write_result, pong, error.
    pub fn classify(frame: &Value) -> Self {
        if is_connected_frame(frame) {
            return Self::Connected(ConnectedFrame::from_value(frame));
        }
        if is_data_frame(frame) {
            return DataFrame::from_value(frame).map_or(Self::Unrecognized, Self::Data);
        }
        if is_write_result_frame(frame) {
            return serde_json::from_value::<WriteResultFrame>(frame.clone())
                .map_or(Self::Unrecognized, Self::WriteResult);
        }
        if is_pong_frame(frame) {
            return Self::Pong;
        }
        if is_error_frame(frame) {
            return Self::Error(ErrorFrame::from_value(frame));
        }
        Self::Unrecognized
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Data(_) => "data",
            Self::WriteResult(_) => "write_result",
            Self::Pong => "pong",
            Self::Error(_) => "error",
            Self::Unrecognized => "unrecognized",
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn connected_reads_payload_fields() {
        let frame = Frame::classify(&json!({
            "type": "connected",
            "data": { "device_ids": ["D1", 7], "message": "streaming" }
        }));
        assert_eq!(
            frame,
            Frame::Connected(ConnectedFrame {
                device_ids: Some(vec!["D1".into(), "7".into()]),
                message: Some("streaming".into()),
            })
        );
    }

    #[test]
    fn connected_without_payload() {
        let frame = Frame::classify(&json!({ "type": "connected" }));
        assert_eq!(frame, Frame::Connected(ConnectedFrame::default()));
    }

    #[test]
    fn single_device_data() {
        let frame = Frame::classify(&json!({
            "type": "data",
            "device_id": "D1",
            "timestamp": "2026-03-01T10:00:00Z",
            "data": { "voltage": { "value": 230.1, "unit": "V" } }
        }));
        let Frame::Data(DataFrame::Single {
            device_id,
            timestamp,
            data,
        }) = frame
        else {
            panic!("expected single-device data");
        };
        assert_eq!(device_id, "D1");
        assert_eq!(timestamp.as_deref(), Some("2026-03-01T10:00:00Z"));
        assert_eq!(data["voltage"]["unit"], "V");
    }

    #[test]
    fn multi_device_data_requires_timestamp() {
        let ok = json!({
            "type": "data",
            "devices": { "D1": { "A": 1 }, "D2": { "B": 2 } },
            "timestamp": "T"
        });
        assert!(is_data_frame(&ok));
        let Frame::Data(data) = Frame::classify(&ok) else {
            panic!("expected data frame");
        };
        assert_eq!(data.timestamp(), Some("T"));
        assert_eq!(data.device_ids(), vec!["D1", "D2"]);

        let missing_ts = json!({ "type": "data", "devices": { "D1": {} } });
        assert!(!is_data_frame(&missing_ts));
        assert_eq!(Frame::classify(&missing_ts), Frame::Unrecognized);
    }

    #[test]
    fn malformed_data_falls_through_silently() {
        for frame in [
            json!({ "type": "data", "device_id": 5, "data": {} }),
            json!({ "type": "data", "device_id": "D1", "data": [1, 2] }),
            json!({ "type": "data" }),
        ] {
            assert_eq!(Frame::classify(&frame), Frame::Unrecognized, "{frame}");
        }
    }

    #[test]
    fn write_result_value_types() {
        for value in [json!(1), json!("on"), json!(true)] {
            let frame = json!({
                "type": "write_result",
                "device_id": "D1",
                "parameter": "mode",
                "value": value,
                "success": true
            });
            assert!(is_write_result_frame(&frame));
        }

        let object_value = json!({
            "type": "write_result",
            "device_id": "D1",
            "parameter": "mode",
            "value": { "nested": 1 }
        });
        assert_eq!(Frame::classify(&object_value), Frame::Unrecognized);
    }

    #[test]
    fn write_result_payload() {
        let frame = Frame::classify(&json!({
            "type": "write_result",
            "device_id": "D1",
            "parameter": "setpoint",
            "value": 21.5,
            "success": false,
            "message": "out of range",
            "new_value": 20
        }));
        let Frame::WriteResult(result) = frame else {
            panic!("expected write_result");
        };
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("out of range"));
        assert_eq!(result.new_value, Some(json!(20)));
    }

    #[test]
    fn pong_and_error() {
        assert_eq!(Frame::classify(&json!({ "type": "pong" })), Frame::Pong);
        assert_eq!(
            Frame::classify(&json!({
                "type": "error",
                "data": { "code": "DEVICE_UNHEALTHY", "message": "m" }
            })),
            Frame::Error(ErrorFrame {
                message: Some("m".into()),
                code: Some("DEVICE_UNHEALTHY".into()),
            })
        );
    }

    #[test]
    fn unknown_type_is_unrecognized() {
        assert_eq!(Frame::classify(&json!({ "type": "hello" })), Frame::Unrecognized);
        assert_eq!(Frame::classify(&json!([1, 2, 3])), Frame::Unrecognized);
        assert_eq!(Frame::classify(&json!({ "type": 3 })), Frame::Unrecognized);
    }
}
