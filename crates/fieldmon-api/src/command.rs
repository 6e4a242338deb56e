// ── Outbound commands ──
//
// `{"action": "ping"|"write", "data": {..., "sentAt": <epoch-ms>}}`

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
    Write,
    Ping,
}

/// A command sent from the console to the gateway. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundCommand {
    pub action: CommandAction,
    /// Command fields, including the `sentAt` stamp.
    pub data: Map<String, Value>,
}

impl OutboundCommand {
    /// Heartbeat / latency check.
    pub fn ping() -> Self {
        Self::stamped(CommandAction::Ping, Map::new())
    }

    /// Write `value` to `parameter` on the streamed device.
    pub fn write(parameter: impl Into<String>, value: Value, force: bool) -> Self {
        let mut data = Map::new();
        data.insert("parameter".into(), Value::String(parameter.into()));
        data.insert("value".into(), value);
        data.insert("force".into(), Value::Bool(force));
        Self::stamped(CommandAction::Write, data)
    }

    fn stamped(action: CommandAction, mut data: Map<String, Value>) -> Self {
        data.insert("sentAt".into(), Value::from(Utc::now().timestamp_millis()));
        Self { action, data }
    }

    /// Epoch milliseconds at which this command was built.
    pub fn sent_at(&self) -> Option<i64> {
        self.data.get("sentAt").and_then(Value::as_i64)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}
