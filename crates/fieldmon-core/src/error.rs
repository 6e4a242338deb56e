// ── Core error types ──
//
// Session-level errors from fieldmon-core. Consumers never see socket
// or JSON failures directly; the `From<fieldmon_api::Error>` impl maps
// wire-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Construction errors ──────────────────────────────────────────
    #[error("Invalid connection config: {message}")]
    InvalidConfig { message: String },

    // ── Session state errors ─────────────────────────────────────────
    #[error("A monitoring session is already connected")]
    AlreadyConnected,

    #[error("Not connected to the monitoring gateway")]
    NotConnected,

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the failure came from the network rather than the caller.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Transport { .. })
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<fieldmon_api::Error> for CoreError {
    fn from(err: fieldmon_api::Error) -> Self {
        match err {
            fieldmon_api::Error::InvalidConfig { reason } => {
                Self::InvalidConfig { message: reason }
            }
            fieldmon_api::Error::InvalidUrl(e) => Self::InvalidConfig {
                message: format!("Invalid URL: {e}"),
            },
            fieldmon_api::Error::WebSocketConnect(reason) => Self::ConnectionFailed {
                target: "gateway".into(),
                reason,
            },
            fieldmon_api::Error::NotOpen => Self::NotConnected,
            fieldmon_api::Error::Serialization(e) => {
                Self::Internal(format!("Serialization error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_session_errors() {
        let err = CoreError::from(fieldmon_api::Error::NotOpen);
        assert!(matches!(err, CoreError::NotConnected));

        let err = CoreError::from(fieldmon_api::Error::WebSocketConnect("refused".into()));
        assert!(err.is_connection_error());
        assert_eq!(err.to_string(), "Cannot connect to gateway: refused");
    }
}
