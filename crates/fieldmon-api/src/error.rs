use thiserror::Error;

/// Top-level error type for the `fieldmon-api` crate.
///
/// `fieldmon-core` maps these into session-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Construction ────────────────────────────────────────────────
    /// The connection descriptor failed validation. Never retried.
    #[error("Invalid connection config: {reason}")]
    InvalidConfig { reason: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket handshake failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// A send was attempted without an open socket.
    #[error("WebSocket is not open")]
    NotOpen,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON serialization of an outbound command failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocketConnect(err.to_string())
    }
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is a construction-time failure that
    /// will not go away on retry.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::InvalidUrl(_))
    }
}
