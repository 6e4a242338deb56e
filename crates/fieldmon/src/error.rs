//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use fieldmon_config::ConfigError;
use fieldmon_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {target}")]
    #[diagnostic(
        code(fieldmon::connection_failed),
        help(
            "Check that the gateway is running and reachable.\n\
             Reason: {reason}\n\
             Try: fieldmon url   (to inspect the stream URL)"
        )
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("Monitoring session ended: {reason}")]
    #[diagnostic(
        code(fieldmon::session_closed),
        help("The gateway closed the stream. Run with -v to see the event log.")
    )]
    SessionClosed { reason: String },

    #[error("Not connected to the gateway")]
    #[diagnostic(code(fieldmon::not_connected))]
    NotConnected,

    #[error("Timed out after {seconds}s waiting for {what}")]
    #[diagnostic(
        code(fieldmon::timeout),
        help("Raise the limit with --handshake-timeout or the command's --timeout flag.")
    )]
    Timeout { what: String, seconds: u64 },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Write of '{parameter}' was rejected: {message}")]
    #[diagnostic(
        code(fieldmon::write_rejected),
        help("Use --force to bypass gateway-side checks if the write is intentional.")
    )]
    WriteRejected { parameter: String, message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(fieldmon::validation))]
    Validation { field: String, reason: String },

    #[error("Profile '{name}' not found")]
    #[diagnostic(
        code(fieldmon::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(fieldmon::no_config),
        help(
            "Pass --gateway <URL> or add a profile to {path}\n\
             Run: fieldmon config path"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fieldmon::config))]
    Config(Box<ConfigError>),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(fieldmon::serialization))]
    Serialization(String),

    #[error(transparent)]
    #[diagnostic(code(fieldmon::io))]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(fieldmon::internal))]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::SessionClosed { .. } | Self::NotConnected => {
                exit_code::CONNECTION
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::WriteRejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig { message } => Self::Validation {
                field: "connection".into(),
                reason: message,
            },
            CoreError::ConnectionFailed { target, reason } => {
                Self::ConnectionFailed { target, reason }
            }
            CoreError::NotConnected => Self::NotConnected,
            CoreError::AlreadyConnected => {
                Self::Internal("a monitoring session is already open".into())
            }
            CoreError::Transport { message } => Self::SessionClosed { reason: message },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => Self::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            other => Self::Config(Box::new(other)),
        }
    }
}
