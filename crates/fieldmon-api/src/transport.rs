// ── Transport seam ──
//
// The session layer drives a transport exclusively through this trait.
// Lifecycle events are delivered over an ordered channel, one at a time,
// in socket-event order.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::command::OutboundCommand;
use crate::endpoint::ConnectionConfig;
use crate::error::Error;

/// RFC 6455 normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Closed without a close frame (stream ended or errored).
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Socket lifecycle event, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The socket opened (initially or after a reconnect).
    Opened,
    /// A text frame that decoded as JSON.
    Message(Value),
    /// The socket closed without the user asking for it.
    Closed { code: u16, reason: String },
    /// Socket-level failure, distinct from an `error`-typed frame.
    Error { message: String },
}

/// Shortest heartbeat period a transport accepts.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

/// Timer configuration for heartbeating and reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Interval between automatic `ping` commands. Default: 30s.
    pub heartbeat_interval: Duration,
    /// Delay before the single reconnect attempt after an unexpected close.
    /// Default: 5s.
    pub reconnect_delay: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl TransportOptions {
    /// Raise a heartbeat below [`MIN_HEARTBEAT_INTERVAL`] (a zero period
    /// would make the timer panic) to that floor.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        if self.heartbeat_interval < MIN_HEARTBEAT_INTERVAL {
            tracing::warn!(
                requested_ms = u64::try_from(self.heartbeat_interval.as_millis()).unwrap_or(0),
                "heartbeat interval too short, clamping"
            );
            self.heartbeat_interval = MIN_HEARTBEAT_INTERVAL;
        }
        self
    }
}

/// Whether a close should schedule an automatic reconnect.
///
/// Only closes that were neither user-initiated, nor latched as
/// suppressed, nor a normal closure qualify.
pub fn should_reconnect(manual_close: bool, suppressed: bool, code: u16) -> bool {
    !manual_close && !suppressed && code != CLOSE_NORMAL
}

/// One physical connection to the monitoring gateway.
pub trait Transport: Send {
    /// Open a socket for `config`. Resolves once the socket is open and
    /// rejects if the handshake fails.
    fn connect(&mut self, config: &ConnectionConfig)
    -> impl Future<Output = Result<(), Error>> + Send;

    /// User-initiated close: stops the heartbeat, cancels any pending
    /// reconnect and closes with a normal-closure code. Idempotent.
    fn disconnect(&mut self);

    /// Serialize and transmit `command`. Fails with [`Error::NotOpen`]
    /// without an open socket.
    fn send(&self, command: &OutboundCommand) -> Result<(), Error>;

    fn is_connected(&self) -> bool;

    /// Suppress automatic reconnection even for non-user-initiated closes.
    fn prevent_reconnection(&self);

    fn allow_reconnection(&self);

    fn is_reconnection_suppressed(&self) -> bool;

    /// Next lifecycle event. Pending while nothing happens.
    fn recv(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;
}
