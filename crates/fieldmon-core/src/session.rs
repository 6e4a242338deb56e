// ── Session controller ──
//
// Owns the transport for one monitoring session and turns its
// lifecycle events into session state. A session becomes `Connected`
// only when the gateway's handshake frame arrives; socket-open alone
// leaves it `Connecting`.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use fieldmon_api::{
    ConnectedFrame, ConnectionConfig, ErrorFrame, Frame, OutboundCommand, Transport,
    TransportEvent, WriteResultFrame,
};

use crate::error::CoreError;
use crate::event_log::{EventSink, Severity};
use crate::notification::{Notification, NotificationLevel};
use crate::store::LiveDataStore;

const NOTIFICATION_CHANNEL_SIZE: usize = 32;

// ── SessionStatus ────────────────────────────────────────────────────

/// Session lifecycle, observable through [`SessionController::subscribe_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    /// A critical error closed the session; reconnection stays
    /// suppressed until the next `connect`.
    Errored,
}

/// Traffic and error counters for the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub error_count: u64,
}

// ── CriticalErrorCode ────────────────────────────────────────────────

/// Error-frame codes that end the session and suppress reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CriticalErrorCode {
    ConnectionFailed,
    ConnectionLost,
    ConnectionError,
    TooManyErrors,
    DeviceUnhealthy,
}

impl CriticalErrorCode {
    /// `None` for codes that are absent or not critical.
    pub fn parse(code: Option<&str>) -> Option<Self> {
        code.and_then(|c| Self::from_str(c).ok())
    }

    pub fn notification_title(self) -> &'static str {
        match self {
            Self::DeviceUnhealthy => "Device unhealthy",
            _ => "Connection failed",
        }
    }
}

// ── SessionController ────────────────────────────────────────────────

/// Drives one [`Transport`] through a monitoring session.
///
/// All state changes happen inside `&mut self` methods, one transport
/// event at a time, in arrival order.
pub struct SessionController<T: Transport> {
    transport: T,
    store: Arc<LiveDataStore>,
    sink: Arc<dyn EventSink>,
    status: watch::Sender<SessionStatus>,
    notifications: broadcast::Sender<Notification>,
    config: Option<ConnectionConfig>,
    stats: SessionStats,
    last_message: Option<Value>,
    last_error: Option<String>,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, store: Arc<LiveDataStore>, sink: Arc<dyn EventSink>) -> Self {
        let (status, _) = watch::channel(SessionStatus::Idle);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
        Self {
            transport,
            store,
            sink,
            status,
            notifications,
            config: None,
            stats: SessionStats::default(),
            last_message: None,
            last_error: None,
        }
    }

    // ── State observation ────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == SessionStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status() == SessionStatus::Connecting
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Most recently received frame of any kind.
    pub fn last_message(&self) -> Option<&Value> {
        self.last_message.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The active connection config, if a session is live.
    pub fn config(&self) -> Option<&ConnectionConfig> {
        self.config.as_ref()
    }

    pub fn store(&self) -> &Arc<LiveDataStore> {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open a socket for `config`.
    ///
    /// Resolves once the socket is open; the session stays `Connecting`
    /// until the handshake frame is processed. Fails without touching
    /// the transport when a session is already connected.
    pub async fn connect(&mut self, config: ConnectionConfig) -> Result<(), CoreError> {
        if self.is_connected() {
            return Err(CoreError::AlreadyConnected);
        }

        self.set_status(SessionStatus::Connecting);
        self.last_error = None;
        self.transport.allow_reconnection();
        self.sink.record(
            Severity::Info,
            &format!("Connecting to device(s) {}", config.target()),
        );
        info!(target = %config.target(), mode = ?config.mode(), "connecting");

        let result = self.transport.connect(&config).await;
        let target = config.target().to_string();
        self.config = Some(config);

        match result {
            Ok(()) => {
                debug!("socket open, awaiting handshake frame");
                Ok(())
            }
            Err(e) => {
                let err = if e.is_config() {
                    CoreError::from(e)
                } else {
                    CoreError::ConnectionFailed {
                        target,
                        reason: e.to_string(),
                    }
                };
                warn!(error = %err, "connect rejected");
                self.set_status(SessionStatus::Disconnected);
                self.last_error = Some(err.to_string());
                self.sink.record(Severity::Error, &err.to_string());
                self.notify(NotificationLevel::Warning, "Connection failed", err.to_string());
                Err(err)
            }
        }
    }

    /// User-initiated teardown. Always succeeds; a second call is a no-op.
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
        if self.config.take().is_some() {
            self.sink.record(Severity::Info, "Disconnected");
            info!("session disconnected");
        }
        if self.status() != SessionStatus::Idle {
            self.set_status(SessionStatus::Disconnected);
        }
    }

    /// Tear down any live transport and return to the initial state.
    pub fn reset(&mut self) {
        self.transport.disconnect();
        self.transport.allow_reconnection();
        self.config = None;
        self.stats = SessionStats::default();
        self.last_message = None;
        self.last_error = None;
        self.set_status(SessionStatus::Idle);
        debug!("session reset");
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Request a parameter write. The outcome arrives later as a
    /// `write_result` frame; it is not correlated with this call.
    pub fn write_parameter(
        &mut self,
        parameter: &str,
        value: Value,
        force: bool,
    ) -> Result<OutboundCommand, CoreError> {
        self.ensure_connected()?;
        let command = OutboundCommand::write(parameter, value, force);
        self.send_command(command)
    }

    pub fn send_ping(&mut self) -> Result<OutboundCommand, CoreError> {
        self.ensure_connected()?;
        self.send_command(OutboundCommand::ping())
    }

    fn ensure_connected(&self) -> Result<(), CoreError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(CoreError::NotConnected)
        }
    }

    fn send_command(&mut self, command: OutboundCommand) -> Result<OutboundCommand, CoreError> {
        match self.transport.send(&command) {
            Ok(()) => {
                self.stats.messages_sent += 1;
                debug!(action = ?command.action, "command sent");
                Ok(command)
            }
            Err(e) => {
                self.stats.error_count += 1;
                let err = CoreError::from(e);
                self.last_error = Some(err.to_string());
                warn!(error = %err, "send failed");
                Err(err)
            }
        }
    }

    // ── Event processing ─────────────────────────────────────────

    /// Wait for the next transport event and apply it.
    pub async fn process_next_event(&mut self) -> Result<Option<Frame>, CoreError> {
        let event = self.transport.recv().await.ok_or_else(|| CoreError::Transport {
            message: "transport event channel closed".into(),
        })?;
        Ok(self.handle_event(event))
    }

    /// Apply one transport event. Returns the classified frame for
    /// message events.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<Frame> {
        match event {
            TransportEvent::Opened => {
                debug!("socket opened");
                self.sink
                    .record(Severity::Info, "WebSocket opened, waiting for handshake");
                None
            }
            TransportEvent::Message(value) => {
                if self.is_closed() {
                    debug!("dropping frame from a closed socket");
                    return None;
                }
                Some(self.handle_message(value))
            }
            TransportEvent::Closed { code, reason } => {
                self.handle_close(code, &reason);
                None
            }
            TransportEvent::Error { message } => {
                self.handle_transport_error(&message);
                None
            }
        }
    }

    fn handle_message(&mut self, value: Value) -> Frame {
        self.stats.messages_received += 1;
        let frame = Frame::classify(&value);
        self.last_message = Some(value);

        match &frame {
            Frame::Connected(connected) => self.on_handshake(connected),
            Frame::Data(data) => {
                let updated = self.store.apply(data);
                debug!(devices = updated.len(), "data frame applied");
            }
            Frame::WriteResult(result) => self.on_write_result(result),
            Frame::Pong => self.sink.record(Severity::Info, "Pong received"),
            Frame::Error(error) => self.on_error_frame(error),
            Frame::Unrecognized => {
                let kind = self
                    .last_message
                    .as_ref()
                    .and_then(fieldmon_api::frame::frame_type)
                    .unwrap_or("<none>")
                    .to_owned();
                warn!(kind = %kind, "unrecognized frame");
                self.sink.record(
                    Severity::Warning,
                    &format!("Unrecognized message type: {kind}"),
                );
            }
        }
        frame
    }

    fn on_handshake(&mut self, frame: &ConnectedFrame) {
        self.set_status(SessionStatus::Connected);
        let devices = match (&frame.device_ids, &self.config) {
            (Some(ids), _) if !ids.is_empty() => ids.join(", "),
            (_, Some(config)) => config.target().to_string(),
            _ => "unknown".into(),
        };
        info!(devices = %devices, "session connected");
        let mut line = format!("Connected to device(s) {devices}");
        if let Some(message) = &frame.message {
            line.push_str(": ");
            line.push_str(message);
        }
        self.sink.record(Severity::Success, &line);
    }

    fn on_write_result(&self, result: &WriteResultFrame) {
        if result.success {
            let applied = result.new_value.as_ref().unwrap_or(&result.value);
            self.sink.record(
                Severity::Success,
                &format!(
                    "Wrote {} = {applied} on device {}",
                    result.parameter, result.device_id
                ),
            );
        } else {
            self.sink.record(
                Severity::Error,
                &format!(
                    "Write of {} on device {} failed: {}",
                    result.parameter,
                    result.device_id,
                    result.message.as_deref().unwrap_or("no reason given")
                ),
            );
        }
    }

    fn on_error_frame(&mut self, frame: &ErrorFrame) {
        let message = frame
            .message
            .clone()
            .unwrap_or_else(|| "Unknown server error".into());

        if let Some(code) = CriticalErrorCode::parse(frame.code.as_deref()) {
            self.contain_critical(code, message);
            return;
        }

        self.stats.error_count += 1;
        warn!(code = ?frame.code, message = %message, "server error frame");
        let line = match &frame.code {
            Some(code) => format!("Server error ({code}): {message}"),
            None => format!("Server error: {message}"),
        };
        self.sink.record(Severity::Error, &line);
    }

    /// Latch reconnect suppression, force the transport closed and tell
    /// the user. The session ends `Errored`.
    fn contain_critical(&mut self, code: CriticalErrorCode, message: String) {
        warn!(%code, message = %message, "critical error, closing session");
        self.transport.prevent_reconnection();
        self.transport.disconnect();
        self.set_status(SessionStatus::Errored);
        self.last_error = Some(message.clone());
        self.sink
            .record(Severity::Error, &format!("Critical error ({code}): {message}"));
        self.notify(NotificationLevel::Error, code.notification_title(), message);
    }

    fn handle_close(&mut self, code: u16, reason: &str) {
        if self.status() != SessionStatus::Errored {
            self.set_status(SessionStatus::Disconnected);
        }
        info!(code, reason, "socket closed");
        let line = if reason.is_empty() {
            format!("Connection closed (code {code})")
        } else {
            format!("Connection closed (code {code}): {reason}")
        };
        self.sink.record(Severity::Warning, &line);
    }

    fn handle_transport_error(&mut self, message: &str) {
        self.stats.error_count += 1;
        if self.is_connecting() {
            self.set_status(SessionStatus::Disconnected);
        }
        warn!(error = message, "transport error");
        self.last_error = Some("WebSocket connection error".into());
        self.sink
            .record(Severity::Error, &format!("WebSocket error: {message}"));
    }

    // ── Private helpers ──────────────────────────────────────────

    /// No live socket and no session waiting on one. Frames seen in this
    /// state belong to a connection that has already been torn down.
    fn is_closed(&self) -> bool {
        matches!(
            self.status(),
            SessionStatus::Idle | SessionStatus::Disconnected | SessionStatus::Errored
        ) && !self.transport.is_connected()
    }

    fn set_status(&self, status: SessionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!(from = %previous, to = %status, "session status changed");
        }
    }

    fn notify(&self, level: NotificationLevel, title: &str, message: String) {
        // No subscribers is fine; notifications are fire-and-forget.
        let _ = self
            .notifications
            .send(Notification::new(level, title, message));
    }
}
