//! Command dispatch and the session driver shared by networked commands.

pub mod config_cmd;
pub mod ping;
pub mod url;
pub mod watch;
pub mod write;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;

use fieldmon_api::{Frame, WebSocketTransport};
use fieldmon_core::{
    CoreError, EventLog, EventSink, LiveDataStore, LogEntry, Notification, SessionController,
    SessionStatus,
};

use crate::cli::{Command, OutputFormat};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

/// Presentation settings resolved once per invocation.
#[derive(Debug, Clone, Copy)]
pub struct Ctx {
    pub output: OutputFormat,
    pub color: bool,
    pub quiet: bool,
    pub handshake_timeout: u64,
}

/// Dispatch a command that needs a resolved gateway target.
pub async fn dispatch(cmd: &Command, target: &Target, ctx: &Ctx) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(args, target, ctx).await,
        Command::Write(args) => write::handle(args, target, ctx).await,
        Command::Ping(args) => ping::handle(args, target, ctx).await,
        Command::Url => url::handle(target, ctx),
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not need a gateway connection".into(),
        )),
    }
}

// ── Console ──────────────────────────────────────────────────────────

/// One monitoring session plus the terminal it reports to.
///
/// Event-log lines and notifications are flushed to stderr after every
/// processed transport event, so they interleave correctly with output.
pub struct Console {
    session: SessionController<WebSocketTransport>,
    log_rx: broadcast::Receiver<LogEntry>,
    notes_rx: broadcast::Receiver<Notification>,
    ctx: Ctx,
}

impl Console {
    pub fn open(target: &Target, ctx: &Ctx) -> Self {
        let log = Arc::new(EventLog::new(target.log_capacity));
        let store = Arc::new(LiveDataStore::new());
        let transport =
            WebSocketTransport::with_options(target.origin.clone(), target.options.clone());
        let sink: Arc<dyn EventSink> = log.clone();
        let session = SessionController::new(transport, store, sink);
        Self {
            log_rx: log.subscribe(),
            notes_rx: session.subscribe_notifications(),
            session,
            ctx: *ctx,
        }
    }

    pub fn session(&self) -> &SessionController<WebSocketTransport> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionController<WebSocketTransport> {
        &mut self.session
    }

    pub fn store(&self) -> &Arc<LiveDataStore> {
        self.session.store()
    }

    /// Connect and wait, bounded by `--handshake-timeout`, for the
    /// gateway's `connected` frame.
    pub async fn start(&mut self, target: &Target) -> Result<(), CliError> {
        let connected = self.session.connect(target.connection.clone()).await;
        self.flush();
        connected.map_err(|err| match err {
            CoreError::ConnectionFailed { reason, .. } => CliError::ConnectionFailed {
                target: format!("gateway {}", target.origin.host()),
                reason,
            },
            other => other.into(),
        })?;

        let seconds = self.ctx.handshake_timeout;
        let handshake = async {
            loop {
                self.next_frame().await?;
                match self.session.status() {
                    SessionStatus::Connected => return Ok(()),
                    SessionStatus::Errored | SessionStatus::Disconnected => {
                        return Err(self.ended());
                    }
                    SessionStatus::Idle | SessionStatus::Connecting => {}
                }
            }
        };
        match tokio::time::timeout(Duration::from_secs(seconds), handshake).await {
            Ok(result) => result,
            Err(_) => Err(CliError::Timeout {
                what: "the gateway handshake".into(),
                seconds,
            }),
        }
    }

    /// Process one transport event and flush what it logged.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, CliError> {
        let frame = self.session.process_next_event().await;
        self.flush();
        Ok(frame?)
    }

    /// Wait for the first frame `pick` accepts. Fails when the session
    /// drops or `seconds` elapse first.
    pub async fn await_frame<R>(
        &mut self,
        what: &str,
        seconds: u64,
        mut pick: impl FnMut(Frame) -> Option<R>,
    ) -> Result<R, CliError> {
        let wait = async {
            loop {
                if let Some(found) = self.next_frame().await?.and_then(&mut pick) {
                    return Ok(found);
                }
                if !self.session.is_connected() {
                    return Err(self.ended());
                }
            }
        };
        match tokio::time::timeout(Duration::from_secs(seconds), wait).await {
            Ok(result) => result,
            Err(_) => Err(CliError::Timeout {
                what: what.into(),
                seconds,
            }),
        }
    }

    /// The error describing why the session is no longer connected.
    pub fn ended(&self) -> CliError {
        CliError::SessionClosed {
            reason: self
                .session
                .last_error()
                .unwrap_or("connection closed by gateway")
                .to_owned(),
        }
    }

    pub fn close(&mut self) {
        self.session.disconnect();
        self.flush();
        let stats = self.session.stats();
        debug!(
            sent = stats.messages_sent,
            received = stats.messages_received,
            errors = stats.error_count,
            "session closed"
        );
    }

    fn flush(&mut self) {
        loop {
            match self.log_rx.try_recv() {
                Ok(entry) => output::print_log_entry(&entry, self.ctx.color, self.ctx.quiet),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "event log output lagged");
                }
                Err(_) => break,
            }
        }
        loop {
            match self.notes_rx.try_recv() {
                Ok(note) => output::print_notification(&note, self.ctx.color),
                Err(TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
    }
}
