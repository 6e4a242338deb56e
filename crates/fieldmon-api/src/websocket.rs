//! WebSocket transport with heartbeat and single-shot reconnect.
//!
//! One background task owns the socket for the lifetime of a connection
//! request. It reports lifecycle events through an ordered channel,
//! sends a `ping` command on a fixed interval, and after an unexpected
//! close schedules exactly one reconnect attempt with the same config.
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldmon_api::{ConnectionConfig, GatewayOrigin, Transport, WebSocketTransport};
//!
//! let origin: GatewayOrigin = "http://gateway.local:8000".parse()?;
//! let mut transport = WebSocketTransport::new(origin);
//! transport.connect(&ConnectionConfig::single("17")?).await?;
//!
//! while let Some(event) = transport.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::command::OutboundCommand;
use crate::endpoint::{ConnectionConfig, GatewayOrigin};
use crate::error::Error;
use crate::transport::{
    CLOSE_ABNORMAL, Transport, TransportEvent, TransportOptions, should_reconnect,
};

/// Close frame received without a status code.
const CLOSE_NO_STATUS: u16 = 1005;

// ── Shared flags ─────────────────────────────────────────────────────

/// Flags read by the socket task and written by the owning handle.
#[derive(Debug, Default)]
struct SocketFlags {
    connected: AtomicBool,
    manual_close: AtomicBool,
    reconnect_suppressed: AtomicBool,
}

// ── WebSocketTransport ───────────────────────────────────────────────

/// [`Transport`] over a real tokio-tungstenite socket.
pub struct WebSocketTransport {
    origin: GatewayOrigin,
    options: TransportOptions,
    flags: Arc<SocketFlags>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    outbound_tx: Option<mpsc::UnboundedSender<Message>>,
    cancel: Option<CancellationToken>,
}

impl WebSocketTransport {
    pub fn new(origin: GatewayOrigin) -> Self {
        Self::with_options(origin, TransportOptions::default())
    }

    /// Out-of-range timers in `options` are clamped, see
    /// [`TransportOptions::clamped`].
    pub fn with_options(origin: GatewayOrigin, options: TransportOptions) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            origin,
            options: options.clamped(),
            flags: Arc::new(SocketFlags::default()),
            event_tx,
            event_rx,
            outbound_tx: None,
            cancel: None,
        }
    }

    pub fn origin(&self) -> &GatewayOrigin {
        &self.origin
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Stop the current socket task, if any, without touching the
    /// user-initiated flag.
    ///
    /// Events the old socket already queued are discarded along with its
    /// channel, so nothing from a torn-down connection reaches `recv`.
    fn stop_task(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.outbound_tx = None;
        self.flags.connected.store(false, Ordering::SeqCst);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.event_tx = event_tx;
        self.event_rx = event_rx;
    }
}

impl Transport for WebSocketTransport {
    async fn connect(&mut self, config: &ConnectionConfig) -> Result<(), Error> {
        let url = self.origin.websocket_url(config)?;
        self.stop_task();
        self.flags.manual_close.store(false, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = SocketTask {
            url,
            options: self.options.clone(),
            flags: Arc::clone(&self.flags),
            events: self.event_tx.clone(),
            outbound: outbound_rx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run(ready_tx));

        self.cancel = Some(cancel);
        self.outbound_tx = Some(outbound_tx);

        ready_rx.await.map_err(|_| {
            Error::WebSocketConnect("socket task ended before the handshake completed".into())
        })?
    }

    fn disconnect(&mut self) {
        self.flags.manual_close.store(true, Ordering::SeqCst);
        if self.cancel.is_some() {
            tracing::debug!("closing WebSocket (user-initiated)");
        }
        self.stop_task();
    }

    fn send(&self, command: &OutboundCommand) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::NotOpen);
        }
        let tx = self.outbound_tx.as_ref().ok_or(Error::NotOpen)?;
        let json = command.to_json()?;
        tx.send(Message::text(json)).map_err(|_| Error::NotOpen)
    }

    fn is_connected(&self) -> bool {
        self.flags.connected.load(Ordering::SeqCst)
    }

    fn prevent_reconnection(&self) {
        self.flags.reconnect_suppressed.store(true, Ordering::SeqCst);
    }

    fn allow_reconnection(&self) {
        self.flags.reconnect_suppressed.store(false, Ordering::SeqCst);
    }

    fn is_reconnection_suppressed(&self) -> bool {
        self.flags.reconnect_suppressed.load(Ordering::SeqCst)
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.event_rx.recv().await
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

// ── Socket task ──────────────────────────────────────────────────────

struct SocketTask {
    url: Url,
    options: TransportOptions,
    flags: Arc<SocketFlags>,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
}

/// How a single open socket ended.
enum SocketEnd {
    /// User-initiated; no close event is reported.
    Cancelled,
    Closed { code: u16, reason: String },
}

impl SocketTask {
    /// Connect → pump → on unexpected close, wait once and reconnect.
    async fn run(mut self, ready: oneshot::Sender<Result<(), Error>>) {
        let mut ready = Some(ready);

        loop {
            tracing::info!(url = %self.url, "connecting to WebSocket");

            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
            };

            let ws = match result {
                Ok((ws, _response)) => ws,
                Err(e) => {
                    let err = Error::from(e);
                    self.emit(TransportEvent::Error {
                        message: err.to_string(),
                    });
                    if let Some(ready) = ready.take() {
                        tracing::warn!(error = %err, "WebSocket connection failed");
                        let _ = ready.send(Err(err));
                    } else {
                        tracing::warn!(error = %err, "reconnection attempt failed");
                    }
                    break;
                }
            };

            self.flags.connected.store(true, Ordering::SeqCst);
            tracing::info!("WebSocket connected");
            self.emit(TransportEvent::Opened);
            if let Some(ready) = ready.take() {
                let _ = ready.send(Ok(()));
            }

            let end = pump(
                ws,
                &self.options,
                &self.cancel,
                &mut self.outbound,
                &self.events,
            )
            .await;
            self.flags.connected.store(false, Ordering::SeqCst);

            let SocketEnd::Closed { code, reason } = end else {
                break;
            };

            tracing::info!(code, reason = %reason, "WebSocket closed");
            self.emit(TransportEvent::Closed {
                code,
                reason: reason.clone(),
            });

            if !self.reconnect_allowed(code) {
                tracing::debug!(code, "not reconnecting");
                break;
            }

            let delay = self.options.reconnect_delay;
            tracing::info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "scheduling reconnect"
            );
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            // The latch may have been set while the timer was pending.
            if self.flags.reconnect_suppressed.load(Ordering::SeqCst) {
                tracing::debug!("reconnect suppressed while pending");
                break;
            }
        }

        self.flags.connected.store(false, Ordering::SeqCst);
        tracing::debug!("WebSocket task exiting");
    }

    fn reconnect_allowed(&self, code: u16) -> bool {
        should_reconnect(
            self.flags.manual_close.load(Ordering::SeqCst),
            self.flags.reconnect_suppressed.load(Ordering::SeqCst),
            code,
        )
    }

    fn emit(&self, event: TransportEvent) {
        // Ignore send errors -- the handle dropped or moved to a new channel.
        let _ = self.events.send(event);
    }
}

/// Drive one open socket until it closes or the task is cancelled.
async fn pump<S>(
    ws: WebSocketStream<S>,
    options: &TransportOptions,
    cancel: &CancellationToken,
    outbound: &mut mpsc::UnboundedReceiver<Message>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> SocketEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();
    let mut heartbeat = tokio::time::interval(options.heartbeat_interval);
    heartbeat.tick().await; // consume the immediate first tick

    loop {
        let outgoing = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: String::from("client disconnect").into(),
                };
                if let Err(e) = write.send(Message::Close(Some(frame))).await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                return SocketEnd::Cancelled;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        decode_and_emit(text.as_str(), events);
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return match frame {
                            Some(cf) => SocketEnd::Closed {
                                code: u16::from(cf.code),
                                reason: cf.reason.as_str().to_owned(),
                            },
                            None => SocketEnd::Closed {
                                code: CLOSE_NO_STATUS,
                                reason: String::new(),
                            },
                        };
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket read error");
                        let _ = events.send(TransportEvent::Error {
                            message: e.to_string(),
                        });
                        return abnormal_close(e.to_string());
                    }
                    None => return abnormal_close("stream ended".into()),
                    // Binary, Ping (auto-answered), Pong, raw Frame
                    Some(Ok(_)) => continue,
                }
            }
            Some(message) = outbound.recv() => message,
            _ = heartbeat.tick() => match OutboundCommand::ping().to_json() {
                Ok(json) => {
                    tracing::trace!("heartbeat ping");
                    Message::text(json)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode heartbeat");
                    continue;
                }
            },
        };

        if let Err(e) = write.send(outgoing).await {
            tracing::warn!(error = %e, "WebSocket write failed");
            let _ = events.send(TransportEvent::Error {
                message: e.to_string(),
            });
            return abnormal_close(e.to_string());
        }
    }
}

fn abnormal_close(reason: String) -> SocketEnd {
    SocketEnd::Closed {
        code: CLOSE_ABNORMAL,
        reason,
    }
}

/// Decode a text frame as JSON and forward it. Malformed frames are
/// dropped.
fn decode_and_emit(text: &str, events: &mpsc::UnboundedSender<TransportEvent>) {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            let _ = events.send(TransportEvent::Message(value));
        }
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed WebSocket frame");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
