//! Wire layer for the fieldmon monitoring gateway.
//!
//! - **[`ConnectionConfig`]** / **[`GatewayOrigin`]** — validated stream
//!   descriptor and the deterministic WebSocket URL built from it.
//! - **[`Frame`]** — structural classification of decoded inbound frames.
//! - **[`OutboundCommand`]** — `ping` / `write` commands sent to the gateway.
//! - **[`Transport`]** — the seam consumed by the session layer, implemented
//!   for real sockets by [`WebSocketTransport`].

pub mod command;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod transport;
pub mod websocket;

pub use command::{CommandAction, OutboundCommand};
pub use endpoint::{ConnectionConfig, DeviceTarget, GatewayOrigin, MonitorMode, RawConnectionConfig};
pub use error::Error;
pub use frame::{ConnectedFrame, DataFrame, ErrorFrame, Frame, WriteResultFrame};
pub use transport::{Transport, TransportEvent, TransportOptions};
pub use websocket::WebSocketTransport;
