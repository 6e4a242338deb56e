//! Session layer between `fieldmon-api` and console consumers.
//!
//! - **[`SessionController`]** — owns one [`Transport`](fieldmon_api::Transport),
//!   turns its lifecycle events into [`SessionStatus`] transitions, applies
//!   the handshake rule and contains critical gateway errors.
//!
//! - **[`LiveDataStore`]** — per-device snapshots built from `data` frames,
//!   stored in a lock-free reactive collection (`DashMap` + `watch`).
//!
//! - **[`EntityStream`]** — subscription handle vended by the store, with
//!   `current()` / `latest()` / `changed()` for reactive rendering.
//!
//! - **[`EventLog`]** — bounded ring of human-readable events, seen by the
//!   controller only through the [`EventSink`] trait.

pub mod error;
pub mod event_log;
pub mod notification;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::CoreError;
pub use event_log::{DEFAULT_LOG_CAPACITY, EventLog, EventSink, LogEntry, Severity};
pub use notification::{Notification, NotificationLevel};
pub use session::{CriticalErrorCode, SessionController, SessionStats, SessionStatus};
pub use store::{DeviceSnapshot, LiveDataStore, ParameterReading};
pub use stream::EntityStream;
