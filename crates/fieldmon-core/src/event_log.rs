// ── Event log sink ──
//
// Append-only bounded ring of human-readable events. The session
// controller only sees the narrow `EventSink` trait; display layers
// read the ring or subscribe to live entries.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString};
use tokio::sync::broadcast;

/// Default number of entries retained before the oldest is evicted.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

const LIVE_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One line in the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity,
            self.message
        )
    }
}

/// Where state-transition events are reported.
pub trait EventSink: Send + Sync {
    fn record(&self, severity: Severity, message: &str);
}

/// Bounded in-memory [`EventSink`] with a live broadcast feed.
pub struct EventLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    live: broadcast::Sender<LogEntry>,
}

impl EventLog {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(LIVE_CHANNEL_SIZE);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            live,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries oldest-first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Receive entries as they are recorded. Slow receivers lag rather
    /// than block the recorder.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.live.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<LogEntry>> {
        // The ring holds plain data, so a poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl EventSink for EventLog {
    fn record(&self, severity: Severity, message: &str) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            severity,
            message: message.to_owned(),
        };
        {
            let mut entries = self.lock();
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }
        let _ = self.live.send(entry);
    }
}
