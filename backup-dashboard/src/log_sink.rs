//! Bounded log panel buffer.
//!
//! Server log lines and local notifications share one FIFO buffer in
//! arrival order. Local notifications are never sent to the server.

use chrono::Local;
use std::collections::VecDeque;

use crate::models::LogEntry;

/// Default panel capacity
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

impl NotificationKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            NotificationKind::Info => "[INFO]",
            NotificationKind::Success => "[SUCCESS]",
            NotificationKind::Error => "[ERROR]",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, NotificationKind::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrigin {
    Server,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkEntry {
    /// Arrival number, increasing for the life of the sink
    pub seq: u64,
    /// Raw timestamp; server-provided or generated locally
    pub timestamp: String,
    pub message: String,
    pub is_success: bool,
    pub origin: LogOrigin,
}

/// Whether the panel holds a full server load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct LogSink {
    capacity: usize,
    entries: VecDeque<SinkEntry>,
    state: LoadState,
    next_seq: u64,
    /// Bumped by every full reload or failed load
    generation: u64,
}

impl LogSink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            state: LoadState::Loading,
            next_seq: 0,
            generation: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Changes whenever the buffer is rebuilt rather than appended to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entries(&self) -> impl Iterator<Item = &SinkEntry> {
        self.entries.iter()
    }

    /// Append one durable server entry (`log_updated`).
    pub fn append_server(&mut self, entry: LogEntry) {
        self.push(SinkEntry {
            seq: 0,
            timestamp: entry.timestamp,
            message: entry.message,
            is_success: entry.is_success,
            origin: LogOrigin::Server,
        });
    }

    /// Append an ephemeral local line with a client timestamp.
    pub fn append_local(&mut self, message: impl Into<String>, is_success: bool) {
        self.push(SinkEntry {
            seq: 0,
            timestamp: Local::now().to_rfc3339(),
            message: message.into(),
            is_success,
            origin: LogOrigin::Local,
        });
    }

    /// Record a user notification, prefixed with its kind.
    pub fn notify(&mut self, kind: NotificationKind, message: &str) {
        self.append_local(format!("{} {}", kind.prefix(), message), kind.is_success());
    }

    /// Replace the buffer with a full server load, keeping the newest entries.
    pub fn replace(&mut self, entries: Vec<LogEntry>) {
        self.entries.clear();
        let skip = entries.len().saturating_sub(self.capacity);
        for entry in entries.into_iter().skip(skip) {
            self.append_server(entry);
        }
        self.state = LoadState::Loaded;
        self.generation += 1;
    }

    /// A full load failed. Buffered lines are dropped, as with a reload.
    pub fn load_failed(&mut self, reason: impl Into<String>) {
        self.entries.clear();
        self.state = LoadState::Failed(reason.into());
        self.generation += 1;
    }

    fn push(&mut self, mut entry: SinkEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
