//! Server push channel (`GET /events`).
//!
//! Typed events from the backup server:
//! - `backup_created` / `backup_deleted`: the backup set changed
//! - `latest_stats_updated`: a full replacement for the latest-stats panel
//! - `log_updated`: one new durable log line
//!
//! Anything else is dropped without surfacing an error, so newer servers can
//! add message types without breaking this client.

pub mod client;
pub mod sse;

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::models::{LogEntry, StatsSnapshot};
use crate::Result;

/// Message types this client understands.
const KNOWN_TYPES: [&str; 4] = [
    "backup_created",
    "backup_deleted",
    "latest_stats_updated",
    "log_updated",
];

/// Events pushed by the backup server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "backup_created")]
    BackupCreated(BackupCreatedPayload),

    #[serde(rename = "backup_deleted")]
    BackupDeleted { id: String },

    /// Carries a full snapshot; applied without a refetch
    #[serde(rename = "latest_stats_updated")]
    LatestStatsUpdated(StatsSnapshot),

    #[serde(rename = "log_updated")]
    LogUpdated(LogEntry),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackupCreatedPayload {
    pub username: String,
    pub timestamp: String,
    /// Only `anime`/`manga` are present; username and timestamp come from the payload
    #[serde(default, deserialize_with = "crate::models::lenient")]
    pub stats: Option<StatsSnapshot>,
}

impl BackupCreatedPayload {
    /// The latest-stats snapshot implied by this backup, if it carried stats.
    pub fn latest_stats(&self) -> Option<StatsSnapshot> {
        self.stats.as_ref().map(|stats| StatsSnapshot {
            anime: stats.anime.clone(),
            manga: stats.manga.clone(),
            username: Some(self.username.clone()),
            last_updated: Some(self.timestamp.clone()),
        })
    }
}

/// Outcome of decoding one message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Empty payload or `{}`
    Heartbeat,
    Event(ServerEvent),
    /// Well-formed JSON this client does not act on (unknown type, bad shape)
    Ignored(String),
}

/// Decode a message payload. Only non-JSON input is an error.
pub fn decode_message(data: &str) -> Result<Decoded> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Decoded::Heartbeat);
    }

    let value: Value = serde_json::from_str(data)?;
    if value.as_object().is_some_and(|o| o.is_empty()) {
        return Ok(Decoded::Heartbeat);
    }

    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Ok(Decoded::Ignored("message has no type".to_string()));
    };
    if !KNOWN_TYPES.contains(&kind) {
        return Ok(Decoded::Ignored(format!("unrecognized message type '{}'", kind)));
    }

    let kind = kind.to_string();
    match serde_json::from_value::<ServerEvent>(value) {
        Ok(event) => Ok(Decoded::Event(event)),
        Err(e) => Ok(Decoded::Ignored(format!("invalid '{}' payload: {}", kind, e))),
    }
}

/// Push connection lifecycle. A failed stream always passes through
/// `Closed` before the next `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What the stream client reports to its subscriber, in server order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    State(ConnectionState),
    Event(ServerEvent),
    /// The connection failed; `retry_in` is `None` when no reconnect will follow.
    Failed {
        reason: String,
        retry_in: Option<Duration>,
    },
}
