//! Push channel client. Owns the one live `GET /events` connection.
//!
//! The connection runs on its own task and reports `StreamUpdate`s on an
//! `mpsc` channel in the order the server sent them. After a failure the
//! configured reconnect policy decides whether (and when) to try again.

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Url};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::sse::{SseDecoder, SseFrame};
use super::{decode_message, ConnectionState, Decoded, StreamUpdate};
use crate::config::{ReconnectMode, StreamConfig};
use crate::DashboardError;

/// Reconnect delays: bounded exponential backoff, or no reconnect at all.
#[derive(Debug, Clone)]
pub struct Backoff {
    mode: ReconnectMode,
    initial: Duration,
    max: Duration,
    max_attempts: Option<u32>,
    current: Duration,
    attempts: u32,
    server_hint: Option<Duration>,
}

impl Backoff {
    pub fn new(config: &StreamConfig) -> Self {
        let initial = Duration::from_millis(config.initial_backoff_ms);
        Self {
            mode: config.reconnect,
            initial,
            max: Duration::from_millis(config.max_backoff_ms),
            max_attempts: config.max_attempts,
            current: initial,
            attempts: 0,
            server_hint: None,
        }
    }

    /// Called after a successful handshake
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }

    /// A `retry:` value from the server replaces the next delay (still capped).
    pub fn set_server_hint(&mut self, delay: Duration) {
        self.server_hint = Some(delay.min(self.max));
    }

    /// Delay before the next attempt, or `None` to stay closed.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.mode == ReconnectMode::Never {
            return None;
        }
        self.attempts += 1;
        if self.max_attempts.is_some_and(|max| self.attempts > max) {
            return None;
        }

        let delay = self.server_hint.take().unwrap_or(self.current);
        self.current = (self.current * 2).min(self.max);
        Some(delay)
    }
}

struct Connection {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Single owner of the push connection.
pub struct EventStreamClient {
    http: Client,
    url: Url,
    config: StreamConfig,
    updates: mpsc::Sender<StreamUpdate>,
    shutdown: CancellationToken,
    connection: Option<Connection>,
}

impl EventStreamClient {
    pub fn new(
        http: Client,
        url: Url,
        config: StreamConfig,
        updates: mpsc::Sender<StreamUpdate>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            http,
            url,
            config,
            updates,
            shutdown,
            connection: None,
        }
    }

    /// Open the push connection, closing any existing one first.
    pub fn connect(&mut self) {
        self.disconnect();

        let cancel = self.shutdown.child_token();
        let runner = Runner {
            http: self.http.clone(),
            url: self.url.clone(),
            backoff: Backoff::new(&self.config),
            idle_timeout: Duration::from_secs(self.config.idle_timeout_secs),
            updates: self.updates.clone(),
            cancel: cancel.clone(),
            last_event_id: None,
        };

        let handle = tokio::spawn(runner.run());
        self.connection = Some(Connection { cancel, handle });
    }

    /// Close the push connection, if any.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
            connection.handle.abort();
            let _ = self.updates.try_send(StreamUpdate::State(ConnectionState::Closed));
            info!("Push connection closed");
        }
    }

    /// Whether a connection task is live (it may be between reconnects).
    pub fn is_active(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| !c.handle.is_finished())
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
            connection.handle.abort();
        }
    }
}

struct Runner {
    http: Client,
    url: Url,
    backoff: Backoff,
    idle_timeout: Duration,
    updates: mpsc::Sender<StreamUpdate>,
    cancel: CancellationToken,
    last_event_id: Option<String>,
}

impl Runner {
    /// Connect, read until failure, then apply the reconnect policy.
    async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            if !self.send(StreamUpdate::State(ConnectionState::Connecting)).await {
                return;
            }

            let error = match self.connect_and_read().await {
                Ok(()) => {
                    debug!("Push connection task stopping");
                    return;
                }
                Err(e) => e,
            };

            warn!("Push connection error: {}", error);
            let retry_in = self.backoff.next_delay();

            if !self.send(StreamUpdate::State(ConnectionState::Closed)).await {
                return;
            }
            let failed = StreamUpdate::Failed {
                reason: error.to_string(),
                retry_in,
            };
            if !self.send(failed).await {
                return;
            }

            let Some(delay) = retry_in else {
                info!("Push connection stays closed (reconnect policy exhausted)");
                return;
            };

            info!("Reconnecting in {}ms...", delay.as_millis());
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => return,
            }
        }
    }

    /// `Ok(())` only when cancelled; every other exit is a stream error.
    async fn connect_and_read(&mut self) -> Result<(), DashboardError> {
        info!("Connecting to push channel: {}", self.url);

        let mut request = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = &self.last_event_id {
            request = request.header("Last-Event-ID", id.as_str());
        }

        let response = tokio::select! {
            response = request.send() => response.map_err(|e| DashboardError::Stream(e.to_string()))?,
            _ = self.cancel.cancelled() => return Ok(()),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::Stream(format!(
                "handshake failed with status {}",
                status
            )));
        }

        self.backoff.reset();
        if !self.send(StreamUpdate::State(ConnectionState::Open)).await {
            return Ok(());
        }
        info!("Push channel open");

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        loop {
            tokio::select! {
                chunk = tokio::time::timeout(self.idle_timeout, body.next()) => {
                    let bytes = match chunk {
                        Ok(Some(Ok(bytes))) => bytes,
                        Ok(Some(Err(e))) => return Err(DashboardError::Stream(e.to_string())),
                        Ok(None) => return Err(DashboardError::Stream("server closed the event stream".to_string())),
                        Err(_) => {
                            return Err(DashboardError::Stream(format!(
                                "no data or keep-alive for {}s",
                                self.idle_timeout.as_secs()
                            )))
                        }
                    };

                    for frame in decoder.feed(&bytes) {
                        if let Some(update) = dispatch(&frame) {
                            if !self.send(update).await {
                                return Ok(());
                            }
                        }
                    }

                    if let Some(id) = decoder.last_event_id() {
                        self.last_event_id = Some(id.to_string());
                    }
                    if let Some(ms) = decoder.take_retry_ms() {
                        self.backoff.set_server_hint(Duration::from_millis(ms));
                    }
                }

                _ = self.cancel.cancelled() => return Ok(()),
            }
        }
    }

    /// Forward an update; `false` once the subscriber is gone.
    async fn send(&self, update: StreamUpdate) -> bool {
        if self.updates.send(update).await.is_err() {
            debug!("Push subscriber dropped, stopping connection task");
            self.cancel.cancel();
            return false;
        }
        true
    }
}

/// Turn one SSE frame into an update. Heartbeats, named events, unknown
/// types and unparseable payloads yield nothing.
fn dispatch(frame: &SseFrame) -> Option<StreamUpdate> {
    if !frame.is_message() {
        trace!("Ignoring '{}' event", frame.event.as_deref().unwrap_or_default());
        return None;
    }

    match decode_message(&frame.data) {
        Ok(Decoded::Event(event)) => Some(StreamUpdate::Event(event)),
        Ok(Decoded::Heartbeat) => {
            trace!("Heartbeat");
            None
        }
        Ok(Decoded::Ignored(reason)) => {
            debug!("Dropping push message: {}", reason);
            None
        }
        Err(e) => {
            warn!("Failed to parse push message: {} (raw: {})", e, frame.data);
            None
        }
    }
}
