//! In-process fake backup server.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

use backup_dashboard::Config;

pub const ARCHIVE: &[u8] = b"PK\x03\x04 fake zip body";

#[derive(Default)]
pub struct FakeState {
    pub backups: Vec<Value>,
    pub latest: Value,
    pub auto: Value,
    pub logs: Vec<Value>,
    /// "METHOD /path" of every request, in arrival order
    pub requests: Vec<String>,
    /// Answer `/events` with 503
    pub events_down: bool,
}

#[derive(Clone)]
pub struct FakeServer {
    state: Arc<Mutex<FakeState>>,
    events: broadcast::Sender<String>,
    pub addr: SocketAddr,
}

impl FakeServer {
    pub async fn start(initial: FakeState) -> Self {
        let (events, _) = broadcast::channel(64);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = FakeServer {
            state: Arc::new(Mutex::new(initial)),
            events,
            addr: listener.local_addr().unwrap(),
        };

        let router = Router::new()
            .route("/backups", get(list_backups))
            .route("/backup", post(create_backup))
            .route("/backup/{id}", delete(delete_backup))
            .route("/backup/{id}/stats", get(backup_stats))
            .route("/backup/{id}/download", get(download))
            .route("/latest-stats", get(latest_stats))
            .route("/auto-backup", post(start_auto_backup))
            .route("/stop-auto-backup", post(stop_auto_backup))
            .route("/auto-backup-status", get(auto_backup_status))
            .route("/logs", get(logs))
            .route("/events", get(self::events))
            .with_state(server.clone());

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        server
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client config pointed at this server with short timers.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.server.url = self.url();
        config.server.request_timeout_secs = 5;
        config.stream.initial_backoff_ms = 50;
        config.stream.max_backoff_ms = 200;
        config.dashboard.poll_interval_secs = 1;
        config
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn count(&self, request: &str) -> usize {
        self.state().requests.iter().filter(|r| *r == request).count()
    }

    pub fn push(&self, message: Value) {
        let _ = self.events.send(message.to_string());
    }

    fn record(&self, request: String) {
        self.state().requests.push(request);
    }
}

pub fn backup(id: &str, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "date": "2024-01-01T09:30:00",
        "content": "12 Anime, 3 Manga"
    })
}

pub fn stats(username: &str) -> Value {
    json!({
        "username": username,
        "last_updated": "2024-01-01T09:30:00",
        "anime": {"totalEntries": 12, "episodesWatched": 240, "meanScore": 7.5, "status": {"watching": 2, "completed": 10}},
        "manga": {"totalEntries": 3, "chaptersRead": 90, "volumesRead": 9, "meanScore": 0, "status": {"reading": 3}}
    })
}

async fn list_backups(State(server): State<FakeServer>) -> Json<Value> {
    server.record("GET /backups".to_string());
    Json(Value::Array(server.state().backups.clone()))
}

async fn create_backup(State(server): State<FakeServer>, Json(body): Json<Value>) -> Json<Value> {
    server.record("POST /backup".to_string());
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let id = format!("{}_20240101_093000", username);
    {
        let mut state = server.state();
        state.backups.push(backup(&id, &username));
        state.latest = stats(&username);
    }

    let snapshot = stats(&username);
    server.push(json!({
        "type": "backup_created",
        "data": {
            "username": username,
            "timestamp": "2024-01-01T09:30:00",
            "stats": {"anime": snapshot["anime"], "manga": snapshot["manga"]}
        }
    }));
    Json(json!({"status": "success", "message": format!("Backup created for {}", username)}))
}

async fn delete_backup(State(server): State<FakeServer>, Path(id): Path<String>) -> Response {
    server.record(format!("DELETE /backup/{}", id));
    let removed = {
        let mut state = server.state();
        let before = state.backups.len();
        state.backups.retain(|b| b["id"] != id.as_str());
        before != state.backups.len()
    };
    if !removed {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "Backup not found"}))).into_response();
    }
    server.push(json!({"type": "backup_deleted", "data": {"id": id}}));
    Json(json!({"status": "success"})).into_response()
}

async fn backup_stats(State(server): State<FakeServer>, Path(id): Path<String>) -> Response {
    server.record(format!("GET /backup/{}/stats", id));
    let state = server.state();
    match state.backups.iter().find(|b| b["id"] == id.as_str()) {
        Some(b) => {
            let full = stats(b["username"].as_str().unwrap_or_default());
            Json(json!({"anime": full["anime"], "manga": full["manga"]})).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "Backup not found"}))).into_response(),
    }
}

async fn download(State(server): State<FakeServer>, Path(id): Path<String>) -> Response {
    server.record(format!("GET /backup/{}/download", id));
    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.zip\"", id),
            ),
        ],
        ARCHIVE,
    )
        .into_response()
}

async fn latest_stats(State(server): State<FakeServer>) -> Json<Value> {
    server.record("GET /latest-stats".to_string());
    let latest = server.state().latest.clone();
    Json(if latest.is_null() { json!({}) } else { latest })
}

async fn start_auto_backup(State(server): State<FakeServer>, Json(body): Json<Value>) -> Json<Value> {
    server.record("POST /auto-backup".to_string());
    server.state().auto = json!({"running": true, "config": body});
    Json(json!({"status": "success"}))
}

async fn stop_auto_backup(State(server): State<FakeServer>) -> Response {
    server.record("POST /stop-auto-backup".to_string());
    let mut state = server.state();
    if state.auto["running"] != true {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No auto backup running"})))
            .into_response();
    }
    state.auto = json!({"running": false});
    Json(json!({"status": "success"})).into_response()
}

async fn auto_backup_status(State(server): State<FakeServer>) -> Json<Value> {
    server.record("GET /auto-backup-status".to_string());
    let auto = server.state().auto.clone();
    Json(if auto.is_null() { json!({"running": false}) } else { auto })
}

async fn logs(State(server): State<FakeServer>) -> Json<Value> {
    server.record("GET /logs".to_string());
    Json(Value::Array(server.state().logs.clone()))
}

async fn events(State(server): State<FakeServer>) -> Response {
    server.record("GET /events".to_string());
    if server.state().events_down {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let rx = server.events.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(data) => return Some((Ok::<Event, Infallible>(Event::default().data(data)), rx)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_millis(100)))
        .into_response()
}
