//! End-to-end runs of the live dashboard against the fake server.

mod common;

use serde_json::json;
use std::collections::BTreeSet;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use backup_dashboard::api::ApiClient;
use backup_dashboard::app::render::Renderer;
use backup_dashboard::app::{App, AppEvent};
use backup_dashboard::log_sink::LogOrigin;
use backup_dashboard::reconcile::views::{AutoBackupControl, BackupTableView, ButtonStyle, StatsPanel};
use backup_dashboard::reconcile::{Dashboard, Surface, STREAM_OUTAGE};
use backup_dashboard::stream::ConnectionState;
use backup_dashboard::Config;
use common::{backup, stats, FakeServer, FakeState};

/// Everything the dashboard last rendered.
#[derive(Debug, Clone)]
struct Seen {
    table: BackupTableView,
    latest: StatsPanel,
    modal: Option<StatsPanel>,
    auto: AutoBackupControl,
    logs: Vec<String>,
    /// Every local notification rendered so far, keyed by timestamp
    notified: BTreeSet<(String, String)>,
    connection: ConnectionState,
    alerts: Vec<String>,
    messages: Vec<String>,
}

#[derive(Clone)]
struct Recorder(Arc<Mutex<Option<Seen>>>);

impl Renderer for Recorder {
    fn render(&mut self, dashboard: &Dashboard, _changed: &BTreeSet<Surface>) -> io::Result<()> {
        let mut seen = self.0.lock().unwrap();
        let (alerts, messages, mut notified) = seen
            .take()
            .map(|s| (s.alerts, s.messages, s.notified))
            .unwrap_or_default();
        notified.extend(
            dashboard
                .log_sink()
                .entries()
                .filter(|e| e.origin == LogOrigin::Local)
                .map(|e| (e.timestamp.clone(), e.message.clone())),
        );
        *seen = Some(Seen {
            table: dashboard.backup_table().clone(),
            latest: dashboard.latest_stats().clone(),
            modal: dashboard.stats_modal().map(|m| m.panel.clone()),
            auto: dashboard.auto_backup(),
            logs: dashboard.log_sink().entries().map(|e| e.message.clone()).collect(),
            notified,
            connection: dashboard.connection(),
            alerts,
            messages,
        });
        Ok(())
    }

    fn alert(&mut self, message: &str) -> io::Result<()> {
        if let Some(seen) = self.0.lock().unwrap().as_mut() {
            seen.alerts.push(message.to_string());
        }
        Ok(())
    }

    fn message(&mut self, text: &str) -> io::Result<()> {
        if let Some(seen) = self.0.lock().unwrap().as_mut() {
            seen.messages.push(text.to_string());
        }
        Ok(())
    }
}

struct Running {
    recorder: Recorder,
    input: mpsc::Sender<AppEvent>,
    shutdown: CancellationToken,
    handle: JoinHandle<backup_dashboard::Result<Dashboard>>,
}

impl Running {
    fn start(config: &Config) -> Self {
        let recorder = Recorder(Arc::new(Mutex::new(None)));
        let shutdown = CancellationToken::new();
        let api = ApiClient::new(config).unwrap();
        let app = App::new(config, api, recorder.clone(), shutdown.clone());
        let input = app.sender();
        let handle = tokio::spawn(app.run());
        Running {
            recorder,
            input,
            shutdown,
            handle,
        }
    }

    async fn type_line(&self, line: &str) {
        self.input.send(AppEvent::Input(line.to_string())).await.unwrap();
    }

    async fn wait_for(&self, what: &str, check: impl Fn(&Seen) -> bool) -> Seen {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(seen) = self.recorder.0.lock().unwrap().as_ref() {
                if check(seen) {
                    return seen.clone();
                }
            }
            if tokio::time::Instant::now() > deadline {
                panic!(
                    "timed out waiting for {}; last seen: {:#?}",
                    what,
                    self.recorder.0.lock().unwrap()
                );
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn stop(self) -> Dashboard {
        self.shutdown.cancel();
        self.handle.await.unwrap().unwrap()
    }
}

fn notified(seen: &Seen, message: &str) -> usize {
    seen.notified.iter().filter(|(_, m)| m == message).count()
}

fn row_ids(seen: &Seen) -> Vec<String> {
    match &seen.table {
        BackupTableView::Rows(rows) => rows.iter().map(|r| r.id.clone()).collect(),
        BackupTableView::Placeholder(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_created_backup_appears_after_push() {
    let server = FakeServer::start(FakeState::default()).await;
    let app = Running::start(&server.config());

    app.wait_for("stream open and empty list", |s| {
        s.connection == ConnectionState::Open
            && s.table == BackupTableView::Placeholder("No backups found.".to_string())
    })
    .await;

    app.type_line("backup alice").await;

    let seen = app
        .wait_for("alice row", |s| row_ids(s) == vec!["alice_20240101_093000"])
        .await;
    let BackupTableView::Rows(rows) = &seen.table else {
        unreachable!()
    };
    assert_eq!(rows[0].username, "alice");
    assert_eq!(rows[0].date, "2024-01-01 09:30:00");

    let seen = app
        .wait_for("latest stats from push", |s| matches!(s.latest, StatsPanel::Ready(_)))
        .await;
    let StatsPanel::Ready(view) = &seen.latest else {
        unreachable!()
    };
    assert_eq!(view.categories[0].title, "Anime Stats (alice)");
    assert_eq!(view.categories[1].stats.last().unwrap().value, "N/A");

    app.wait_for("notifications", |s| {
        notified(s, "[SUCCESS] Backup created for alice") >= 1
    })
    .await;

    let dashboard = app.stop().await;
    assert!(dashboard.controls().is_enabled(backup_dashboard::dispatch::CommandKind::CreateBackup));
    assert_eq!(server.count("POST /backup"), 1);
    assert!(server.count("GET /backups") >= 2);
}

#[tokio::test]
async fn test_deleted_backup_disappears_and_stats_refetched() {
    let server = FakeServer::start(FakeState {
        backups: vec![backup("b1", "alice"), backup("b2", "bob")],
        latest: stats("bob"),
        ..FakeState::default()
    })
    .await;
    let app = Running::start(&server.config());

    app.wait_for("both rows", |s| {
        s.connection == ConnectionState::Open && row_ids(s) == vec!["b1", "b2"]
    })
    .await;
    let stats_before = server.count("GET /latest-stats");

    app.type_line("delete b1").await;
    app.wait_for("confirmation prompt", |s| {
        s.messages.iter().any(|m| m.contains("delete backup b1"))
    })
    .await;
    assert_eq!(server.count("DELETE /backup/b1"), 0);

    app.type_line("y").await;
    app.wait_for("b1 gone", |s| row_ids(s) == vec!["b2"]).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while server.count("GET /latest-stats") <= stats_before {
        assert!(tokio::time::Instant::now() < deadline, "latest stats not refetched");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    app.stop().await;
    assert_eq!(server.count("DELETE /backup/b1"), 1);
}

#[tokio::test]
async fn test_declined_delete_sends_nothing() {
    let server = FakeServer::start(FakeState {
        backups: vec![backup("b1", "alice")],
        ..FakeState::default()
    })
    .await;
    let app = Running::start(&server.config());
    app.wait_for("row", |s| row_ids(s) == vec!["b1"]).await;

    app.type_line("delete b1").await;
    app.type_line("n").await;
    app.wait_for("cancel message", |s| s.messages.iter().any(|m| m == "Delete cancelled."))
        .await;

    app.stop().await;
    assert_eq!(server.count("DELETE /backup/b1"), 0);
}

#[tokio::test]
async fn test_running_auto_backup_renders_stop() {
    let server = FakeServer::start(FakeState {
        auto: json!({"running": true, "config": {"username": "bob", "keepLast": 5, "interval": 24}}),
        ..FakeState::default()
    })
    .await;
    let app = Running::start(&server.config());

    let seen = app.wait_for("auto backup status", |s| s.auto.running).await;
    assert_eq!(seen.auto.button_label, "Stop");
    assert_eq!(seen.auto.button_style, ButtonStyle::Red);
    assert_eq!(seen.auto.fields.username, "bob");
    assert_eq!(seen.auto.fields.keep_last, "5");
    assert_eq!(seen.auto.fields.interval, "24");
    assert!(!seen.auto.fields.enabled);

    // stopping refreshes the control, with no push involved
    app.type_line("auto stop").await;
    let seen = app.wait_for("stopped", |s| !s.auto.running && s.auto.button_enabled).await;
    assert_eq!(seen.auto.button_label, "Start");
    assert!(seen.auto.fields.enabled);

    app.stop().await;
}

#[tokio::test]
async fn test_zero_keep_last_rejected_locally() {
    let server = FakeServer::start(FakeState::default()).await;
    let app = Running::start(&server.config());
    app.wait_for("stream open", |s| s.connection == ConnectionState::Open).await;

    app.type_line("auto start bob 0 24").await;
    let seen = app.wait_for("alert", |s| !s.alerts.is_empty()).await;
    assert!(seen.alerts[0].starts_with("Auto Backup: "));

    app.stop().await;
    assert_eq!(server.count("POST /auto-backup"), 0);
}

#[tokio::test]
async fn test_stats_modal() {
    let server = FakeServer::start(FakeState {
        backups: vec![backup("b1", "alice")],
        ..FakeState::default()
    })
    .await;
    let app = Running::start(&server.config());
    app.wait_for("row", |s| row_ids(s) == vec!["b1"]).await;

    app.type_line("stats b1").await;
    let seen = app
        .wait_for("modal stats", |s| matches!(s.modal, Some(StatsPanel::Ready(_))))
        .await;
    let Some(StatsPanel::Ready(view)) = seen.modal else {
        unreachable!()
    };
    assert_eq!(view.categories[0].title, "Anime Statistics");
    assert_eq!(view.categories[0].stats[2].value, "7.5");

    app.type_line("stats nope").await;
    app.wait_for("modal error", |s| {
        s.modal.as_ref().and_then(|p| p.message().map(str::to_string))
            == Some("Could not load statistics: Backup not found".to_string())
    })
    .await;

    app.stop().await;
}

#[tokio::test]
async fn test_polling_fallback_while_stream_down() {
    let server = FakeServer::start(FakeState {
        events_down: true,
        ..FakeState::default()
    })
    .await;
    let app = Running::start(&server.config());

    app.wait_for("outage notice", |s| notified(s, STREAM_OUTAGE) == 1)
        .await;

    // the poll runs every second while the stream is not open
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while server.count("GET /backups") < 3 {
        assert!(tokio::time::Instant::now() < deadline, "no polling");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let seen = app.wait_for("still degraded", |s| s.connection != ConnectionState::Open).await;
    assert_eq!(notified(&seen, STREAM_OUTAGE), 1, "outage reported once");

    // the stream comes back and the dashboard catches up
    server.state().events_down = false;
    server.state().backups.push(backup("b9", "zoe"));
    app.wait_for("reconnected", |s| {
        s.connection == ConnectionState::Open && row_ids(s) == vec!["b9"]
    })
    .await;

    app.stop().await;
}
