//! The live dashboard.
//!
//! One task owns the `Dashboard` and drains a single ordered queue. Fetches
//! and commands run as spawned tasks and post their results back to that
//! queue; push-stream updates arrive on their own channel in server order.

pub mod input;
pub mod refresh;
pub mod render;

use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::{Config, StreamConfig};
use crate::dispatch::{self, validate, Command, CommandDispatcher, CommandKind, CommandReport, Confirm};
use crate::log_sink::NotificationKind;
use crate::models::{AutoBackupStatus, BackupRecord, LogEntry, StatsSnapshot};
use crate::reconcile::{Dashboard, Reaction, Surface, ViewKind};
use crate::stream::client::EventStreamClient;
use crate::stream::StreamUpdate;
use crate::Result;

use input::UserInput;
use refresh::RefreshTracker;
use render::Renderer;

const QUEUE_DEPTH: usize = 256;

/// A completed fetch of one view.
#[derive(Debug)]
pub enum Fetched {
    Backups(Result<Vec<BackupRecord>>),
    LatestStats(Result<StatsSnapshot>),
    Logs(Result<Vec<LogEntry>>),
    AutoBackupStatus(Result<AutoBackupStatus>),
}

impl Fetched {
    pub fn view(&self) -> ViewKind {
        match self {
            Fetched::Backups(_) => ViewKind::Backups,
            Fetched::LatestStats(_) => ViewKind::LatestStats,
            Fetched::Logs(_) => ViewKind::Logs,
            Fetched::AutoBackupStatus(_) => ViewKind::AutoBackupStatus,
        }
    }
}

/// Fetch one view from the server.
pub async fn fetch(api: &ApiClient, view: ViewKind) -> Fetched {
    match view {
        ViewKind::Backups => Fetched::Backups(api.list_backups().await),
        ViewKind::LatestStats => Fetched::LatestStats(api.latest_stats().await),
        ViewKind::Logs => Fetched::Logs(api.logs().await),
        ViewKind::AutoBackupStatus => Fetched::AutoBackupStatus(api.auto_backup_status().await),
    }
}

/// Apply a fetch result to the dashboard.
pub fn apply_fetched(dashboard: &mut Dashboard, fetched: Fetched) -> Reaction {
    match fetched {
        Fetched::Backups(Ok(records)) => dashboard.show_backups(records),
        Fetched::Backups(Err(e)) => dashboard.backups_unavailable(&e),
        Fetched::LatestStats(Ok(snapshot)) => dashboard.show_latest_stats(&snapshot),
        Fetched::LatestStats(Err(e)) => dashboard.latest_stats_unavailable(&e),
        Fetched::Logs(Ok(entries)) => dashboard.show_logs(entries),
        Fetched::Logs(Err(e)) => dashboard.logs_unavailable(&e),
        Fetched::AutoBackupStatus(Ok(status)) => dashboard.show_auto_backup(status),
        Fetched::AutoBackupStatus(Err(e)) => dashboard.auto_backup_unavailable(&e),
    }
}

#[derive(Debug)]
pub enum AppEvent {
    Fetched(Fetched),
    StatsFetched {
        backup_id: String,
        result: Result<StatsSnapshot>,
    },
    CommandFinished(CommandReport),
    Input(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App<R: Renderer> {
    api: ApiClient,
    dispatcher: CommandDispatcher,
    dashboard: Dashboard,
    refresh: RefreshTracker,
    renderer: R,
    stream_config: StreamConfig,
    poll_interval: Duration,
    events_tx: mpsc::Sender<AppEvent>,
    events_rx: mpsc::Receiver<AppEvent>,
    /// Backup id waiting for a yes/no answer
    pending_delete: Option<String>,
    shutdown: CancellationToken,
}

impl<R: Renderer> App<R> {
    pub fn new(config: &Config, api: ApiClient, renderer: R, shutdown: CancellationToken) -> Self {
        let (events_tx, events_rx) = mpsc::channel(QUEUE_DEPTH);
        let dispatcher = CommandDispatcher::new(api.clone(), config.dashboard.download_dir.clone());
        Self {
            api,
            dispatcher,
            dashboard: Dashboard::new(config.dashboard.log_capacity),
            refresh: RefreshTracker::new(),
            renderer,
            stream_config: config.stream.clone(),
            poll_interval: config.poll_interval(),
            events_tx,
            events_rx,
            pending_delete: None,
            shutdown,
        }
    }

    /// Queue handle for input sources.
    pub fn sender(&self) -> mpsc::Sender<AppEvent> {
        self.events_tx.clone()
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Run until shutdown or `quit`. Returns the final dashboard state.
    pub async fn run(mut self) -> Result<Dashboard> {
        let (stream_tx, mut stream_rx) = mpsc::channel(QUEUE_DEPTH);
        let mut stream = EventStreamClient::new(
            self.api.streaming_client(),
            self.api.url(&["events"]),
            self.stream_config.clone(),
            stream_tx,
            self.shutdown.clone(),
        );
        stream.connect();
        info!("Dashboard connected to {}", self.api.base_url());

        let mut initial = Reaction::none();
        initial.changed.extend(all_surfaces());
        initial.refresh.extend(ViewKind::ALL);
        self.apply(initial);

        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires at once; the initial load covers it
        poll.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Dashboard shutting down");
                    break;
                }
                Some(update) = stream_rx.recv() => {
                    let reaction = self.on_stream(update);
                    self.apply(reaction);
                }
                Some(event) = self.events_rx.recv() => {
                    if self.on_event(event) == Flow::Quit {
                        self.shutdown.cancel();
                        break;
                    }
                }
                _ = poll.tick() => {
                    if self.dashboard.is_stream_degraded() {
                        debug!("Push stream not open, polling all views");
                        let mut reaction = Reaction::none();
                        reaction.refresh.extend(ViewKind::ALL);
                        self.apply(reaction);
                    }
                }
            }
        }

        stream.disconnect();
        Ok(self.dashboard)
    }

    fn on_stream(&mut self, update: StreamUpdate) -> Reaction {
        match update {
            StreamUpdate::State(state) => {
                debug!("Push stream {}", state);
                self.dashboard.set_connection(state)
            }
            StreamUpdate::Event(event) => self.dashboard.apply_event(event),
            StreamUpdate::Failed { reason, retry_in } => {
                match retry_in {
                    Some(delay) => info!("Push stream failed ({}), retrying in {:?}", reason, delay),
                    None => warn!("Push stream failed ({}), not reconnecting", reason),
                }
                self.dashboard.stream_failed(&reason)
            }
        }
    }

    fn on_event(&mut self, event: AppEvent) -> Flow {
        let reaction = match event {
            AppEvent::Fetched(fetched) => {
                let view = fetched.view();
                let reaction = apply_fetched(&mut self.dashboard, fetched);
                if self.refresh.complete(view) {
                    self.spawn_fetch(view);
                }
                reaction
            }
            AppEvent::StatsFetched { backup_id, result } => {
                self.dashboard.show_backup_stats(&backup_id, result)
            }
            AppEvent::CommandFinished(report) => self.dashboard.finish_command(&report),
            AppEvent::Input(line) => return self.on_input(&line),
        };
        self.apply(reaction);
        Flow::Continue
    }

    fn on_input(&mut self, line: &str) -> Flow {
        if let Some(id) = self.pending_delete.take() {
            let confirmed = input::is_yes(line);
            if !confirmed {
                self.say("Delete cancelled.");
            }
            self.submit(Command::DeleteBackup { id }, &confirmed);
            return Flow::Continue;
        }

        match input::parse_input(line) {
            UserInput::Command(command) => self.submit(command, &false),
            UserInput::Delete(id) => match validate::backup_id(&id) {
                Ok(id) => {
                    self.say(&format!("{} [y/N]", dispatch::delete_prompt(&id)));
                    self.pending_delete = Some(id);
                }
                Err(e) => {
                    let reaction = self.dashboard.reject_command(CommandKind::DeleteBackup, &e);
                    self.apply(reaction);
                }
            },
            UserInput::ShowStats(id) => self.show_stats(&id),
            UserInput::CloseStats => {
                let reaction = self.dashboard.close_stats_modal();
                self.apply(reaction);
            }
            UserInput::Refresh => {
                let mut reaction = Reaction::none();
                reaction.refresh.extend(ViewKind::ALL);
                self.apply(reaction);
            }
            UserInput::Help => self.say(input::HELP),
            UserInput::Quit => return Flow::Quit,
            UserInput::Empty => {}
            UserInput::Unknown(text) => {
                self.say(&format!("Unknown command '{}'. Type 'help' for commands.", text))
            }
        }
        Flow::Continue
    }

    /// Validate and send a command. Only delete asks for confirmation.
    fn submit(&mut self, command: Command, confirm: &dyn Confirm) {
        let kind = command.kind();
        let reaction = match self.dispatcher.begin(command, confirm) {
            Ok(pending) => {
                let reaction = self.dashboard.start_command(kind, &pending.start_message());
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let report = pending.send().await;
                    if events.send(AppEvent::CommandFinished(report)).await.is_err() {
                        debug!("Dashboard gone before {} finished", kind);
                    }
                });
                reaction
            }
            Err(e) => self.dashboard.reject_command(kind, &e),
        };
        self.apply(reaction);
    }

    fn show_stats(&mut self, id: &str) {
        let id = match validate::backup_id(id) {
            Ok(id) => id,
            Err(e) => {
                let reaction = self.dashboard.notify(NotificationKind::Error, &e.to_string());
                self.apply(reaction);
                return;
            }
        };

        let reaction = self.dashboard.open_stats_modal(&id);
        self.apply(reaction);

        let api = self.api.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.backup_stats(&id).await;
            let _ = events
                .send(AppEvent::StatsFetched {
                    backup_id: id,
                    result,
                })
                .await;
        });
    }

    fn spawn_fetch(&self, view: ViewKind) {
        debug!("Fetching {}", view);
        let api = self.api.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let fetched = fetch(&api, view).await;
            let _ = events.send(AppEvent::Fetched(fetched)).await;
        });
    }

    /// Start the requested fetches and redraw what changed.
    fn apply(&mut self, reaction: Reaction) {
        for view in &reaction.refresh {
            if self.refresh.request(*view) {
                self.spawn_fetch(*view);
            } else {
                debug!("Refresh of {} coalesced", view);
            }
        }

        if !reaction.changed.is_empty() {
            if let Err(e) = self.renderer.render(&self.dashboard, &reaction.changed) {
                warn!("Render failed: {}", e);
            }
        }
        for alert in self.dashboard.take_alerts() {
            if let Err(e) = self.renderer.alert(&alert) {
                warn!("Render failed: {}", e);
            }
        }
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = self.renderer.message(text) {
            warn!("Render failed: {}", e);
        }
    }
}

/// Surfaces a full redraw covers.
pub fn all_surfaces() -> BTreeSet<Surface> {
    BTreeSet::from([
        Surface::Backups,
        Surface::LatestStats,
        Surface::Logs,
        Surface::AutoBackup,
        Surface::Controls,
        Surface::Connection,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DashboardError;

    #[test]
    fn test_fetched_view_kind() {
        assert_eq!(Fetched::Backups(Ok(Vec::new())).view(), ViewKind::Backups);
        assert_eq!(
            Fetched::AutoBackupStatus(Err(DashboardError::Transport("x".to_string()))).view(),
            ViewKind::AutoBackupStatus
        );
    }

    #[test]
    fn test_apply_fetched_failures_render_placeholders() {
        let mut dashboard = Dashboard::default();
        apply_fetched(
            &mut dashboard,
            Fetched::LatestStats(Err(DashboardError::Transport("refused".to_string()))),
        );
        assert_eq!(
            dashboard.latest_stats().message(),
            Some("Could not load latest backup stats.")
        );

        let reaction = apply_fetched(
            &mut dashboard,
            Fetched::Logs(Err(DashboardError::request(None, "Request failed with status: 500"))),
        );
        assert!(reaction.changed.contains(&Surface::Logs));
        assert_eq!(
            dashboard.log_view(),
            crate::reconcile::views::LogView::Error(
                "Error loading logs: Request failed with status: 500".to_string()
            )
        );
    }
}
