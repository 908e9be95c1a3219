//! View reconciler.
//!
//! `Dashboard` holds the state behind every surface. Fetch results, push
//! events and command outcomes are applied through its methods, each of
//! which returns a `Reaction`: the surfaces to re-render and the views to
//! refetch. Every update is a full replace, so applying the same input
//! twice leaves the same state.

pub mod format;
pub mod views;

use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

use crate::dispatch::{CommandKind, CommandReport};
use crate::log_sink::{LogSink, NotificationKind};
use crate::models::{AutoBackupStatus, BackupRecord, LogEntry, StatsSnapshot};
use crate::stream::{ConnectionState, ServerEvent};
use crate::DashboardError;

use views::{
    AutoBackupControl, BackupTableView, ControlsView, LogView, StatsModal, StatsPanel,
};

pub const STREAM_OUTAGE: &str = "[SYSTEM] SSE connection error. Real-time updates stopped.";
pub const AUTO_STATUS_FAILED: &str = "[SYSTEM] Failed to get auto backup status.";

const LOADING_BACKUPS: &str = "Loading backups...";

/// Views that can be refetched from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewKind {
    Backups,
    LatestStats,
    Logs,
    AutoBackupStatus,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::Backups,
        ViewKind::LatestStats,
        ViewKind::Logs,
        ViewKind::AutoBackupStatus,
    ];
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewKind::Backups => "backups",
            ViewKind::LatestStats => "latestStats",
            ViewKind::Logs => "logs",
            ViewKind::AutoBackupStatus => "autoBackupStatus",
        };
        f.write_str(s)
    }
}

/// Rendered surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Surface {
    Backups,
    LatestStats,
    Logs,
    AutoBackup,
    StatsModal,
    Controls,
    Connection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    pub changed: BTreeSet<Surface>,
    pub refresh: BTreeSet<ViewKind>,
}

impl Reaction {
    pub fn none() -> Self {
        Self::default()
    }

    fn changed(surface: Surface) -> Self {
        let mut reaction = Self::default();
        reaction.changed.insert(surface);
        reaction
    }

    fn with_change(mut self, surface: Surface) -> Self {
        self.changed.insert(surface);
        self
    }

    fn with_refresh(mut self, view: ViewKind) -> Self {
        self.refresh.insert(view);
        self
    }

    pub fn merge(&mut self, other: Reaction) {
        self.changed.extend(other.changed);
        self.refresh.extend(other.refresh);
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.refresh.is_empty()
    }
}

pub struct Dashboard {
    backups: Vec<BackupRecord>,
    backup_table: BackupTableView,
    latest_stats: StatsPanel,
    auto_backup_status: AutoBackupStatus,
    logs: LogSink,
    stats_modal: Option<StatsModal>,
    controls: ControlsView,
    connection: ConnectionState,
    /// Set once the outage line is logged; cleared when the stream reopens
    outage_reported: bool,
    alerts: Vec<String>,
}

impl Dashboard {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            backups: Vec::new(),
            backup_table: BackupTableView::Placeholder(LOADING_BACKUPS.to_string()),
            latest_stats: StatsPanel::Loading,
            auto_backup_status: AutoBackupStatus::default(),
            logs: LogSink::new(log_capacity),
            stats_modal: None,
            controls: ControlsView::default(),
            connection: ConnectionState::Closed,
            outage_reported: false,
            alerts: Vec::new(),
        }
    }

    pub fn backups(&self) -> &[BackupRecord] {
        &self.backups
    }

    pub fn backup_table(&self) -> &BackupTableView {
        &self.backup_table
    }

    pub fn latest_stats(&self) -> &StatsPanel {
        &self.latest_stats
    }

    pub fn auto_backup(&self) -> AutoBackupControl {
        views::render_auto_backup(
            &self.auto_backup_status,
            !self.controls.is_enabled(CommandKind::AutoBackup),
        )
    }

    pub fn log_sink(&self) -> &LogSink {
        &self.logs
    }

    pub fn log_view(&self) -> LogView {
        views::render_logs(&self.logs)
    }

    pub fn stats_modal(&self) -> Option<&StatsModal> {
        self.stats_modal.as_ref()
    }

    pub fn controls(&self) -> &ControlsView {
        &self.controls
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Alert-level messages queued since the last call.
    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }

    pub fn show_backups(&mut self, records: Vec<BackupRecord>) -> Reaction {
        self.backup_table = views::render_backups(&records);
        self.backups = records;
        Reaction::changed(Surface::Backups)
    }

    /// The previous rows stay visible after a failed listing.
    pub fn backups_unavailable(&mut self, error: &DashboardError) -> Reaction {
        warn!("Loading backups failed: {}", error);
        if self.backups.is_empty() {
            self.backup_table = views::render_backups(&[]);
        }
        self.alert(NotificationKind::Error, &format!("Error loading backups: {}", error))
            .with_change(Surface::Backups)
    }

    pub fn show_latest_stats(&mut self, snapshot: &StatsSnapshot) -> Reaction {
        self.latest_stats = views::render_latest_stats(snapshot);
        Reaction::changed(Surface::LatestStats)
    }

    pub fn latest_stats_unavailable(&mut self, error: &DashboardError) -> Reaction {
        warn!("Loading latest stats failed: {}", error);
        self.latest_stats = views::latest_stats_failed();
        Reaction::changed(Surface::LatestStats)
    }

    pub fn show_auto_backup(&mut self, status: AutoBackupStatus) -> Reaction {
        self.auto_backup_status = status;
        Reaction::changed(Surface::AutoBackup)
    }

    /// The control keeps its last known state.
    pub fn auto_backup_unavailable(&mut self, error: &DashboardError) -> Reaction {
        warn!("Loading auto backup status failed: {}", error);
        self.logs.append_local(AUTO_STATUS_FAILED, false);
        Reaction::changed(Surface::Logs)
    }

    pub fn show_logs(&mut self, entries: Vec<LogEntry>) -> Reaction {
        self.logs.replace(entries);
        Reaction::changed(Surface::Logs)
    }

    pub fn logs_unavailable(&mut self, error: &DashboardError) -> Reaction {
        warn!("Loading logs failed: {}", error);
        self.logs.load_failed(error.to_string());
        Reaction::changed(Surface::Logs)
    }

    /// Open the modal for one backup; its stats arrive via `show_backup_stats`.
    pub fn open_stats_modal(&mut self, backup_id: &str) -> Reaction {
        let username = self
            .backups
            .iter()
            .find(|b| b.id == backup_id)
            .and_then(|b| b.username.clone());
        self.stats_modal = Some(StatsModal {
            backup_id: backup_id.to_string(),
            username: format::text(username.as_deref()),
            panel: StatsPanel::Loading,
        });
        Reaction::changed(Surface::StatsModal)
    }

    /// Results for a modal that was closed or reopened for another backup are dropped.
    pub fn show_backup_stats(
        &mut self,
        backup_id: &str,
        result: Result<StatsSnapshot, DashboardError>,
    ) -> Reaction {
        let Some(modal) = self.stats_modal.as_mut().filter(|m| m.backup_id == backup_id) else {
            debug!("Dropping stats for backup {}: modal not showing it", backup_id);
            return Reaction::none();
        };
        modal.panel = match result {
            Ok(snapshot) => views::render_backup_stats(&snapshot),
            Err(e) => {
                warn!("Loading stats for backup {} failed: {}", backup_id, e);
                views::backup_stats_failed(&e.to_string())
            }
        };
        Reaction::changed(Surface::StatsModal)
    }

    pub fn close_stats_modal(&mut self) -> Reaction {
        match self.stats_modal.take() {
            Some(_) => Reaction::changed(Surface::StatsModal),
            None => Reaction::none(),
        }
    }

    pub fn notify(&mut self, kind: NotificationKind, message: &str) -> Reaction {
        self.logs.notify(kind, message);
        Reaction::changed(Surface::Logs)
    }

    /// Notify and raise an alert.
    fn alert(&mut self, kind: NotificationKind, message: &str) -> Reaction {
        self.alerts.push(message.to_string());
        self.notify(kind, message)
    }

    fn set_control(&mut self, kind: CommandKind, enabled: bool) -> Reaction {
        if !self.controls.set_enabled(kind, enabled) {
            return Reaction::none();
        }
        let reaction = Reaction::changed(Surface::Controls);
        if kind == CommandKind::AutoBackup {
            reaction.with_change(Surface::AutoBackup)
        } else {
            reaction
        }
    }

    /// A command passed validation and is about to be sent.
    pub fn start_command(&mut self, kind: CommandKind, message: &str) -> Reaction {
        let mut reaction = self.set_control(kind, false);
        reaction.merge(self.notify(NotificationKind::Info, message));
        reaction
    }

    /// A command finished; re-enable its control and report the outcome.
    pub fn finish_command(&mut self, report: &CommandReport) -> Reaction {
        let mut reaction = self.set_control(report.kind, true);
        match &report.result {
            Ok(message) => reaction.merge(self.notify(NotificationKind::Success, message)),
            Err(e) => {
                let message = format!("{}: {}", report.label, e);
                reaction.merge(self.alert(NotificationKind::Error, &message));
            }
        }
        if report.kind == CommandKind::AutoBackup {
            reaction = reaction.with_refresh(ViewKind::AutoBackupStatus);
        }
        reaction
    }

    /// A command was refused before any request was sent.
    pub fn reject_command(&mut self, kind: CommandKind, error: &DashboardError) -> Reaction {
        match error {
            DashboardError::Cancelled => Reaction::none(),
            DashboardError::Busy(_) => self.notify(
                NotificationKind::Error,
                &format!("{}: {}", kind.title(), error),
            ),
            _ => self.alert(
                NotificationKind::Error,
                &format!("{}: {}", kind.title(), error),
            ),
        }
    }

    pub fn set_connection(&mut self, state: ConnectionState) -> Reaction {
        if self.connection == state {
            return Reaction::none();
        }
        self.connection = state;
        let mut reaction = Reaction::changed(Surface::Connection);

        // Anything pushed during the outage was missed.
        if state == ConnectionState::Open && self.outage_reported {
            self.outage_reported = false;
            reaction.refresh.extend(ViewKind::ALL);
        }
        reaction
    }

    /// The push stream failed. The user is told once per outage.
    pub fn stream_failed(&mut self, reason: &str) -> Reaction {
        debug!("Push stream failed: {}", reason);
        if self.outage_reported {
            return Reaction::none();
        }
        self.outage_reported = true;
        self.logs.append_local(STREAM_OUTAGE, false);
        Reaction::changed(Surface::Logs)
    }

    pub fn is_stream_degraded(&self) -> bool {
        self.connection != ConnectionState::Open
    }

    pub fn apply_event(&mut self, event: ServerEvent) -> Reaction {
        match event {
            ServerEvent::BackupCreated(payload) => {
                let mut reaction = self
                    .notify(
                        NotificationKind::Success,
                        &format!("Backup created for {}", payload.username),
                    )
                    .with_refresh(ViewKind::Backups);
                if let Some(snapshot) = payload.latest_stats() {
                    reaction.merge(self.show_latest_stats(&snapshot));
                }
                reaction
            }
            ServerEvent::BackupDeleted { id } => {
                let before = self.backups.len();
                self.backups.retain(|b| b.id != id);
                let mut reaction = self
                    .notify(NotificationKind::Success, &format!("Backup {} deleted.", id))
                    .with_refresh(ViewKind::Backups)
                    .with_refresh(ViewKind::LatestStats);
                if self.backups.len() != before {
                    self.backup_table = views::render_backups(&self.backups);
                    reaction = reaction.with_change(Surface::Backups);
                }
                reaction
            }
            ServerEvent::LatestStatsUpdated(snapshot) => self.show_latest_stats(&snapshot),
            ServerEvent::LogUpdated(entry) => {
                self.logs.append_server(entry);
                Reaction::changed(Surface::Logs)
            }
        }
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(crate::log_sink::DEFAULT_CAPACITY)
    }
}
