//! View-models, one per dashboard surface.
//!
//! Render functions are pure and total: the same input always produces the
//! same view-model, whether it came from a full fetch or a push payload.

use std::collections::BTreeSet;

use super::format;
use crate::dispatch::CommandKind;
use crate::log_sink::{LoadState, LogOrigin, LogSink};
use crate::models::stats::Category;
use crate::models::{AutoBackupStatus, BackupRecord, CategoryStats, StatsSnapshot};

pub const NO_BACKUPS: &str = "No backups found.";
pub const NO_LATEST_STATS: &str = "No backup data available yet. Create a backup to see stats.";
pub const INCOMPLETE_STATS: &str = "Statistics data is incomplete for this backup.";
pub const LATEST_STATS_FAILED: &str = "Could not load latest backup stats.";
pub const NO_LOGS: &str = "No log entries found.";
pub const LOADING_LOGS: &str = "Loading logs...";
pub const LOADING_STATS: &str = "Fetching stats...";

pub const DEFAULT_KEEP_LAST: &str = "5";
pub const DEFAULT_INTERVAL_HOURS: &str = "24";

#[derive(Debug, Clone, PartialEq)]
pub struct BackupRow {
    pub id: String,
    pub date: String,
    pub username: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackupTableView {
    Rows(Vec<BackupRow>),
    Placeholder(String),
}

pub fn render_backups(records: &[BackupRecord]) -> BackupTableView {
    if records.is_empty() {
        return BackupTableView::Placeholder(NO_BACKUPS.to_string());
    }
    BackupTableView::Rows(
        records
            .iter()
            .map(|record| BackupRow {
                id: record.id.clone(),
                date: format::timestamp(record.created_at.as_deref()),
                username: format::text(record.username.as_deref()),
                content: format::text(record.content_summary.as_deref()),
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatBox {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusBox {
    pub label: String,
    /// Style token, `[a-z0-9-]` only
    pub class: String,
    pub count: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPanel {
    pub title: String,
    pub stats: Vec<StatBox>,
    /// Server order
    pub statuses: Vec<StatusBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsView {
    pub categories: Vec<CategoryPanel>,
    /// Formatted `last_updated`, latest panel only
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatsPanel {
    Loading,
    /// Nothing to show yet, or the snapshot lacks a category
    Placeholder(String),
    /// The fetch failed
    Unavailable(String),
    Ready(StatsView),
}

impl StatsPanel {
    pub fn message(&self) -> Option<&str> {
        match self {
            StatsPanel::Loading => Some(LOADING_STATS),
            StatsPanel::Placeholder(msg) | StatsPanel::Unavailable(msg) => Some(msg),
            StatsPanel::Ready(_) => None,
        }
    }
}

/// Per-backup statistics, opened from a backup row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsModal {
    pub backup_id: String,
    /// Owner shown in the modal title
    pub username: String,
    pub panel: StatsPanel,
}

/// Labels differ slightly between the compact latest panel and the modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Latest,
    Modal,
}

fn category_panel(
    category: Category,
    stats: &CategoryStats,
    layout: Layout,
    username: Option<&str>,
) -> CategoryPanel {
    let stats_boxes = match (category, layout) {
        (Category::Anime, Layout::Latest) => vec![
            StatBox { label: "Total", value: format::count(stats.total_entries) },
            StatBox { label: "Episodes", value: format::count(stats.episodes_watched) },
            StatBox { label: "Mean Score", value: format::score(stats.mean_score) },
        ],
        (Category::Anime, Layout::Modal) => vec![
            StatBox { label: "Total Entries", value: format::count(stats.total_entries) },
            StatBox { label: "Episodes Watched", value: format::count(stats.episodes_watched) },
            StatBox { label: "Mean Score", value: format::score(stats.mean_score) },
        ],
        (Category::Manga, Layout::Latest) => vec![
            StatBox { label: "Total", value: format::count(stats.total_entries) },
            StatBox { label: "Chapters", value: format::count(stats.chapters_read) },
            StatBox { label: "Volumes", value: format::count(stats.volumes_read) },
            StatBox { label: "Mean Score", value: format::score(stats.mean_score) },
        ],
        (Category::Manga, Layout::Modal) => vec![
            StatBox { label: "Total Entries", value: format::count(stats.total_entries) },
            StatBox { label: "Chapters Read", value: format::count(stats.chapters_read) },
            StatBox { label: "Volumes Read", value: format::count(stats.volumes_read) },
            StatBox { label: "Mean Score", value: format::score(stats.mean_score) },
        ],
    };

    let title = match layout {
        Layout::Latest => format!(
            "{} Stats ({})",
            category.title(),
            format::text(username)
        ),
        Layout::Modal => format!("{} Statistics", category.title()),
    };

    let statuses = stats
        .status_breakdown
        .iter()
        .map(|(key, count)| StatusBox {
            label: format::status_label(key),
            class: format::status_class(key),
            count: format::json_count(count),
        })
        .collect();

    CategoryPanel {
        title,
        stats: stats_boxes,
        statuses,
    }
}

fn categories(
    snapshot: &StatsSnapshot,
    layout: Layout,
) -> Option<Vec<CategoryPanel>> {
    let username = snapshot.username.as_deref();
    [Category::Anime, Category::Manga]
        .into_iter()
        .map(|c| {
            snapshot
                .category(c)
                .map(|stats| category_panel(c, stats, layout, username))
        })
        .collect()
}

/// Latest-stats panel. Needs both categories and a username.
pub fn render_latest_stats(snapshot: &StatsSnapshot) -> StatsPanel {
    if snapshot.username.as_deref().map_or(true, |u| u.trim().is_empty()) {
        return StatsPanel::Placeholder(NO_LATEST_STATS.to_string());
    }
    match categories(snapshot, Layout::Latest) {
        Some(categories) => StatsPanel::Ready(StatsView {
            categories,
            last_updated: Some(format::timestamp(snapshot.last_updated.as_deref())),
        }),
        None => StatsPanel::Placeholder(NO_LATEST_STATS.to_string()),
    }
}

pub fn latest_stats_failed() -> StatsPanel {
    StatsPanel::Unavailable(LATEST_STATS_FAILED.to_string())
}

/// Per-backup stats modal body. Needs both categories.
pub fn render_backup_stats(snapshot: &StatsSnapshot) -> StatsPanel {
    match categories(snapshot, Layout::Modal) {
        Some(categories) => StatsPanel::Ready(StatsView {
            categories,
            last_updated: None,
        }),
        None => StatsPanel::Placeholder(INCOMPLETE_STATS.to_string()),
    }
}

pub fn backup_stats_failed(reason: &str) -> StatsPanel {
    StatsPanel::Unavailable(format!("Could not load statistics: {}", reason))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Green,
    Red,
}

/// Username, keep-last and interval fields. One flag enables or disables all three.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFields {
    pub username: String,
    pub keep_last: String,
    pub interval: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoBackupControl {
    pub running: bool,
    pub button_label: &'static str,
    pub button_style: ButtonStyle,
    /// False while a start/stop request is in flight
    pub button_enabled: bool,
    pub fields: ConfigFields,
}

pub fn render_auto_backup(status: &AutoBackupStatus, in_flight: bool) -> AutoBackupControl {
    let config = status.config.as_ref();
    let fields = ConfigFields {
        username: config
            .and_then(|c| c.username.clone())
            .unwrap_or_default(),
        keep_last: config
            .and_then(|c| c.keep_last)
            .map_or_else(|| DEFAULT_KEEP_LAST.to_string(), |n| n.to_string()),
        interval: config
            .and_then(|c| c.interval_hours)
            .filter(|h| h.is_finite())
            .map_or_else(|| DEFAULT_INTERVAL_HOURS.to_string(), |h| h.to_string()),
        enabled: !status.running && !in_flight,
    };

    let (button_label, button_style) = if status.running {
        ("Stop", ButtonStyle::Red)
    } else {
        ("Start", ButtonStyle::Green)
    };

    AutoBackupControl {
        running: status.running,
        button_label,
        button_style,
        button_enabled: !in_flight,
        fields,
    }
}

/// Enabled state of every command trigger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlsView {
    disabled: BTreeSet<CommandKind>,
}

impl ControlsView {
    pub fn is_enabled(&self, kind: CommandKind) -> bool {
        !self.disabled.contains(&kind)
    }

    /// Returns whether the state changed.
    pub fn set_enabled(&mut self, kind: CommandKind, enabled: bool) -> bool {
        if enabled {
            self.disabled.remove(&kind)
        } else {
            self.disabled.insert(kind)
        }
    }

    pub fn disabled(&self) -> impl Iterator<Item = CommandKind> + '_ {
        self.disabled.iter().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub seq: u64,
    pub timestamp: String,
    pub message: String,
    pub is_success: bool,
    pub origin: LogOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogView {
    Lines(Vec<LogLine>),
    Placeholder(String),
    Error(String),
}

/// Log panel, oldest line first.
pub fn render_logs(sink: &LogSink) -> LogView {
    match sink.state() {
        LoadState::Failed(reason) if sink.is_empty() => {
            return LogView::Error(format!("Error loading logs: {}", reason))
        }
        LoadState::Loading if sink.is_empty() => {
            return LogView::Placeholder(LOADING_LOGS.to_string())
        }
        _ if sink.is_empty() => return LogView::Placeholder(NO_LOGS.to_string()),
        _ => {}
    }

    LogView::Lines(
        sink.entries()
            .map(|entry| LogLine {
                seq: entry.seq,
                timestamp: format::timestamp(Some(&entry.timestamp)),
                message: entry.message.clone(),
                is_success: entry.is_success,
                origin: entry.origin,
            })
            .collect(),
    )
}
