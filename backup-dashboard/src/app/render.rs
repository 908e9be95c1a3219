//! Applying view-models to an output surface.

use std::collections::BTreeSet;
use std::io::{self, Write};

use crate::log_sink::{LogOrigin, LogSink};
use crate::reconcile::views::{
    self, AutoBackupControl, BackupTableView, ButtonStyle, ControlsView, LogLine, LogView,
    StatsPanel,
};
use crate::reconcile::{Dashboard, Surface};
use crate::stream::ConnectionState;

pub trait Renderer: Send {
    /// Redraw the given surfaces from the dashboard state.
    fn render(&mut self, dashboard: &Dashboard, changed: &BTreeSet<Surface>) -> io::Result<()>;

    /// Show an alert-level message.
    fn alert(&mut self, message: &str) -> io::Result<()>;

    /// Show free text (help, prompts).
    fn message(&mut self, text: &str) -> io::Result<()>;
}

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

fn paint(style: ButtonStyle, text: &str) -> String {
    match style {
        ButtonStyle::Green => format!("{}{}{}", GREEN, text, RESET),
        ButtonStyle::Red => format!("{}{}{}", RED, text, RESET),
    }
}

pub fn write_backups(out: &mut impl Write, table: &BackupTableView) -> io::Result<()> {
    writeln!(out, "== Backups ==")?;
    match table {
        BackupTableView::Placeholder(msg) => writeln!(out, "  {}", msg),
        BackupTableView::Rows(rows) => {
            for row in rows {
                writeln!(
                    out,
                    "  {:<28} {:<19}  {:<16} {}",
                    row.id, row.date, row.username, row.content
                )?;
            }
            Ok(())
        }
    }
}

pub fn write_stats(out: &mut impl Write, heading: &str, panel: &StatsPanel) -> io::Result<()> {
    writeln!(out, "== {} ==", heading)?;
    let view = match panel {
        StatsPanel::Ready(view) => view,
        other => return writeln!(out, "  {}", other.message().unwrap_or_default()),
    };

    for category in &view.categories {
        writeln!(out, "  {}", category.title)?;
        let boxes: Vec<String> = category
            .stats
            .iter()
            .map(|b| format!("{}: {}", b.label, b.value))
            .collect();
        writeln!(out, "    {}", boxes.join(" | "))?;
        for status in &category.statuses {
            writeln!(out, "    {:>6}  {}", status.count, status.label)?;
        }
    }
    if let Some(updated) = &view.last_updated {
        writeln!(out, "  Last updated: {}", updated)?;
    }
    Ok(())
}

pub fn write_auto_backup(out: &mut impl Write, control: &AutoBackupControl) -> io::Result<()> {
    writeln!(out, "== Auto Backup ==")?;
    let state = if control.running { "running" } else { "stopped" };
    let button = paint(control.button_style, &format!("[{}]", control.button_label));
    let busy = if control.button_enabled { "" } else { " (busy)" };
    writeln!(out, "  {} {}{}", state, button, busy)?;

    let fields = &control.fields;
    let lock = if fields.enabled { "" } else { " (locked)" };
    writeln!(
        out,
        "  user: {}  keep last: {}  every: {}h{}",
        if fields.username.is_empty() { "-" } else { fields.username.as_str() },
        fields.keep_last,
        fields.interval,
        lock
    )
}

pub fn write_log_lines(out: &mut impl Write, lines: &[LogLine]) -> io::Result<()> {
    for line in lines {
        let mark = if line.is_success { ' ' } else { '!' };
        writeln!(out, "{} {}  {}", mark, line.timestamp, line.message)?;
    }
    Ok(())
}

pub fn write_logs(out: &mut impl Write, view: &LogView) -> io::Result<()> {
    writeln!(out, "== Logs ==")?;
    match view {
        LogView::Lines(lines) => write_log_lines(out, lines),
        LogView::Placeholder(msg) | LogView::Error(msg) => writeln!(out, "  {}", msg),
    }
}

fn write_controls(out: &mut impl Write, controls: &ControlsView) -> io::Result<()> {
    let busy: Vec<String> = controls.disabled().map(|k| k.to_string()).collect();
    if busy.is_empty() {
        writeln!(out, "-- ready --")
    } else {
        writeln!(out, "-- waiting for: {} --", busy.join(", "))
    }
}

/// How much of the log panel the terminal already shows.
#[derive(Debug, Default)]
struct LogCursor {
    generation: u64,
    last_seq: Option<u64>,
    /// Last server line shown; a reload resumes after it
    last_server: Option<LogLine>,
}

impl LogCursor {
    fn unseen<'a>(&self, lines: &'a [LogLine], generation: u64) -> &'a [LogLine] {
        if generation == self.generation {
            let start = self
                .last_seq
                .map_or(0, |seq| lines.partition_point(|l| l.seq <= seq));
            return &lines[start..];
        }

        // rebuilt buffer: local lines are gone and server lines were renumbered
        let resume = self.last_server.as_ref().and_then(|last| {
            lines.iter().rposition(|l| {
                l.origin == LogOrigin::Server
                    && l.timestamp == last.timestamp
                    && l.message == last.message
            })
        });
        match resume {
            Some(pos) => &lines[pos + 1..],
            None => lines,
        }
    }

    fn advance(&mut self, lines: &[LogLine], generation: u64) {
        self.generation = generation;
        if let Some(last) = lines.last() {
            self.last_seq = Some(last.seq);
        }
        if let Some(server) = lines.iter().rev().find(|l| l.origin == LogOrigin::Server) {
            self.last_server = Some(server.clone());
        }
    }
}

/// Prints changed surfaces to a terminal. Log lines are printed once each.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    log_cursor: LogCursor,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            log_cursor: LogCursor::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render_logs(&mut self, sink: &LogSink) -> io::Result<()> {
        let generation = sink.generation();
        match views::render_logs(sink) {
            LogView::Lines(lines) => {
                let fresh = self.log_cursor.unseen(&lines, generation);
                write_log_lines(&mut self.out, fresh)?;
                self.log_cursor.advance(&lines, generation);
                Ok(())
            }
            other => {
                self.log_cursor.generation = generation;
                write_logs(&mut self.out, &other)
            }
        }
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, dashboard: &Dashboard, changed: &BTreeSet<Surface>) -> io::Result<()> {
        for surface in changed {
            match surface {
                Surface::Backups => write_backups(&mut self.out, dashboard.backup_table())?,
                Surface::LatestStats => {
                    write_stats(&mut self.out, "Latest Backup", dashboard.latest_stats())?
                }
                Surface::Logs => self.render_logs(dashboard.log_sink())?,
                Surface::AutoBackup => write_auto_backup(&mut self.out, &dashboard.auto_backup())?,
                Surface::StatsModal => match dashboard.stats_modal() {
                    Some(modal) => write_stats(
                        &mut self.out,
                        &format!("Backup {} ({})", modal.backup_id, modal.username),
                        &modal.panel,
                    )?,
                    None => writeln!(self.out, "-- stats closed --")?,
                },
                Surface::Controls => write_controls(&mut self.out, dashboard.controls())?,
                Surface::Connection => {
                    let note = match dashboard.connection() {
                        ConnectionState::Open => "live",
                        ConnectionState::Connecting => "connecting",
                        ConnectionState::Closed => "offline, polling",
                    };
                    writeln!(self.out, "-- updates: {} --", note)?
                }
            }
        }
        self.out.flush()
    }

    fn alert(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{}!! {}{}", RED, message, RESET)?;
        self.out.flush()
    }

    fn message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }
}
