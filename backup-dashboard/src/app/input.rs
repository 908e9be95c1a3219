//! Line commands typed into the live dashboard.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::AppEvent;
use crate::dispatch::Command;

pub const HELP: &str = "\
Commands:
  backup <user>                        create a backup now
  delete <id>                          delete a backup (asks for confirmation)
  download <id> [dir]                  save a backup archive
  stats <id>                           show statistics for one backup
  close                                close the statistics view
  auto start <user> <keep> <hours>     start the recurring backup job
  auto stop                            stop the recurring backup job
  refresh                              reload every view
  help                                 show this text
  quit                                 leave the dashboard";

#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    Command(Command),
    /// Delete needs a confirmation before it becomes a command
    Delete(String),
    ShowStats(String),
    CloseStats,
    Refresh,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parse one input line. Missing arguments become empty strings so the
/// dispatcher reports them through its usual validation.
pub fn parse_input(line: &str) -> UserInput {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return UserInput::Empty;
    };
    let mut arg = || words.next().unwrap_or_default().to_string();

    match verb.to_ascii_lowercase().as_str() {
        "backup" => UserInput::Command(Command::CreateBackup { username: arg() }),
        "delete" | "rm" => UserInput::Delete(arg()),
        "download" => {
            let id = arg();
            let dir = Some(arg()).filter(|d| !d.is_empty()).map(PathBuf::from);
            UserInput::Command(Command::Download { id, dir })
        }
        "stats" => UserInput::ShowStats(arg()),
        "close" => UserInput::CloseStats,
        "auto" => match arg().to_ascii_lowercase().as_str() {
            "start" => UserInput::Command(Command::StartAutoBackup {
                username: arg(),
                keep_last: arg(),
                interval_hours: arg(),
            }),
            "stop" => UserInput::Command(Command::StopAutoBackup),
            _ => UserInput::Unknown(line.trim().to_string()),
        },
        "refresh" | "r" => UserInput::Refresh,
        "help" | "?" => UserInput::Help,
        "quit" | "exit" | "q" => UserInput::Quit,
        _ => UserInput::Unknown(line.trim().to_string()),
    }
}

/// Whether a confirmation answer means yes.
pub fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Forward stdin lines to the app queue until EOF or shutdown. The thread is
/// left detached on exit; a pending read never holds up runtime shutdown.
pub fn spawn_stdin_reader(
    events: mpsc::Sender<AppEvent>,
    shutdown: CancellationToken,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if shutdown.is_cancelled() {
                    break;
                }
                match line {
                    Ok(line) => {
                        if events.blocking_send(AppEvent::Input(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
            debug!("stdin reader finished");
        })
}
