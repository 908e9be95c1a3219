//! Command dispatcher.
//!
//! Every command follows the same lifecycle:
//! 1. `begin` validates input and reserves the in-flight slot for its kind
//!    (synchronously, before anything touches the network)
//! 2. the caller disables the matching control
//! 3. `PendingCommand::send` performs the single request/response round trip
//! 4. the caller reports the outcome and re-enables the control
//!
//! Views are not refreshed here on success; the server's push events drive that.

pub mod in_flight;
pub mod validate;

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::models::auto_backup::StartAutoBackupRequest;
use crate::{DashboardError, Result};

pub use in_flight::{InFlight, InFlightGuard};

/// Command kinds, one per triggering control. Same-kind commands are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    CreateBackup,
    DeleteBackup,
    /// Start and stop share the one toggle control
    AutoBackup,
    Download,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::CreateBackup,
        CommandKind::DeleteBackup,
        CommandKind::AutoBackup,
        CommandKind::Download,
    ];

    /// Prefix for notifications about this kind of command.
    pub fn title(&self) -> &'static str {
        match self {
            CommandKind::CreateBackup => "Manual Backup",
            CommandKind::DeleteBackup => "Delete Backup",
            CommandKind::AutoBackup => "Auto Backup",
            CommandKind::Download => "Download",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandKind::CreateBackup => "create backup",
            CommandKind::DeleteBackup => "delete backup",
            CommandKind::AutoBackup => "auto backup",
            CommandKind::Download => "download",
        };
        f.write_str(s)
    }
}

/// Raw user input for a command, as typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateBackup {
        username: String,
    },
    DeleteBackup {
        id: String,
    },
    StartAutoBackup {
        username: String,
        keep_last: String,
        interval_hours: String,
    },
    StopAutoBackup,
    Download {
        id: String,
        dir: Option<PathBuf>,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CreateBackup { .. } => CommandKind::CreateBackup,
            Command::DeleteBackup { .. } => CommandKind::DeleteBackup,
            Command::StartAutoBackup { .. } | Command::StopAutoBackup => CommandKind::AutoBackup,
            Command::Download { .. } => CommandKind::Download,
        }
    }
}

/// Destructive-action confirmation.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// A pre-answered confirmation (`--yes`, or an answer already collected).
impl Confirm for bool {
    fn confirm(&self, _prompt: &str) -> bool {
        *self
    }
}

pub fn delete_prompt(id: &str) -> String {
    format!(
        "Are you sure you want to delete backup {}? This cannot be undone.",
        id
    )
}

#[derive(Debug, Clone, PartialEq)]
enum Validated {
    CreateBackup { username: String },
    DeleteBackup { id: String },
    StartAutoBackup(StartAutoBackupRequest),
    StopAutoBackup,
    Download { id: String, dir: PathBuf },
}

fn validate(command: Command, download_dir: &Path) -> Result<Validated> {
    Ok(match command {
        Command::CreateBackup { username } => Validated::CreateBackup {
            username: validate::username(&username)?,
        },
        Command::DeleteBackup { id } => Validated::DeleteBackup {
            id: validate::backup_id(&id)?,
        },
        Command::StartAutoBackup {
            username,
            keep_last,
            interval_hours,
        } => Validated::StartAutoBackup(StartAutoBackupRequest {
            username: validate::username(&username)?,
            keep_last: validate::keep_last(&keep_last)?,
            interval: validate::interval_hours(&interval_hours)?,
        }),
        Command::StopAutoBackup => Validated::StopAutoBackup,
        Command::Download { id, dir } => Validated::Download {
            id: validate::backup_id(&id)?,
            dir: dir.unwrap_or_else(|| download_dir.to_path_buf()),
        },
    })
}

/// Final outcome of one command, reported back to the dashboard.
#[derive(Debug)]
pub struct CommandReport {
    pub kind: CommandKind,
    /// Failure heading, e.g. "Manual Backup Failed"
    pub label: String,
    /// Success notification text, or the failure
    pub result: Result<String>,
}

#[derive(Clone)]
pub struct CommandDispatcher {
    api: ApiClient,
    in_flight: InFlight,
    download_dir: PathBuf,
}

impl CommandDispatcher {
    pub fn new(api: ApiClient, download_dir: PathBuf) -> Self {
        Self {
            api,
            in_flight: InFlight::new(),
            download_dir,
        }
    }

    pub fn is_in_flight(&self, kind: CommandKind) -> bool {
        self.in_flight.is_in_flight(kind)
    }

    /// Validate, confirm and reserve. No request is sent by this call.
    pub fn begin(&self, command: Command, confirm: &dyn Confirm) -> Result<PendingCommand> {
        let validated = validate(command, &self.download_dir)?;

        if let Validated::DeleteBackup { id } = &validated {
            if !confirm.confirm(&delete_prompt(id)) {
                info!("Delete of backup {} not confirmed", id);
                return Err(DashboardError::Cancelled);
            }
        }

        let kind = match &validated {
            Validated::CreateBackup { .. } => CommandKind::CreateBackup,
            Validated::DeleteBackup { .. } => CommandKind::DeleteBackup,
            Validated::StartAutoBackup(_) | Validated::StopAutoBackup => CommandKind::AutoBackup,
            Validated::Download { .. } => CommandKind::Download,
        };
        let guard = self.in_flight.try_begin(kind)?;

        Ok(PendingCommand {
            api: self.api.clone(),
            command: validated,
            guard,
        })
    }

    /// `begin` followed by `send`.
    pub async fn execute(&self, command: Command, confirm: &dyn Confirm) -> Result<String> {
        self.begin(command, confirm)?.send().await.result
    }
}

/// A validated command holding its in-flight slot until sent.
pub struct PendingCommand {
    api: ApiClient,
    command: Validated,
    guard: InFlightGuard,
}

impl PendingCommand {
    pub fn kind(&self) -> CommandKind {
        self.guard.kind()
    }

    /// Heading for the failure notification.
    pub fn label(&self) -> String {
        match &self.command {
            Validated::CreateBackup { .. } => "Manual Backup Failed".to_string(),
            Validated::DeleteBackup { id } => format!("Failed to delete backup {}", id),
            Validated::StartAutoBackup(_) | Validated::StopAutoBackup => {
                "Auto Backup Failed".to_string()
            }
            Validated::Download { id, .. } => format!("Failed to download backup {}", id),
        }
    }

    /// Info notification shown while the request is in flight.
    pub fn start_message(&self) -> String {
        match &self.command {
            Validated::CreateBackup { username } => format!(
                "Manual Backup: Starting backup for {}... This may take a moment.",
                username
            ),
            Validated::DeleteBackup { id } => format!("Deleting backup {}...", id),
            Validated::StartAutoBackup(req) => {
                format!("Auto Backup: Attempting to start for {}...", req.username)
            }
            Validated::StopAutoBackup => "Auto Backup: Attempting to stop...".to_string(),
            Validated::Download { id, .. } => format!("Downloading backup {}...", id),
        }
    }

    /// Perform the request. The in-flight slot is released when this returns.
    pub async fn send(self) -> CommandReport {
        let kind = self.kind();
        let label = self.label();
        let PendingCommand {
            api,
            command,
            guard: _guard,
        } = self;

        let result = match command {
            Validated::CreateBackup { username } => api.create_backup(&username).await.map(|ack| {
                ack.message.unwrap_or_else(|| {
                    format!("Manual backup for {} completed successfully.", username)
                })
            }),
            Validated::DeleteBackup { id } => api
                .delete_backup(&id)
                .await
                .map(|_| format!("Backup {} deleted successfully.", id)),
            Validated::StartAutoBackup(req) => api.start_auto_backup(&req).await.map(|ack| {
                ack.message
                    .unwrap_or_else(|| "Auto backup started successfully.".to_string())
            }),
            Validated::StopAutoBackup => api.stop_auto_backup().await.map(|ack| {
                ack.message
                    .unwrap_or_else(|| "Auto backup stopped successfully.".to_string())
            }),
            Validated::Download { id, dir } => api.download_backup(&id, &dir).await.map(|file| {
                format!(
                    "Backup {} saved to {} ({} bytes).",
                    id,
                    file.path.display(),
                    file.bytes
                )
            }),
        };

        match &result {
            Ok(message) => info!("{}", message),
            Err(e) => warn!("{}: {}", label, e),
        }

        CommandReport {
            kind,
            label,
            result,
        }
    }
}
