//! Wire types for the backup server's REST API and push channel.

pub mod auto_backup;
pub mod backup;
pub mod log_entry;
pub mod stats;

pub use auto_backup::{AutoBackupConfig, AutoBackupStatus};
pub use backup::BackupRecord;
pub use log_entry::LogEntry;
pub use stats::{CategoryStats, StatsSnapshot};

use serde::{de::DeserializeOwned, Deserialize, Deserializer};

/// Deserialize an optional field, treating a value of the wrong JSON type as absent.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Generic command acknowledgement: `{status:"success", message?}` or `{error}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CommandAck {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status.as_deref() == Some("success")
    }
}
