use serde::{Deserialize, Serialize};

/// A durable server-side log line (`GET /logs`, `log_updated` push).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    #[serde(default, alias = "isSuccess")]
    pub is_success: bool,
}
