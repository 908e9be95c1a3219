use serde::{Deserialize, Serialize};

use super::lenient;

/// The recurring backup job. The server runs at most one at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoBackupConfig {
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
    /// Max retained backups for the user
    #[serde(default, rename = "keepLast", deserialize_with = "lenient")]
    pub keep_last: Option<u32>,
    /// Hours between runs
    #[serde(default, rename = "interval", alias = "intervalHours", deserialize_with = "lenient")]
    pub interval_hours: Option<f64>,
}

/// `GET /auto-backup-status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoBackupStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub config: Option<AutoBackupConfig>,
}

/// Body of `POST /auto-backup`, built only from validated input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartAutoBackupRequest {
    pub username: String,
    #[serde(rename = "keepLast")]
    pub keep_last: u32,
    pub interval: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_status_with_config() {
        let json = r#"{"running":true,"config":{"username":"bob","keepLast":5,"interval":24}}"#;
        let status: AutoBackupStatus = serde_json::from_str(json).unwrap();
        assert!(status.running);
        let config = status.config.unwrap();
        assert_eq!(config.username.as_deref(), Some("bob"));
        assert_eq!(config.keep_last, Some(5));
        assert_eq!(config.interval_hours, Some(24.0));
    }

    #[test]
    fn test_stopped_status_with_null_config() {
        let status: AutoBackupStatus =
            serde_json::from_str(r#"{"running":false,"config":null}"#).unwrap();
        assert_eq!(status, AutoBackupStatus::default());
    }

    #[test]
    fn test_start_request_uses_wire_names() {
        let body = serde_json::to_value(StartAutoBackupRequest {
            username: "bob".to_string(),
            keep_last: 5,
            interval: 1.5,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"username":"bob","keepLast":5,"interval":1.5}));
    }
}
