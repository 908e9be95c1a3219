use serde::{Deserialize, Serialize};

/// One row of `GET /backups`. Immutable once created; only ever removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, rename = "date", alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default, rename = "content", alias = "contentSummary")]
    pub content_summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_server_listing() {
        let json = r#"[{"id":"alice_20240101_000000","date":"2024-01-01T00:00:00","username":"alice","content":"12 Anime, 3 Manga"}]"#;
        let records: Vec<BackupRecord> = serde_json::from_str(json).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "alice_20240101_000000");
        assert_eq!(records[0].username.as_deref(), Some("alice"));
        assert_eq!(records[0].content_summary.as_deref(), Some("12 Anime, 3 Manga"));
    }

    #[test]
    fn test_missing_optional_fields() {
        let record: BackupRecord = serde_json::from_str(r#"{"id":"b1"}"#).unwrap();
        assert!(record.username.is_none());
        assert!(record.created_at.is_none());
    }
}
