//! Typed client for the backup server's REST API.

pub mod download;

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::models::auto_backup::StartAutoBackupRequest;
use crate::models::{AutoBackupStatus, BackupRecord, CommandAck, LogEntry, StatsSnapshot};
use crate::{DashboardError, Result};

pub use download::DownloadedFile;

/// Build `base/<segments...>`, percent-encoding each segment.
pub fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    /// REST calls, bounded by the configured request timeout
    http: Client,
    /// Long-lived bodies (downloads, the push stream): connect timeout only
    streaming: Client,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base = Url::parse(&config.server.url)
            .map_err(|e| DashboardError::Config(format!("invalid server url: {}", e)))?;

        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DashboardError::Config(e.to_string()))?;

        let streaming = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| DashboardError::Config(e.to_string()))?;

        Ok(Self {
            base,
            http,
            streaming,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, segments: &[&str]) -> Url {
        endpoint(&self.base, segments)
    }

    /// Client without a total timeout, for the push stream.
    pub fn streaming_client(&self) -> Client {
        self.streaming.clone()
    }

    /// GET /backups
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        self.get_json(&["backups"]).await
    }

    /// GET /latest-stats
    pub async fn latest_stats(&self) -> Result<StatsSnapshot> {
        self.get_json(&["latest-stats"]).await
    }

    /// GET /backup/{id}/stats
    pub async fn backup_stats(&self, id: &str) -> Result<StatsSnapshot> {
        self.get_json(&["backup", id, "stats"]).await
    }

    /// GET /auto-backup-status
    pub async fn auto_backup_status(&self) -> Result<AutoBackupStatus> {
        self.get_json(&["auto-backup-status"]).await
    }

    /// GET /logs
    pub async fn logs(&self) -> Result<Vec<LogEntry>> {
        self.get_json(&["logs"]).await
    }

    /// POST /backup
    pub async fn create_backup(&self, username: &str) -> Result<CommandAck> {
        let req = self
            .http
            .post(self.url(&["backup"]))
            .json(&serde_json::json!({ "username": username }));
        command(req).await
    }

    /// DELETE /backup/{id}
    pub async fn delete_backup(&self, id: &str) -> Result<CommandAck> {
        command(self.http.delete(self.url(&["backup", id]))).await
    }

    /// POST /auto-backup
    pub async fn start_auto_backup(&self, request: &StartAutoBackupRequest) -> Result<CommandAck> {
        command(self.http.post(self.url(&["auto-backup"])).json(request)).await
    }

    /// POST /stop-auto-backup
    pub async fn stop_auto_backup(&self) -> Result<CommandAck> {
        command(self.http.post(self.url(&["stop-auto-backup"]))).await
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.url(segments);
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }
}

/// Send a command and require `{status: "success"}`.
async fn command(req: RequestBuilder) -> Result<CommandAck> {
    let response = req.send().await?;
    let status = response.status();
    let ack: CommandAck = read_json(response).await?;
    if !ack.is_success() {
        return Err(DashboardError::request(
            Some(status),
            "Server did not confirm the request",
        ));
    }
    Ok(ack)
}

/// Decode a JSON body, turning `{error}` bodies and non-2xx statuses into request errors.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await?;

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(DashboardError::request(
                Some(status),
                format!("Request failed with status: {}", status),
            ))
        }
    };

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(DashboardError::request(Some(status), error));
    }
    if !status.is_success() {
        return Err(DashboardError::request(
            Some(status),
            format!("Request failed with status: {}", status),
        ));
    }

    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_bare_host() {
        let base = Url::parse("http://localhost:5000").unwrap();
        assert_eq!(endpoint(&base, &["events"]).as_str(), "http://localhost:5000/events");
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_ids() {
        let base = Url::parse("http://nas.lan/anibackup/").unwrap();
        let url = endpoint(&base, &["backup", "bob 2024/01", "stats"]);
        assert_eq!(url.as_str(), "http://nas.lan/anibackup/backup/bob%202024%2F01/stats");
    }
}
