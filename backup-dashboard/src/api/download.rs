//! Backup archive download (`GET /backup/{id}/download`).

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::ApiClient;
use crate::models::CommandAck;
use crate::{DashboardError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

impl ApiClient {
    /// Stream a backup archive into `dir`. A partial file is removed on failure.
    pub async fn download_backup(&self, id: &str, dir: &Path) -> Result<DownloadedFile> {
        let url = self.url(&["backup", id, "download"]);
        info!("Downloading backup {} from {}", id, url);

        let response = self.streaming.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = serde_json::from_slice::<CommandAck>(&body)
                .ok()
                .and_then(|ack| ack.error)
                .unwrap_or_else(|| format!("Download failed with status: {}", status));
            return Err(DashboardError::request(Some(status), message));
        }

        let file_name = archive_name(response.headers(), id).ok_or_else(|| {
            DashboardError::Validation(format!("Backup id '{}' is not a usable file name", id))
        })?;
        let path = dir.join(file_name);

        let mut file = tokio::fs::File::create(&path).await?;
        let mut body = response.bytes_stream();
        let mut written: u64 = 0;

        let result: Result<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove partial download {}: {}", path.display(), rm);
            }
            return Err(e);
        }

        info!("Saved {} bytes to {}", written, path.display());
        Ok(DownloadedFile { path, bytes: written })
    }
}

/// Local file name: the `Content-Disposition` name, else `<id>.zip`.
fn archive_name(headers: &HeaderMap, id: &str) -> Option<String> {
    attachment_name(headers).or_else(|| last_component(&format!("{}.zip", id)))
}

/// File name from `Content-Disposition`, reduced to its last path component.
fn attachment_name(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let raw = value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');
    last_component(raw)
}

fn last_component(raw: &str) -> Option<String> {
    Path::new(raw)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
