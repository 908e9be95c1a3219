//! Configuration management for the backup dashboard.
//!
//! Built-in defaults, then an optional TOML file, then `DASHBOARD__*`
//! environment variables (e.g. `DASHBOARD__SERVER__URL`). CLI flags are
//! applied on top by `main`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub stream: StreamConfig,
    pub dashboard: DashboardConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Backup server base URL
    pub url: String,

    /// Per-request timeout for REST calls (the push stream has none)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connect timeout, applied to REST calls and the push stream alike
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectMode {
    /// Stay closed after the first stream failure
    Never,
    /// Bounded exponential backoff
    Backoff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_reconnect")]
    pub reconnect: ReconnectMode,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Give up after this many consecutive failed attempts (unset = never)
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// An open stream silent for this long (no data, no keep-alive) is dropped
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Maximum entries kept in the log panel
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Polling period while the push stream is down
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Where downloaded backups are written
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_reconnect() -> ReconnectMode {
    ReconnectMode::Backoff
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30000
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_log_capacity() -> usize {
    100
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                url: "http://localhost:5000".to_string(),
                request_timeout_secs: default_request_timeout_secs(),
                connect_timeout_secs: default_connect_timeout_secs(),
            },
            stream: StreamConfig {
                reconnect: default_reconnect(),
                initial_backoff_ms: default_initial_backoff_ms(),
                max_backoff_ms: default_max_backoff_ms(),
                max_attempts: None,
                idle_timeout_secs: default_idle_timeout_secs(),
            },
            dashboard: DashboardConfig {
                log_capacity: default_log_capacity(),
                poll_interval_secs: default_poll_interval_secs(),
                download_dir: default_download_dir(),
            },
            log: LogConfig {
                level: default_log_level(),
            },
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("DASHBOARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::DashboardError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if reqwest::Url::parse(&self.server.url).is_err() {
            return Err(crate::DashboardError::Config(format!(
                "server.url is not a valid URL: {}",
                self.server.url
            )));
        }
        if self.dashboard.log_capacity == 0 {
            return Err(crate::DashboardError::Config(
                "dashboard.log_capacity must be at least 1".to_string(),
            ));
        }
        if self.stream.initial_backoff_ms == 0 || self.stream.max_backoff_ms < self.stream.initial_backoff_ms {
            return Err(crate::DashboardError::Config(
                "stream backoff must satisfy 0 < initial_backoff_ms <= max_backoff_ms".to_string(),
            ));
        }
        if self.stream.idle_timeout_secs == 0 {
            return Err(crate::DashboardError::Config(
                "stream.idle_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.server.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.dashboard.poll_interval_secs.max(1))
    }
}
