//! Custom error types for the backup dashboard.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dispatch::CommandKind;

#[derive(Error, Debug)]
pub enum DashboardError {
    /// Bad local input, caught before any request is sent
    #[error("{0}")]
    Validation(String),

    /// Non-success HTTP status or an `error` field in the response body
    #[error("{message}")]
    Request {
        status: Option<StatusCode>,
        message: String,
    },

    /// The request never completed (connect failure, timeout, dropped body)
    #[error("Network error: {0}")]
    Transport(String),

    /// A response or push payload is not valid JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// The push connection itself failed
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("A {0} request is already in flight")]
    Busy(CommandKind),

    #[error("Cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    pub fn request(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        DashboardError::Request {
            status,
            message: message.into(),
        }
    }

    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DashboardError::Request { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DashboardError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            DashboardError::request(Some(status), e.to_string())
        } else {
            // timeouts, connect errors and body read failures
            DashboardError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(e: serde_json::Error) -> Self {
        DashboardError::Parse(e.to_string())
    }
}

impl From<config::ConfigError> for DashboardError {
    fn from(e: config::ConfigError) -> Self {
        DashboardError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_displays_server_message() {
        let err = DashboardError::request(Some(StatusCode::NOT_FOUND), "Backup not found");
        assert_eq!(err.to_string(), "Backup not found");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_json_errors_are_parse_errors() {
        let err: DashboardError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, DashboardError::Parse(_)));
        assert_eq!(err.status(), None);
    }
}
