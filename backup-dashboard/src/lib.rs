//! Backup Dashboard Library
//!
//! Live client for the backup server: one push stream plus polling keeps the
//! backup list, statistics, log panel and auto-backup control in sync, and a
//! command dispatcher issues the server's REST commands.

pub mod api;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod log_sink;
pub mod models;
pub mod reconcile;
pub mod stream;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::DashboardError;
pub type Result<T> = std::result::Result<T, DashboardError>;
