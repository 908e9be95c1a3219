//! Utility modules for the backup dashboard.

pub mod errors;
pub mod logger;
pub mod shutdown;

pub use errors::DashboardError;
