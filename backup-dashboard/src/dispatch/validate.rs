//! Local input checks, run before any request is sent.

use crate::{DashboardError, Result};

pub fn username(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DashboardError::Validation("Please enter a username.".to_string()));
    }
    Ok(trimmed.to_string())
}

pub fn backup_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DashboardError::Validation("Please specify a backup id.".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Max retained backups: a whole number of at least 1.
pub fn keep_last(raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DashboardError::Validation(format!(
            "Keep last must be a positive whole number (got '{}').",
            raw.trim()
        ))),
    }
}

/// Hours between runs: a finite number above zero.
pub fn interval_hours(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(h) if h.is_finite() && h > 0.0 => Ok(h),
        _ => Err(DashboardError::Validation(format!(
            "Interval must be a positive number of hours (got '{}').",
            raw.trim()
        ))),
    }
}
