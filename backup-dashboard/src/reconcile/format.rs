//! Field formatting shared by every view. All functions are total.

use chrono::{DateTime, Local, NaiveDateTime};
use serde_json::Value;

pub const NOT_AVAILABLE: &str = "N/A";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive layouts the server writes (Python `isoformat()` without an offset).
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Mean score with one decimal. Zero means "ungraded", not "rated zero".
pub fn score(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => format!("{:.1}", v),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn count(value: Option<u64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// A status-breakdown count as sent by the server; non-integers are shown as `N/A`.
pub fn json_count(value: &Value) -> String {
    count(value.as_u64())
}

pub fn text(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Server timestamp in local display form. Offsets are converted to the
/// local zone; naive values are shown as written.
pub fn timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NOT_AVAILABLE.to_string();
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format(DISPLAY_FORMAT).to_string();
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return naive.format(DISPLAY_FORMAT).to_string();
        }
    }
    NOT_AVAILABLE.to_string()
}

/// Split a free-form status key into words on `_`, `-`, whitespace and
/// lower-to-upper camel-case boundaries.
fn status_words(key: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in key.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_numeric();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `plan_to_watch`, `plan-to-watch` and `planToWatch` all become `Plan To Watch`.
pub fn status_label(key: &str) -> String {
    let words: Vec<String> = status_words(key)
        .into_iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "Unknown".to_string()
    } else {
        words.join(" ")
    }
}

/// CSS-safe class token: lowercase words joined by `-`, `[a-z0-9-]` only.
pub fn status_class(key: &str) -> String {
    let words: Vec<String> = status_words(key)
        .into_iter()
        .map(|word| {
            word.to_lowercase()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect();

    if words.is_empty() {
        "unknown".to_string()
    } else {
        words.join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_zero_or_missing_is_not_available() {
        assert_eq!(score(Some(0.0)), "N/A");
        assert_eq!(score(None), "N/A");
        assert_eq!(score(Some(f64::NAN)), "N/A");
        assert_eq!(score(Some(7.26)), "7.3");
        assert_eq!(score(Some(8.0)), "8.0");
    }

    #[test]
    fn test_status_key_variants_normalize_identically() {
        for key in ["plan_to_watch", "plan-to-watch", "planToWatch", "Plan To Watch", "  plan__to  watch "] {
            assert_eq!(status_label(key), "Plan To Watch", "label for {:?}", key);
            assert_eq!(status_class(key), "plan-to-watch", "class for {:?}", key);
        }
        assert_eq!(status_label("on_hold"), "On Hold");
        assert_eq!(status_class("on_hold"), "on-hold");
    }

    #[test]
    fn test_status_normalization_is_total() {
        assert_eq!(status_label(""), "Unknown");
        assert_eq!(status_class("___"), "unknown");
        assert_eq!(status_label("ÜBER"), "ÜBER");
        assert_eq!(status_class("完了"), "unknown");
        assert_eq!(status_class("a<b>\"c"), "abc");
        assert_eq!(status_label("CURRENT"), "CURRENT");
        assert_eq!(status_class("CURRENT"), "current");
    }

    #[test]
    fn test_naive_timestamp_shown_as_written() {
        assert_eq!(timestamp(Some("2024-01-01T09:30:05.123456")), "2024-01-01 09:30:05");
        assert_eq!(timestamp(Some("2024-01-01 09:30:05")), "2024-01-01 09:30:05");
    }

    #[test]
    fn test_offset_timestamp_converted_to_local() {
        let expected = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Local)
            .format(DISPLAY_FORMAT)
            .to_string();
        assert_eq!(timestamp(Some("2024-01-01T00:00:00Z")), expected);
    }

    #[test]
    fn test_bad_timestamps() {
        assert_eq!(timestamp(None), "N/A");
        assert_eq!(timestamp(Some("")), "N/A");
        assert_eq!(timestamp(Some("yesterday")), "N/A");
    }

    #[test]
    fn test_counts() {
        assert_eq!(json_count(&serde_json::json!(12)), "12");
        assert_eq!(json_count(&serde_json::json!("12")), "N/A");
        assert_eq!(json_count(&serde_json::json!(-1)), "N/A");
        assert_eq!(count(None), "N/A");
    }
}
