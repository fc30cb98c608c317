//! Timestamp parsing and formatting utilities.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Epoch values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Parse a timestamp stored as an epoch number (seconds or milliseconds),
/// a numeric string, an RFC 3339 string, or a naive `YYYY-MM-DD HH:MM:SS`
/// string (taken as UTC).
#[must_use]
#[allow(clippy::cast_possible_truncation)] // fractional epochs lose sub-second precision
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// String form of [`parse_timestamp`].
#[must_use]
pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(epoch) = raw.parse::<i64>() {
        return from_epoch(epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

fn from_epoch(epoch: i64) -> Option<DateTime<Utc>> {
    if epoch <= 0 {
        return None;
    }
    if epoch > MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}

/// Compact duration such as `45s`, `12m`, `10h`, `3d`.
#[must_use]
pub fn format_span(duration: Duration) -> String {
    let secs = duration.num_seconds().abs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}

/// Format a relative time (past or future) against `now`.
#[must_use]
pub fn format_relative_time(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(target);
    if duration.num_seconds().abs() < 60 {
        return "just now".to_string();
    }
    if duration.num_seconds() > 0 {
        format!("{} ago", format_span(duration))
    } else {
        format!("in {}", format_span(duration))
    }
}
