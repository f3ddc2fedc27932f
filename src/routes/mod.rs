//! Route gateway: merges every sibling subrouter and attaches the shared
//! state, so `main.rs` only sees [`router`].

use std::sync::Arc;

use axum::Router;

use crate::{normalize_timestamp, ApiError, Telemetry};

mod alerts;
mod devices;
mod health;
mod readings;
mod settings;
mod ws;

// ---

pub type AppState = Arc<Telemetry>;

pub fn router(telemetry: Arc<Telemetry>) -> Router {
    // ---
    Router::new()
        .merge(devices::router())
        .merge(readings::router())
        .merge(alerts::router())
        .merge(settings::router())
        .merge(ws::router())
        .merge(health::router())
        .with_state(telemetry)
}

/// Trimmed, non-empty `device_id` or a 400.
fn require_device_id(raw: Option<&str>) -> Result<String, ApiError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("device_id is required".to_string()))
}

/// RFC 3339 datetime, or unix seconds/milliseconds, as unix seconds.
fn parse_instant(raw: &str) -> Option<i64> {
    // ---
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(normalize_timestamp)
}

/// Optional bound: absent or blank is `None`, garbage is a 400.
fn parse_optional_instant(raw: Option<&str>, name: &str) -> Result<Option<i64>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(v) => parse_instant(v)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("{name} must be an ISO datetime"))),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_parse_instant_formats() {
        // ---
        assert_eq!(parse_instant("2023-11-14T22:13:20Z"), Some(1_700_000_000));
        assert_eq!(parse_instant("2023-11-15T00:13:20+02:00"), Some(1_700_000_000));
        assert_eq!(parse_instant("1700000000"), Some(1_700_000_000));
        assert_eq!(parse_instant("1700000000000"), Some(1_700_000_000));
        assert_eq!(parse_instant("last tuesday"), None);
    }

    #[test]
    fn test_require_device_id() {
        // ---
        assert_eq!(require_device_id(Some(" d1 ")).unwrap(), "d1");
        assert!(require_device_id(Some("  ")).is_err());
        assert!(require_device_id(None).is_err());
    }

    #[test]
    fn test_optional_instant() {
        // ---
        assert_eq!(parse_optional_instant(None, "from").unwrap(), None);
        assert_eq!(parse_optional_instant(Some(""), "from").unwrap(), None);
        assert_eq!(parse_optional_instant(Some("10"), "from").unwrap(), Some(10));
        assert!(parse_optional_instant(Some("nope"), "to").is_err());
    }
}
