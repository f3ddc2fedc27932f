//! Validation and coercion of raw inbound readings.
//!
//! Devices in the field run several firmware revisions: some report `ts` in
//! seconds, others in milliseconds, some send numbers as strings, and empty
//! channels arrive as `null`, `""` or not at all. This module turns any of
//! those into a typed [`Reading`] or a [`Rejection`]; it never panics on data.

use serde_json::Value;
use thiserror::Error;

use crate::models::Reading;

// ---

/// Timestamps above this are taken to be milliseconds.
pub const MILLIS_THRESHOLD: f64 = 2e10;

/// Largest accepted timestamp, in seconds after millisecond conversion.
pub const MAX_TS_SECS: i64 = 100_000_000_000;

/// Why a raw message was dropped before entering the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing or empty device id")]
    MissingDeviceId,
    #[error("missing, non-numeric or out-of-range timestamp")]
    InvalidTimestamp,
}

/// Knobs for firmware quirks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizerOptions {
    /// Treat dust values in `[0, 1]` as a fraction and scale them by 1000;
    /// values above 1 pass through unchanged.
    ///
    /// This is lossy: a sensor that legitimately reports below 1 in the
    /// larger unit gets inflated, and calibration drift around 1 flips
    /// readings between units.
    pub rescale_dust: bool,
}

/// Normalize one raw message.
pub fn normalize(raw: &Value, options: NormalizerOptions) -> Result<Reading, Rejection> {
    // ---
    let obj = raw.as_object().ok_or(Rejection::NotAnObject)?;

    let device_id = obj
        .get("deviceId")
        .or_else(|| obj.get("device_id"))
        .and_then(coerce_device_id)
        .ok_or(Rejection::MissingDeviceId)?;

    let ts = obj
        .get("ts")
        .and_then(coerce_number)
        .map(normalize_timestamp)
        .filter(|ts| (0..=MAX_TS_SECS).contains(ts))
        .ok_or(Rejection::InvalidTimestamp)?;

    let dust = obj.get("dust").and_then(coerce_number);
    let dust = if options.rescale_dust {
        dust.map(rescale_dust)
    } else {
        dust
    };

    Ok(Reading {
        device_id,
        ts,
        temp: obj.get("temp").and_then(coerce_number),
        hum: obj.get("hum").and_then(coerce_number),
        gas: obj.get("gas").and_then(coerce_number),
        dust,
    })
}

/// Seconds pass through (fraction dropped); milliseconds are divided by 1000
/// and truncated.
pub fn normalize_timestamp(ts: f64) -> i64 {
    // ---
    if ts > MILLIS_THRESHOLD {
        (ts / 1000.0).trunc() as i64
    } else {
        ts.trunc() as i64
    }
}

fn rescale_dust(dust: f64) -> f64 {
    if (0.0..=1.0).contains(&dust) {
        dust * 1000.0
    } else {
        dust
    }
}

fn coerce_device_id(v: &Value) -> Option<String> {
    // ---
    let id = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

/// Finite number from a JSON number or numeric string; anything else is
/// absent, never zero.
fn coerce_number(v: &Value) -> Option<f64> {
    // ---
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn normalize_default(v: Value) -> Result<Reading, Rejection> {
        normalize(&v, NormalizerOptions::default())
    }

    #[test]
    fn test_millisecond_timestamp_is_scaled() {
        // ---
        let r = normalize_default(json!({"deviceId": "d1", "ts": 1_700_000_000_000_i64})).unwrap();
        assert_eq!(r.ts, 1_700_000_000);

        let r = normalize_default(json!({"deviceId": "d1", "ts": 1_700_000_000_999_i64})).unwrap();
        assert_eq!(r.ts, 1_700_000_000);
    }

    #[test]
    fn test_second_timestamp_passes_through() {
        // ---
        let r = normalize_default(json!({"deviceId": "d1", "ts": 1_700_000_000})).unwrap();
        assert_eq!(r.ts, 1_700_000_000);

        let r = normalize_default(json!({"deviceId": "d1", "ts": 1_700_000_000.75})).unwrap();
        assert_eq!(r.ts, 1_700_000_000);
    }

    #[test]
    fn test_device_id_is_trimmed_and_required() {
        // ---
        let r = normalize_default(json!({"deviceId": "  esp32-a  ", "ts": 1})).unwrap();
        assert_eq!(r.device_id, "esp32-a");

        let r = normalize_default(json!({"device_id": "legacy", "ts": 1})).unwrap();
        assert_eq!(r.device_id, "legacy");

        assert_eq!(
            normalize_default(json!({"deviceId": "   ", "ts": 1})),
            Err(Rejection::MissingDeviceId)
        );
        assert_eq!(normalize_default(json!({"ts": 1})), Err(Rejection::MissingDeviceId));
        assert_eq!(
            normalize_default(json!({"deviceId": true, "ts": 1})),
            Err(Rejection::MissingDeviceId)
        );
    }

    #[test]
    fn test_timestamp_must_be_numeric() {
        // ---
        assert_eq!(
            normalize_default(json!({"deviceId": "d1"})),
            Err(Rejection::InvalidTimestamp)
        );
        assert_eq!(
            normalize_default(json!({"deviceId": "d1", "ts": "yesterday"})),
            Err(Rejection::InvalidTimestamp)
        );
        assert_eq!(
            normalize_default(json!({"deviceId": "d1", "ts": null})),
            Err(Rejection::InvalidTimestamp)
        );

        let r = normalize_default(json!({"deviceId": "d1", "ts": "1700000000"})).unwrap();
        assert_eq!(r.ts, 1_700_000_000);
    }

    #[test]
    fn test_timestamp_out_of_range_is_rejected() {
        // ---
        for ts in [json!(-1e300), json!(1e300), json!(-5), json!(1e15)] {
            assert_eq!(
                normalize_default(json!({"deviceId": "d1", "ts": ts.clone()})),
                Err(Rejection::InvalidTimestamp),
                "ts = {ts}"
            );
        }

        let r = normalize_default(json!({"deviceId": "d1", "ts": 0})).unwrap();
        assert_eq!(r.ts, 0);
        let r = normalize_default(json!({"deviceId": "d1", "ts": 1e14})).unwrap();
        assert_eq!(r.ts, MAX_TS_SECS);
    }

    #[test]
    fn test_non_object_is_rejected() {
        // ---
        assert_eq!(normalize_default(json!([1, 2, 3])), Err(Rejection::NotAnObject));
        assert_eq!(normalize_default(json!("d1")), Err(Rejection::NotAnObject));
    }

    #[test]
    fn test_empty_channels_are_absent_not_zero() {
        // ---
        let r = normalize_default(json!({
            "deviceId": "d1",
            "ts": 10,
            "temp": "",
            "hum": null,
            "gas": "n/a"
        }))
        .unwrap();

        assert_eq!(r.temp, None);
        assert_eq!(r.hum, None);
        assert_eq!(r.gas, None);
        assert_eq!(r.dust, None);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        // ---
        let r = normalize_default(json!({
            "deviceId": "d1",
            "ts": 10,
            "temp": " 24.5 ",
            "hum": 51,
            "gas": "300",
            "dust": 0.05
        }))
        .unwrap();

        assert_eq!(r.temp, Some(24.5));
        assert_eq!(r.hum, Some(51.0));
        assert_eq!(r.gas, Some(300.0));
        assert_eq!(r.dust, Some(0.05));
    }

    #[test]
    fn test_dust_rescale_is_opt_in() {
        // ---
        let raw = json!({"deviceId": "d1", "ts": 10, "dust": 0.05});
        let plain = normalize(&raw, NormalizerOptions::default()).unwrap();
        assert_eq!(plain.dust, Some(0.05));

        let opts = NormalizerOptions { rescale_dust: true };
        let scaled = normalize(&raw, opts).unwrap();
        assert!((scaled.dust.unwrap() - 50.0).abs() < 1e-9);

        let raw = json!({"deviceId": "d1", "ts": 10, "dust": 35.4});
        assert_eq!(normalize(&raw, opts).unwrap().dust, Some(35.4));

        let raw = json!({"deviceId": "d1", "ts": 10, "dust": 1});
        assert_eq!(normalize(&raw, opts).unwrap().dust, Some(1000.0));
    }
}
