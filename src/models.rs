//! Data models for the air-quality telemetry pipeline.
//!
//! Wire names follow what deployed devices and dashboards already speak:
//! readings use `deviceId` / `IAQ`, while device, alert and settings records
//! use snake_case.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---

/// Coarse severity derived from the air-quality index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Safe,
    Warn,
    Danger,
}

impl Level {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Safe => "SAFE",
            Level::Warn => "WARN",
            Level::Danger => "DANGER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown level '{0}'")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SAFE" => Ok(Level::Safe),
            "WARN" => Ok(Level::Warn),
            "DANGER" => Ok(Level::Danger),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

/// A validated sensor reading, timestamp already in unix seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    // ---
    pub device_id: String,
    pub ts: i64,
    pub temp: Option<f64>,
    pub hum: Option<f64>,
    pub gas: Option<f64>,
    pub dust: Option<f64>,
}

/// A scored reading as stored in history and pushed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedReading {
    // ---
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub ts: i64,
    pub temp: Option<f64>,
    pub hum: Option<f64>,
    pub gas: Option<f64>,
    pub dust: Option<f64>,
    #[serde(rename = "IAQ")]
    pub index: u8,
    pub level: Level,
}

/// Query-surface view of a device's latest reading.
///
/// When a device has not reported yet this is a placeholder carrying only
/// the requested id and the time of the query, so "no data yet" is still a
/// well-formed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestReading {
    // ---
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub ts: i64,
    pub temp: Option<f64>,
    pub hum: Option<f64>,
    pub gas: Option<f64>,
    pub dust: Option<f64>,
    #[serde(rename = "IAQ")]
    pub index: Option<u8>,
    pub level: Option<Level>,
}

impl LatestReading {
    // ---
    pub fn placeholder(device_id: &str, now: i64) -> Self {
        LatestReading {
            device_id: device_id.to_string(),
            ts: now,
            temp: None,
            hum: None,
            gas: None,
            dust: None,
            index: None,
            level: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.level.is_none()
    }
}

impl From<ProcessedReading> for LatestReading {
    fn from(p: ProcessedReading) -> Self {
        // ---
        LatestReading {
            device_id: p.device_id,
            ts: p.ts,
            temp: p.temp,
            hum: p.hum,
            gas: p.gas,
            dust: p.dust,
            index: Some(p.index),
            level: Some(p.level),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

/// A known device with its status derived at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    // ---
    pub device_id: String,
    pub name: String,
    pub last_seen: Option<i64>,
    pub status: DeviceStatus,
}

/// A throttled alert record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertItem {
    // ---
    pub id: uuid::Uuid,
    pub device_id: String,
    pub ts: i64,
    /// Index at alert time.
    pub value: i32,
    pub level: Level,
    pub message: String,
}

/// Per-device alerting thresholds, owned by the settings screen.
///
/// The scorer uses fixed global curves and never reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSettings {
    // ---
    pub device_id: String,
    pub gas_warn: f64,
    pub gas_danger: f64,
    pub dust_warn: f64,
    pub dust_danger: f64,
    pub temp_low: f64,
    pub temp_high: f64,
    pub hum_low: f64,
    pub hum_high: f64,
}

impl ThresholdSettings {
    // ---
    pub fn defaults_for(device_id: &str) -> Self {
        ThresholdSettings {
            device_id: device_id.to_string(),
            gas_warn: 800.0,
            gas_danger: 1200.0,
            dust_warn: 0.08,
            dust_danger: 0.15,
            temp_low: 18.0,
            temp_high: 32.0,
            hum_low: 35.0,
            hum_high: 75.0,
        }
    }
}

/// Partial update for [`ThresholdSettings`]; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    // ---
    pub gas_warn: Option<f64>,
    pub gas_danger: Option<f64>,
    pub dust_warn: Option<f64>,
    pub dust_danger: Option<f64>,
    pub temp_low: Option<f64>,
    pub temp_high: Option<f64>,
    pub hum_low: Option<f64>,
    pub hum_high: Option<f64>,
}

impl ThresholdSettings {
    // ---
    pub fn apply(&mut self, patch: &SettingsPatch) {
        let fields = [
            (&mut self.gas_warn, patch.gas_warn),
            (&mut self.gas_danger, patch.gas_danger),
            (&mut self.dust_warn, patch.dust_warn),
            (&mut self.dust_danger, patch.dust_danger),
            (&mut self.temp_low, patch.temp_low),
            (&mut self.temp_high, patch.temp_high),
            (&mut self.hum_low, patch.hum_low),
            (&mut self.hum_high, patch.hum_high),
        ];
        for (slot, value) in fields {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }
}

/// Response body for history queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub points: Vec<ProcessedReading>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn create_test_processed() -> ProcessedReading {
        // ---
        ProcessedReading {
            device_id: "d1".to_string(),
            ts: 1_700_000_000,
            temp: Some(24.0),
            hum: None,
            gas: Some(300.0),
            dust: Some(0.05),
            index: 83,
            level: Level::Safe,
        }
    }

    #[test]
    fn test_processed_wire_names() {
        // ---
        let json = serde_json::to_value(create_test_processed()).unwrap();

        assert_eq!(json["deviceId"], "d1");
        assert_eq!(json["IAQ"], 83);
        assert_eq!(json["level"], "SAFE");
        assert!(json["hum"].is_null());
    }

    #[test]
    fn test_placeholder_carries_id_and_time() {
        // ---
        let latest = LatestReading::placeholder("d9", 42);

        assert_eq!(latest.device_id, "d9");
        assert_eq!(latest.ts, 42);
        assert!(latest.is_placeholder());
        assert!(!LatestReading::from(create_test_processed()).is_placeholder());
    }

    #[test]
    fn test_settings_patch_keeps_absent_fields() {
        // ---
        let mut settings = ThresholdSettings::defaults_for("d1");
        let patch = SettingsPatch {
            gas_warn: Some(500.0),
            hum_high: Some(80.0),
            ..Default::default()
        };
        settings.apply(&patch);

        assert_eq!(settings.gas_warn, 500.0);
        assert_eq!(settings.hum_high, 80.0);
        assert_eq!(settings.gas_danger, 1200.0);
        assert_eq!(settings.dust_warn, 0.08);
    }

    #[test]
    fn test_level_round_trip_names() {
        // ---
        for level in [Level::Safe, Level::Warn, Level::Danger] {
            assert_eq!(level.as_str().parse::<Level>(), Ok(level));
        }
        assert_eq!("INFO".parse::<Level>(), Err(UnknownLevel("INFO".to_string())));
        assert!("safe".parse::<Level>().is_err());
    }
}
