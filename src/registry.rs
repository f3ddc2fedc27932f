//! Known devices and their last-seen timestamps.
//!
//! Status is never stored: it is derived from `now - last_seen` every time a
//! device is read, so a device that stops reporting goes offline without any
//! background sweep.

use std::collections::HashMap;

use crate::models::{Device, DeviceStatus};

// ---

#[derive(Debug, Clone, Default, PartialEq)]
struct DeviceRecord {
    name: String,
    last_seen: Option<i64>,
}

#[derive(Debug)]
pub struct DeviceRegistry {
    // ---
    devices: HashMap<String, DeviceRecord>,
    online_threshold_secs: i64,
}

/// `online` iff the device reported less than `threshold` seconds ago.
pub fn status(last_seen: Option<i64>, now: i64, threshold: i64) -> DeviceStatus {
    match last_seen {
        Some(seen) if now.saturating_sub(seen) < threshold => DeviceStatus::Online,
        _ => DeviceStatus::Offline,
    }
}

impl DeviceRegistry {
    // ---
    pub fn new(online_threshold_secs: i64) -> Self {
        DeviceRegistry {
            devices: HashMap::new(),
            online_threshold_secs,
        }
    }

    /// Record a reading from `device_id`, creating the device if needed.
    pub fn touch(&mut self, device_id: &str, last_seen: i64) {
        self.devices
            .entry(device_id.to_string())
            .or_default()
            .last_seen = Some(last_seen);
    }

    /// Explicit registration. Keeps last-seen; a `None` name keeps the
    /// current one.
    pub fn upsert(&mut self, device_id: &str, name: Option<&str>, now: i64) -> Device {
        // ---
        let record = self.devices.entry(device_id.to_string()).or_default();
        if let Some(name) = name {
            record.name = name.to_string();
        }
        let record = record.clone();
        self.view(device_id, &record, now)
    }

    /// Update display metadata of a known device.
    pub fn rename(&mut self, device_id: &str, name: &str, now: i64) -> Option<Device> {
        // ---
        let record = self.devices.get_mut(device_id)?;
        record.name = name.to_string();
        let record = record.clone();
        Some(self.view(device_id, &record, now))
    }

    pub fn get(&self, device_id: &str, now: i64) -> Option<Device> {
        self.devices
            .get(device_id)
            .map(|record| self.view(device_id, record, now))
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    /// Returns whether the device existed. Callers cascade the cleanup to the
    /// stores keyed by the same id.
    pub fn remove(&mut self, device_id: &str) -> bool {
        self.devices.remove(device_id).is_some()
    }

    /// All devices sorted by id, status derived against `now`.
    pub fn list(&self, now: i64) -> Vec<Device> {
        // ---
        let mut out: Vec<Device> = self
            .devices
            .iter()
            .map(|(id, record)| self.view(id, record, now))
            .collect();
        out.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        out
    }

    fn view(&self, device_id: &str, record: &DeviceRecord, now: i64) -> Device {
        Device {
            device_id: device_id.to_string(),
            name: record.name.clone(),
            last_seen: record.last_seen,
            status: status(record.last_seen, now, self.online_threshold_secs),
        }
    }
}
