//! Per-device threshold settings.
//!
//! Stored and served for the alerting configuration screen. Scoring does not
//! read them.

use std::collections::HashMap;

use crate::models::{SettingsPatch, ThresholdSettings};

// ---

#[derive(Debug, Default)]
pub struct SettingsStore {
    settings: HashMap<String, ThresholdSettings>,
}

impl SettingsStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored settings, or the defaults for a device nobody configured yet.
    pub fn get(&self, device_id: &str) -> ThresholdSettings {
        self.settings
            .get(device_id)
            .cloned()
            .unwrap_or_else(|| ThresholdSettings::defaults_for(device_id))
    }

    pub fn update(&mut self, device_id: &str, patch: &SettingsPatch) -> ThresholdSettings {
        // ---
        let entry = self
            .settings
            .entry(device_id.to_string())
            .or_insert_with(|| ThresholdSettings::defaults_for(device_id));
        entry.apply(patch);
        entry.clone()
    }

    pub fn forget(&mut self, device_id: &str) {
        self.settings.remove(device_id);
    }
}
