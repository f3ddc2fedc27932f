//! The ingest pipeline and query surface.
//!
//! `Telemetry` owns the device registry, time-series store, alert throttler
//! and settings behind one map-level lock, so a reading's registry touch,
//! history append and throttle update land together. Fan-out happens inside
//! the same critical section, so observers receive a device's readings in
//! history order. Persistence runs after the lock is released.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::fanout::FanoutRouter;
use crate::models::{
    AlertItem, Device, LatestReading, ProcessedReading, Reading, SettingsPatch, ThresholdSettings,
};
use crate::normalizer::{self, NormalizerOptions, Rejection};
use crate::registry::DeviceRegistry;
use crate::repository::TelemetryRepository;
use crate::scorer;
use crate::settings::SettingsStore;
use crate::store::{self, TimeSeriesStore, DEFAULT_HISTORY_CAP};
use crate::throttler::{AlertThrottler, DEFAULT_ALERT_CAP, DEFAULT_STALE_SECS};

// ---

pub const DEFAULT_ONLINE_THRESHOLD_SECS: i64 = 30;

/// Current unix time in seconds.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Tunables for the core structures.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryConfig {
    // ---
    pub online_threshold_secs: i64,
    pub history_cap: usize,
    pub alert_cap: usize,
    pub alert_stale_secs: i64,
    pub normalizer: NormalizerOptions,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            online_threshold_secs: DEFAULT_ONLINE_THRESHOLD_SECS,
            history_cap: DEFAULT_HISTORY_CAP,
            alert_cap: DEFAULT_ALERT_CAP,
            alert_stale_secs: DEFAULT_STALE_SECS,
            normalizer: NormalizerOptions::default(),
        }
    }
}

/// Outcome of one accepted reading.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub reading: ProcessedReading,
    pub alert: Option<AlertItem>,
    /// Observers that accepted the broadcast.
    pub delivered: usize,
}

struct CoreState {
    registry: DeviceRegistry,
    store: TimeSeriesStore,
    throttler: AlertThrottler,
    settings: SettingsStore,
}

pub struct Telemetry {
    // ---
    state: RwLock<CoreState>,
    fanout: FanoutRouter,
    repository: Option<Arc<dyn TelemetryRepository>>,
    normalizer: NormalizerOptions,
}

/// Score a normalized reading.
pub fn process(reading: Reading) -> ProcessedReading {
    // ---
    let score = scorer::score(&reading);
    ProcessedReading {
        device_id: reading.device_id,
        ts: reading.ts,
        temp: reading.temp,
        hum: reading.hum,
        gas: reading.gas,
        dust: reading.dust,
        index: score.index,
        level: score.level,
    }
}

impl Telemetry {
    // ---
    pub fn new(config: TelemetryConfig) -> Self {
        Telemetry {
            state: RwLock::new(CoreState {
                registry: DeviceRegistry::new(config.online_threshold_secs),
                store: TimeSeriesStore::new(config.history_cap),
                throttler: AlertThrottler::new(config.alert_cap, config.alert_stale_secs),
                settings: SettingsStore::new(),
            }),
            fanout: FanoutRouter::new(),
            repository: None,
            normalizer: config.normalizer,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn TelemetryRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn fanout(&self) -> &FanoutRouter {
        &self.fanout
    }

    /// Run one raw message through the pipeline.
    ///
    /// Rejections are returned for the caller to log and drop; nothing is
    /// retried.
    pub async fn ingest(&self, raw: &Value) -> Result<Ingested, Rejection> {
        // ---
        let reading = normalizer::normalize(raw, self.normalizer)?;
        let processed = process(reading);
        let device_id = processed.device_id.clone();

        let (alert, device, delivered) = {
            let mut state = self.state.write().await;
            state.registry.touch(&device_id, processed.ts);
            state.store.append(processed.clone());
            let alert = state.throttler.observe(&processed);
            let device = state.registry.get(&device_id, now_ts());
            // non-blocking channel pushes only
            let delivered = self.broadcast(&processed);
            (alert, device, delivered)
        };

        debug!(
            "Processed {} ts={} iaq={} level={}",
            device_id,
            processed.ts,
            processed.index,
            processed.level.as_str()
        );
        if let Some(alert) = &alert {
            info!("Alert {} for {}: {}", alert.level.as_str(), device_id, alert.message);
        }

        self.persist_ingested(&processed, device.as_ref(), alert.as_ref())
            .await;

        Ok(Ingested {
            reading: processed,
            alert,
            delivered,
        })
    }

    pub async fn get_devices(&self) -> Vec<Device> {
        self.state.read().await.registry.list(now_ts())
    }

    pub async fn get_device(&self, device_id: &str) -> Option<Device> {
        self.state.read().await.registry.get(device_id, now_ts())
    }

    /// Explicit registration; `name: None` keeps the current name.
    pub async fn register_device(&self, device_id: &str, name: Option<&str>) -> Device {
        // ---
        let device = self
            .state
            .write()
            .await
            .registry
            .upsert(device_id, name, now_ts());
        self.persist_device(&device).await;
        device
    }

    pub async fn rename_device(&self, device_id: &str, name: &str) -> Option<Device> {
        // ---
        let device = self
            .state
            .write()
            .await
            .registry
            .rename(device_id, name, now_ts())?;
        self.persist_device(&device).await;
        Some(device)
    }

    /// Delete a device together with its history, alerts, throttle state and
    /// settings. Returns whether the registry knew it.
    pub async fn remove_device(&self, device_id: &str) -> bool {
        // ---
        let existed = {
            let mut state = self.state.write().await;
            let existed = state.registry.remove(device_id);
            state.store.forget(device_id);
            state.throttler.forget(device_id);
            state.settings.forget(device_id);
            existed
        };
        info!("Removed device {} (known: {})", device_id, existed);

        if let Some(repo) = &self.repository {
            if let Err(e) = repo.delete_device(device_id).await {
                warn!("Failed to delete device {} from storage: {}", device_id, e);
            }
        }
        existed
    }

    /// Latest reading, or a placeholder stamped with the current time.
    pub async fn get_latest(&self, device_id: &str) -> LatestReading {
        // ---
        let latest = self.state.read().await.store.latest(device_id).cloned();
        match latest {
            Some(p) => p.into(),
            None => LatestReading::placeholder(device_id, now_ts()),
        }
    }

    /// Downsampled history in `[from, to]`.
    ///
    /// Served from memory; when memory has nothing in range and a repository
    /// is configured, stored rows are thinned the same way.
    pub async fn get_history(
        &self,
        device_id: &str,
        from: i64,
        to: i64,
        interval: Option<&str>,
    ) -> Vec<ProcessedReading> {
        // ---
        let bucket = store::parse_interval(interval);
        let points = self.state.read().await.store.range(device_id, from, to, bucket);
        if !points.is_empty() {
            return points;
        }

        let Some(repo) = &self.repository else {
            return points;
        };
        match repo.history(device_id, from, to).await {
            Ok(rows) => store::downsample(rows.iter(), bucket),
            Err(e) => {
                warn!("History fallback failed for {}: {}", device_id, e);
                Vec::new()
            }
        }
    }

    pub async fn get_alerts(&self, device_id: &str, from: Option<i64>, to: Option<i64>) -> Vec<AlertItem> {
        self.state.read().await.throttler.alerts(device_id, from, to)
    }

    pub async fn get_settings(&self, device_id: &str) -> ThresholdSettings {
        self.state.read().await.settings.get(device_id)
    }

    pub async fn update_settings(&self, device_id: &str, patch: &SettingsPatch) -> ThresholdSettings {
        // ---
        let settings = self.state.write().await.settings.update(device_id, patch);
        if let Some(repo) = &self.repository {
            if let Err(e) = repo.upsert_settings(&settings).await {
                warn!("Failed to persist settings for {}: {}", device_id, e);
            }
        }
        settings
    }

    fn broadcast(&self, processed: &ProcessedReading) -> usize {
        // ---
        match serde_json::to_string(processed) {
            Ok(payload) => self.fanout.broadcast(&processed.device_id, &payload),
            Err(e) => {
                warn!("Failed to serialize reading for {}: {}", processed.device_id, e);
                0
            }
        }
    }

    /// Mirror one accepted reading into the repository.
    ///
    /// Skipped when the device was removed after the reading was applied, so
    /// a late write cannot recreate rows `remove_device` already deleted. A
    /// removal landing between this check and the writes can still leave
    /// orphan rows behind.
    async fn persist_ingested(
        &self,
        processed: &ProcessedReading,
        device: Option<&Device>,
        alert: Option<&AlertItem>,
    ) {
        // ---
        let Some(repo) = &self.repository else {
            return;
        };
        let device_id = &processed.device_id;
        if !self.state.read().await.registry.contains(device_id) {
            debug!("Device {} removed before persistence, skipping", device_id);
            return;
        }

        if let Some(device) = device {
            if let Err(e) = repo.upsert_device(device).await {
                warn!("Failed to persist device {}: {}", device_id, e);
            }
        }
        if let Err(e) = repo.insert_reading(processed).await {
            warn!("Failed to persist reading for {}: {}", device_id, e);
        }
        if let Some(alert) = alert {
            if let Err(e) = repo.insert_alert(alert).await {
                warn!("Failed to persist alert {}: {}", alert.id, e);
            }
        }
    }

    async fn persist_device(&self, device: &Device) {
        if let Some(repo) = &self.repository {
            if let Err(e) = repo.upsert_device(device).await {
                warn!("Failed to persist device {}: {}", device.device_id, e);
            }
        }
    }
}
