//! Bounded per-device time series.
//!
//! Each device keeps its most recent processed reading plus a FIFO history
//! capped at a fixed length. History is kept in arrival order; out-of-order
//! timestamps are stored as received and never re-sorted, so range queries
//! filter rather than binary-search.

use std::collections::{HashMap, VecDeque};

use crate::models::ProcessedReading;

// ---

pub const DEFAULT_HISTORY_CAP: usize = 5000;
pub const DEFAULT_BUCKET_SECS: i64 = 60;

#[derive(Debug)]
pub struct TimeSeriesStore {
    // ---
    latest: HashMap<String, ProcessedReading>,
    history: HashMap<String, VecDeque<ProcessedReading>>,
    cap: usize,
}

impl TimeSeriesStore {
    // ---
    pub fn new(cap: usize) -> Self {
        TimeSeriesStore {
            latest: HashMap::new(),
            history: HashMap::new(),
            cap: cap.max(1),
        }
    }

    /// Set as latest and push onto history, evicting the oldest surplus.
    pub fn append(&mut self, reading: ProcessedReading) {
        // ---
        let series = self.history.entry(reading.device_id.clone()).or_default();
        series.push_back(reading.clone());
        if series.len() > self.cap {
            let surplus = series.len() - self.cap;
            series.drain(..surplus);
        }
        self.latest.insert(reading.device_id.clone(), reading);
    }

    pub fn latest(&self, device_id: &str) -> Option<&ProcessedReading> {
        self.latest.get(device_id)
    }

    pub fn len(&self, device_id: &str) -> usize {
        self.history.get(device_id).map_or(0, VecDeque::len)
    }

    /// Readings with `from <= ts <= to`, thinned to one point per bucket.
    pub fn range(&self, device_id: &str, from: i64, to: i64, bucket_secs: i64) -> Vec<ProcessedReading> {
        // ---
        let Some(series) = self.history.get(device_id) else {
            return Vec::new();
        };
        downsample(
            series.iter().filter(|p| p.ts >= from && p.ts <= to),
            bucket_secs,
        )
    }

    pub fn forget(&mut self, device_id: &str) {
        self.latest.remove(device_id);
        self.history.remove(device_id);
    }
}

/// Keep the first point of every active window.
///
/// Walks `points` in the given order and emits one whenever it is at least
/// `bucket_secs` past the last *emitted* point. Nothing is averaged or
/// interpolated.
pub fn downsample<'a, I>(points: I, bucket_secs: i64) -> Vec<ProcessedReading>
where
    I: IntoIterator<Item = &'a ProcessedReading>,
{
    // ---
    let mut out = Vec::new();
    let mut last_emitted: Option<i64> = None;
    for p in points {
        let due = match last_emitted {
            None => true,
            Some(prev) => p.ts.saturating_sub(prev) >= bucket_secs,
        };
        if due {
            last_emitted = Some(p.ts);
            out.push(p.clone());
        }
    }
    out
}

/// Parse `<integer><unit>` with unit in `ms`, `s`, `m`, `h` into whole
/// seconds. Sub-second intervals round down to 1s. Absent or unparseable
/// input gives 60.
pub fn parse_interval(interval: Option<&str>) -> i64 {
    // ---
    let Some(raw) = interval.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_BUCKET_SECS;
    };
    let lower = raw.to_ascii_lowercase();
    let split = lower
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(lower.len());
    let (digits, unit) = lower.split_at(split);

    let Ok(value) = digits.parse::<i64>() else {
        return DEFAULT_BUCKET_SECS;
    };
    match unit {
        "ms" => (value / 1000).max(1),
        "s" => value,
        "m" => value.saturating_mul(60),
        "h" => value.saturating_mul(3600),
        _ => DEFAULT_BUCKET_SECS,
    }
}
