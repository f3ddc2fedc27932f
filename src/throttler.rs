//! Alert derivation from severity transitions.
//!
//! Per device we remember only the last emitted alert and whether the device
//! has been back to SAFE since. A WARN/DANGER reading emits when the level
//! changed, the device recovered in between, or the last alert went stale.
//! Repeats of the same level inside the staleness window are suppressed.

use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

use crate::models::{AlertItem, Level, ProcessedReading};

// ---

pub const DEFAULT_ALERT_CAP: usize = 500;
pub const DEFAULT_STALE_SECS: i64 = 60;

const WARN_MESSAGE: &str = "Air quality has reached the warning level";
const DANGER_MESSAGE: &str = "Air quality is dangerous!";

#[derive(Debug, Clone, PartialEq)]
pub struct LastAlert {
    pub id: Uuid,
    pub ts: i64,
    pub level: Level,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThrottleState {
    // ---
    pub last: Option<LastAlert>,
    /// Set by a SAFE reading after the last alert.
    pub recovered: bool,
}

/// Pure emit decision for one reading.
pub fn should_emit(state: &ThrottleState, level: Level, ts: i64, stale_secs: i64) -> bool {
    // ---
    if level == Level::Safe {
        return false;
    }
    match &state.last {
        None => true,
        Some(_) if state.recovered => true,
        Some(prior) => prior.level != level || ts.saturating_sub(prior.ts) > stale_secs,
    }
}

pub fn message_for(level: Level) -> &'static str {
    match level {
        Level::Danger => DANGER_MESSAGE,
        _ => WARN_MESSAGE,
    }
}

#[derive(Debug)]
pub struct AlertThrottler {
    // ---
    states: HashMap<String, ThrottleState>,
    /// Newest first.
    alerts: HashMap<String, VecDeque<AlertItem>>,
    cap: usize,
    stale_secs: i64,
}

impl AlertThrottler {
    // ---
    pub fn new(cap: usize, stale_secs: i64) -> Self {
        AlertThrottler {
            states: HashMap::new(),
            alerts: HashMap::new(),
            cap: cap.max(1),
            stale_secs,
        }
    }

    /// Feed one processed reading; returns the alert if one was emitted.
    pub fn observe(&mut self, reading: &ProcessedReading) -> Option<AlertItem> {
        // ---
        let state = self.states.entry(reading.device_id.clone()).or_default();

        if reading.level == Level::Safe {
            if state.last.is_some() {
                state.recovered = true;
            }
            return None;
        }
        if !should_emit(state, reading.level, reading.ts, self.stale_secs) {
            return None;
        }

        let alert = AlertItem {
            id: Uuid::new_v4(),
            device_id: reading.device_id.clone(),
            ts: reading.ts,
            value: i32::from(reading.index),
            level: reading.level,
            message: message_for(reading.level).to_string(),
        };
        *state = ThrottleState {
            last: Some(LastAlert {
                id: alert.id,
                ts: alert.ts,
                level: alert.level,
            }),
            recovered: false,
        };

        let list = self.alerts.entry(reading.device_id.clone()).or_default();
        list.push_front(alert.clone());
        list.truncate(self.cap);

        Some(alert)
    }

    pub fn state(&self, device_id: &str) -> Option<&ThrottleState> {
        self.states.get(device_id)
    }

    /// Alerts with `from <= ts <= to` (either bound optional), newest first.
    pub fn alerts(&self, device_id: &str, from: Option<i64>, to: Option<i64>) -> Vec<AlertItem> {
        // ---
        let Some(list) = self.alerts.get(device_id) else {
            return Vec::new();
        };
        list.iter()
            .filter(|a| from.map_or(true, |f| a.ts >= f) && to.map_or(true, |t| a.ts <= t))
            .cloned()
            .collect()
    }

    pub fn forget(&mut self, device_id: &str) {
        self.states.remove(device_id);
        self.alerts.remove(device_id);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn create_test_processed(ts: i64, level: Level) -> ProcessedReading {
        // ---
        let index = match level {
            Level::Safe => 90,
            Level::Warn => 70,
            Level::Danger => 30,
        };
        ProcessedReading {
            device_id: "d1".to_string(),
            ts,
            temp: None,
            hum: None,
            gas: None,
            dust: None,
            index,
            level,
        }
    }

    fn feed(throttler: &mut AlertThrottler, seq: &[(i64, Level)]) -> usize {
        seq.iter()
            .filter_map(|&(ts, level)| throttler.observe(&create_test_processed(ts, level)))
            .count()
    }

    #[test]
    fn test_should_emit_without_prior() {
        // ---
        let state = ThrottleState::default();
        assert!(should_emit(&state, Level::Warn, 0, 60));
        assert!(should_emit(&state, Level::Danger, 0, 60));
        assert!(!should_emit(&state, Level::Safe, 0, 60));
    }

    #[test]
    fn test_should_emit_with_prior() {
        // ---
        let state = ThrottleState {
            last: Some(LastAlert {
                id: Uuid::new_v4(),
                ts: 100,
                level: Level::Warn,
            }),
            recovered: false,
        };
        assert!(!should_emit(&state, Level::Warn, 160, 60));
        assert!(should_emit(&state, Level::Warn, 161, 60));
        assert!(should_emit(&state, Level::Danger, 101, 60));

        let recovered = ThrottleState {
            recovered: true,
            ..state
        };
        assert!(should_emit(&recovered, Level::Warn, 101, 60));
    }

    #[test]
    fn test_should_emit_survives_extreme_timestamps() {
        // ---
        let at = |ts| ThrottleState {
            last: Some(LastAlert {
                id: Uuid::new_v4(),
                ts,
                level: Level::Danger,
            }),
            recovered: false,
        };
        assert!(!should_emit(&at(i64::MAX), Level::Danger, i64::MIN, 60));
        assert!(should_emit(&at(i64::MIN), Level::Danger, i64::MAX, 60));
    }

    #[test]
    fn test_repeated_warn_within_window_emits_once() {
        // ---
        let mut t = AlertThrottler::new(DEFAULT_ALERT_CAP, DEFAULT_STALE_SECS);
        let emitted = feed(&mut t, &[(0, Level::Warn), (10, Level::Warn), (20, Level::Warn)]);
        assert_eq!(emitted, 1);
    }

    #[test]
    fn test_safe_in_between_rearms() {
        // ---
        let mut t = AlertThrottler::new(DEFAULT_ALERT_CAP, DEFAULT_STALE_SECS);
        let emitted = feed(&mut t, &[(0, Level::Warn), (10, Level::Safe), (20, Level::Warn)]);
        assert_eq!(emitted, 2);
    }

    #[test]
    fn test_safe_leaves_last_alert_untouched() {
        // ---
        let mut t = AlertThrottler::new(DEFAULT_ALERT_CAP, DEFAULT_STALE_SECS);
        feed(&mut t, &[(0, Level::Danger)]);
        let before = t.state("d1").unwrap().last.clone();

        feed(&mut t, &[(5, Level::Safe)]);
        assert_eq!(t.state("d1").unwrap().last, before);
        assert!(t.state("d1").unwrap().recovered);
    }

    #[test]
    fn test_oscillation_emits_on_every_change() {
        // ---
        let mut t = AlertThrottler::new(DEFAULT_ALERT_CAP, DEFAULT_STALE_SECS);
        let emitted = feed(
            &mut t,
            &[
                (0, Level::Warn),
                (5, Level::Danger),
                (10, Level::Warn),
                (15, Level::Warn),
                (20, Level::Danger),
                (25, Level::Danger),
            ],
        );
        assert_eq!(emitted, 4);
    }

    #[test]
    fn test_stale_alert_reemits() {
        // ---
        let mut t = AlertThrottler::new(DEFAULT_ALERT_CAP, DEFAULT_STALE_SECS);
        let emitted = feed(
            &mut t,
            &[(0, Level::Warn), (60, Level::Warn), (61, Level::Warn), (100, Level::Warn)],
        );
        assert_eq!(emitted, 2);
    }

    #[test]
    fn test_alert_fields() {
        // ---
        let mut t = AlertThrottler::new(DEFAULT_ALERT_CAP, DEFAULT_STALE_SECS);
        let alert = t.observe(&create_test_processed(42, Level::Danger)).unwrap();

        assert_eq!(alert.device_id, "d1");
        assert_eq!(alert.ts, 42);
        assert_eq!(alert.value, 30);
        assert_eq!(alert.level, Level::Danger);
        assert_eq!(alert.message, DANGER_MESSAGE);
        assert_eq!(t.state("d1").unwrap().last.as_ref().unwrap().id, alert.id);
    }

    #[test]
    fn test_list_is_newest_first_and_capped() {
        // ---
        let mut t = AlertThrottler::new(5, DEFAULT_STALE_SECS);
        for i in 0..12 {
            feed(&mut t, &[(i * 100, Level::Warn)]);
        }

        let list = t.alerts("d1", None, None);
        assert_eq!(list.len(), 5);
        let ts: Vec<i64> = list.iter().map(|a| a.ts).collect();
        assert_eq!(ts, vec![1100, 1000, 900, 800, 700]);
    }

    #[test]
    fn test_alerts_filter_bounds() {
        // ---
        let mut t = AlertThrottler::new(DEFAULT_ALERT_CAP, DEFAULT_STALE_SECS);
        for i in 0..5 {
            feed(&mut t, &[(i * 100, Level::Warn)]);
        }

        assert_eq!(t.alerts("d1", Some(100), Some(300)).len(), 3);
        assert_eq!(t.alerts("d1", Some(250), None).len(), 2);
        assert_eq!(t.alerts("d1", None, Some(0)).len(), 1);
        assert!(t.alerts("d2", None, None).is_empty());
    }

    #[test]
    fn test_forget_resets_state() {
        // ---
        let mut t = AlertThrottler::new(DEFAULT_ALERT_CAP, DEFAULT_STALE_SECS);
        feed(&mut t, &[(0, Level::Warn)]);
        t.forget("d1");

        assert!(t.state("d1").is_none());
        assert!(t.alerts("d1", None, None).is_empty());
        assert_eq!(feed(&mut t, &[(1, Level::Warn)]), 1);
    }
}
