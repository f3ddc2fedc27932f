//! Air-quality scoring.
//!
//! Each sensor channel is mapped onto a 0–100 goodness score (100 = ideal)
//! by a fixed global curve, and the combined index is the worst of the four.
//! Missing channels are scored at a neutral value so a partial reading still
//! gets an index.

use crate::models::{Level, Reading};

// ---

const TEMP_CURVE: (f64, f64, f64, f64) = (16.0, 22.0, 26.0, 32.0);
const HUM_CURVE: (f64, f64, f64, f64) = (30.0, 40.0, 60.0, 70.0);
/// mg/m³
const DUST_CURVE: (f64, f64) = (0.03, 0.15);
/// ppm
const GAS_CURVE: (f64, f64) = (200.0, 1000.0);

const TEMP_NEUTRAL: f64 = 24.0;
const HUM_NEUTRAL: f64 = 50.0;
const DUST_NEUTRAL: f64 = 0.0;
const GAS_NEUTRAL: f64 = 0.0;

pub const SAFE_MIN_INDEX: u8 = 80;
pub const WARN_MIN_INDEX: u8 = 60;

/// Result of scoring one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub index: u8,
    pub level: Level,
}

fn clamp100(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// One-sided decreasing goodness: 100 at or below `good`, 0 at or above
/// `bad`, linear in between.
///
/// # Panics
/// If `good >= bad`. Curve parameters are compile-time constants, so this is
/// a programming error rather than bad data.
pub fn decreasing_one_sided(x: f64, good: f64, bad: f64) -> f64 {
    // ---
    assert!(good < bad, "invalid curve: require good < bad ({good} >= {bad})");

    if x <= good {
        100.0
    } else if x < bad {
        clamp100(100.0 * (bad - x) / (bad - good))
    } else {
        0.0
    }
}

/// Two-sided trapezoid goodness: 0 outside `(a, d)`, 100 on `[b, c]`,
/// linear ramps on `(a, b)` and `(c, d)`.
///
/// # Panics
/// Unless `a < b <= c < d`.
pub fn trapezoid(x: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    // ---
    assert!(
        a < b && b <= c && c < d,
        "invalid trapezoid: require a < b <= c < d (got {a}, {b}, {c}, {d})"
    );

    if x <= a {
        0.0
    } else if x < b {
        clamp100(100.0 * (x - a) / (b - a))
    } else if x <= c {
        100.0
    } else if x < d {
        clamp100(100.0 * (d - x) / (d - c))
    } else {
        0.0
    }
}

pub fn score_temp_c(temp_c: f64) -> f64 {
    let (a, b, c, d) = TEMP_CURVE;
    trapezoid(temp_c, a, b, c, d)
}

pub fn score_humidity_pct(rh: f64) -> f64 {
    let (a, b, c, d) = HUM_CURVE;
    trapezoid(rh, a, b, c, d)
}

pub fn score_dust_mg_m3(dust: f64) -> f64 {
    decreasing_one_sided(dust, DUST_CURVE.0, DUST_CURVE.1)
}

pub fn score_gas_ppm(gas: f64) -> f64 {
    decreasing_one_sided(gas, GAS_CURVE.0, GAS_CURVE.1)
}

/// The four sub-scores in `[temp, hum, dust, gas]` order, neutral defaults
/// substituted for missing channels.
pub fn sub_scores(reading: &Reading) -> [f64; 4] {
    // ---
    [
        score_temp_c(reading.temp.unwrap_or(TEMP_NEUTRAL)),
        score_humidity_pct(reading.hum.unwrap_or(HUM_NEUTRAL)),
        score_dust_mg_m3(reading.dust.unwrap_or(DUST_NEUTRAL)),
        score_gas_ppm(reading.gas.unwrap_or(GAS_NEUTRAL)),
    ]
}

pub fn level_for(index: u8) -> Level {
    if index >= SAFE_MIN_INDEX {
        Level::Safe
    } else if index >= WARN_MIN_INDEX {
        Level::Warn
    } else {
        Level::Danger
    }
}

/// Score a reading: index is the floor of the worst sub-score.
pub fn score(reading: &Reading) -> Score {
    // ---
    let worst = sub_scores(reading)
        .into_iter()
        .fold(100.0_f64, f64::min);
    let index = clamp100(worst).floor() as u8;

    Score {
        index,
        level: level_for(index),
    }
}
