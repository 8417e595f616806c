//! Cycle timing for the LFO engine
//!
//! Maps (speed, multiplier, tempo) to a cycle duration in milliseconds plus
//! the musical note-length label the hardware shows on its timing page. The
//! reference point is `|speed| * multiplier = 128` = exactly one bar.

use serde::{Deserialize, Serialize};

/// Multiplier values the hardware offers.
pub const MULTIPLIERS: [u32; 12] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048];

/// Tempo limits of the sequencer.
pub const BPM_MIN: u32 = 20;
pub const BPM_MAX: u32 = 300;

/// One cycle's timing, as shown on the hardware's timing display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleTiming {
    /// Cycle duration in milliseconds; `f64::INFINITY` for a frozen LFO.
    pub ms: f64,
    /// Musical note-length label, e.g. "1/16", "4 bars", "inf".
    pub note_label: String,
    /// Cycle length in 1/16 notes.
    pub steps: f64,
}

/// Snap an arbitrary multiplier to the nearest value the hardware offers.
pub fn clamp_multiplier(raw: u32) -> u32 {
    *MULTIPLIERS
        .iter()
        .min_by_key(|m| m.abs_diff(raw))
        .unwrap_or(&1)
}

pub fn clamp_bpm(bpm: u32) -> u32 {
    bpm.clamp(BPM_MIN, BPM_MAX)
}

/// Compute the cycle duration for a parameter set.
///
/// Negative speed reverses the LFO's direction but never its rate, so the
/// duration always uses `|speed|`. A zero product (speed 0) freezes the LFO:
/// the cycle is infinite and callers must tolerate that.
pub fn cycle_timing(speed: f64, multiplier: u32, bpm: u32) -> CycleTiming {
    let bpm = clamp_bpm(bpm) as f64;
    let product = speed.abs() * clamp_multiplier(multiplier) as f64;
    let sixteenth_ms = 60_000.0 / bpm / 4.0;

    if product == 0.0 {
        return CycleTiming {
            ms: f64::INFINITY,
            note_label: "inf".to_string(),
            steps: f64::INFINITY,
        };
    }

    // product = 128 is one whole note; scale linearly from there.
    let whole_note_ms = (60_000.0 / bpm) * 4.0;
    let ms = whole_note_ms * 128.0 / product;
    let steps = ms / sixteenth_ms;

    let note_label = if product >= 128.0 {
        format!("1/{}", format_ratio(product / 128.0))
    } else {
        let bars = 128.0 / product;
        if (bars - 1.0).abs() < 1e-9 {
            "1 bar".to_string()
        } else {
            format!("{} bars", format_ratio(bars))
        }
    };

    CycleTiming { ms, note_label, steps }
}

// Whole numbers print bare, anything else with two decimals. Speed is a
// continuous parameter so fractional ratios are common.
fn format_ratio(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as u64)
    } else {
        format!("{:.2}", value)
    }
}
