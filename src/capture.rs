//! Analysis of captured hardware CC streams
//!
//! The device reports its modulation output as edge-triggered CC values: a
//! point arrives only when the value changes, on the device's own clock.
//! Everything in here is therefore a tolerant heuristic over an irregularly
//! sampled stream, never an exact reconstruction.

use serde::{Deserialize, Serialize};

/// One observed control-data sample. Read-only once appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPoint {
    /// Source-device timestamp in microseconds. Arrival order over the MIDI
    /// transport is not guaranteed, so analysis sorts on this.
    pub timestamp_us: u64,
    /// 7-bit CC value.
    pub value: u8,
}

/// Per-cycle amplitude derived from one expected-cycle-duration window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleAmplitude {
    pub cycle_index: usize,
    pub min: u8,
    pub max: u8,
    pub amplitude: u8,
}

/// Sort points by device timestamp. Must run before any windowed analysis.
pub fn sort_by_timestamp(points: &mut [CapturedPoint]) {
    points.sort_by_key(|p| p.timestamp_us);
}

/// Observed (min, max) over the whole capture, if anything was captured.
pub fn observed_bounds(points: &[CapturedPoint]) -> Option<(u8, u8)> {
    let first = points.first()?;
    let mut min = first.value;
    let mut max = first.value;
    for p in points {
        min = min.min(p.value);
        max = max.max(p.value);
    }
    Some((min, max))
}

/// Observed peak-to-peak amplitude; 0 for an empty capture.
pub fn observed_amplitude(points: &[CapturedPoint]) -> u8 {
    observed_bounds(points).map(|(min, max)| max - min).unwrap_or(0)
}

/// Partition sorted points into windows of the expected cycle duration and
/// take min/max within each. Windows that caught no points are skipped: an
/// edge-triggered stream goes quiet whenever the value plateaus.
pub fn cycle_amplitudes(points: &[CapturedPoint], cycle_ms: f64) -> Vec<CycleAmplitude> {
    if points.is_empty() || !cycle_ms.is_finite() || cycle_ms <= 0.0 {
        return Vec::new();
    }
    let cycle_us = cycle_ms * 1000.0;
    let start = points[0].timestamp_us;

    let mut out: Vec<CycleAmplitude> = Vec::new();
    for p in points {
        let index = ((p.timestamp_us - start) as f64 / cycle_us) as usize;
        match out.last_mut() {
            Some(win) if win.cycle_index == index => {
                win.min = win.min.min(p.value);
                win.max = win.max.max(p.value);
                win.amplitude = win.max - win.min;
            }
            _ => out.push(CycleAmplitude {
                cycle_index: index,
                min: p.value,
                max: p.value,
                amplitude: 0,
            }),
        }
    }
    out
}

/// Estimate the observed cycle period from rising crossings of the stream's
/// midline. Diagnostic only: CC delivery quantization makes this too noisy
/// to gate a verdict on.
pub fn estimate_period_us(points: &[CapturedPoint]) -> Option<f64> {
    let (min, max) = observed_bounds(points)?;
    if max - min < 4 {
        return None; // too flat to carry cycle structure
    }
    let midline = min as f64 + (max - min) as f64 / 2.0;

    let mut crossings = Vec::new();
    let mut below = points[0].value as f64 <= midline;
    for p in points {
        let above = p.value as f64 > midline;
        if below && above {
            crossings.push(p.timestamp_us);
        }
        below = !above;
    }
    if crossings.len() < 2 {
        return None;
    }
    let span = (crossings[crossings.len() - 1] - crossings[0]) as f64;
    Some(span / (crossings.len() - 1) as f64)
}
