//! Waveform sampler for the LFO engine
//!
//! Pure phase-to-value mapping for the seven LFO shapes. Everything here is
//! side-effect free so the same functions serve the live engine, the offline
//! preview, and the expected-value model used by the verification harness.

use crate::random_step;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// LFO waveform shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Triangle,
    Sine,
    Square,
    Sawtooth,
    Exponential,
    Ramp,
    Random,
}

impl Waveform {
    /// All shapes, in the order the hardware enumerates them (CC value 0-6).
    pub const ALL: [Waveform; 7] = [
        Waveform::Triangle,
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Exponential,
        Waveform::Ramp,
        Waveform::Random,
    ];

    /// Map a 7-bit CC value to a shape, clamping out-of-range values to the
    /// last shape (the hardware does the same).
    pub fn from_cc(value: u8) -> Self {
        Self::ALL[(value as usize).min(Self::ALL.len() - 1)]
    }

    /// CC value for this shape
    pub fn to_cc(self) -> u8 {
        Self::ALL.iter().position(|w| *w == self).unwrap_or(0) as u8
    }

    /// Unipolar shapes output in [0, 1]; everything else is bipolar [-1, 1].
    pub fn is_unipolar(self) -> bool {
        matches!(self, Waveform::Exponential | Waveform::Ramp)
    }

    /// Sample this shape at `phase` in [0, 1]. Total: defined and finite for
    /// every in-range phase including both endpoints. `seed` only affects
    /// [`Waveform::Random`].
    pub fn sample(self, phase: f64, seed: u32) -> f64 {
        let phase = phase.clamp(0.0, 1.0);
        match self {
            Waveform::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            // Ascending ramp -1..+1; see DESIGN.md on the direction decision.
            Waveform::Sawtooth => -1.0 + 2.0 * phase,
            // Fast initial drop, slow tail; k = 4 matches the hardware curve.
            Waveform::Exponential => {
                const K: f64 = 4.0;
                ((K * (1.0 - phase)).exp() - 1.0) / (K.exp() - 1.0)
            }
            Waveform::Ramp => phase,
            Waveform::Random => random_step::sample(phase, seed),
        }
    }
}
