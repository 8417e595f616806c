//! The LFO engine: phase accumulation and the trigger state machine
//!
//! The engine is cooperative: it advances only when the host animation loop
//! calls [`LfoEngine::update`] with a monotonic millisecond timestamp, and it
//! never performs I/O. Given the same config and the same timestamp sequence
//! the output is bit-for-bit reproducible, which is what lets the
//! verification harness use it as the expected-value oracle.

use crate::fade;
use crate::random_step;
use crate::timing::{self, CycleTiming};
use crate::waveform::Waveform;
use serde::{Deserialize, Serialize};

/// How the LFO responds to trigger events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrigMode {
    /// Runs continuously; triggers are ignored.
    Free,
    /// Every trigger restarts the cycle from phase 0.
    Triggered,
    /// Every trigger samples the running waveform and holds that value.
    Hold,
    /// Trigger restarts the cycle; freezes after one full cycle.
    OneShot,
    /// Trigger restarts the cycle; freezes at phase 0.5.
    Half,
}

impl TrigMode {
    pub const ALL: [TrigMode; 5] = [
        TrigMode::Free,
        TrigMode::Triggered,
        TrigMode::Hold,
        TrigMode::OneShot,
        TrigMode::Half,
    ];

    pub fn from_cc(value: u8) -> Self {
        Self::ALL[(value as usize).min(Self::ALL.len() - 1)]
    }

    pub fn to_cc(self) -> u8 {
        Self::ALL.iter().position(|m| *m == self).unwrap_or(0) as u8
    }
}

/// One LFO parameter set. Immutable per engine: changing a parameter means
/// constructing a fresh engine, never mutating a live one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LfoConfig {
    pub waveform: Waveform,
    /// Signed rate, -64.00..+63.99. Sign sets direction only.
    pub speed: f64,
    /// One of the hardware's discrete multipliers (1..2048).
    pub multiplier: u32,
    /// Modulation amount, -64..+63. Negative inverts.
    pub depth: i32,
    /// Negative fades in, positive fades out, 0 disables.
    pub fade: i32,
    /// Phase offset in 0..=127, mapped to 0..~1 turns at sample time.
    pub start_phase: u8,
    pub mode: TrigMode,
    /// Slew for the RANDOM shape, 0..=127. 0 is plain sample-and-hold.
    #[serde(default)]
    pub slew: u8,
    /// Seed for the RANDOM shape.
    #[serde(default)]
    pub seed: u32,
}

impl LfoConfig {
    /// A sine in FREE mode at one bar per cycle; the fields are meant to be
    /// overridden struct-update style.
    pub fn default_free() -> Self {
        Self {
            waveform: Waveform::Sine,
            speed: 8.0,
            multiplier: 16,
            depth: 63,
            fade: 0,
            start_phase: 0,
            mode: TrigMode::Free,
            slew: 0,
            seed: 0,
        }
    }

    /// Clamp every field into hardware range. Out-of-range input is always
    /// folded back in, never rejected: this is a live-tunable simulation.
    pub fn normalized(mut self) -> Self {
        self.speed = self.speed.clamp(-64.0, 63.99);
        self.multiplier = timing::clamp_multiplier(self.multiplier);
        self.depth = self.depth.clamp(fade::DEPTH_MIN, fade::DEPTH_MAX);
        self.fade = self.fade.clamp(fade::FADE_MIN, fade::FADE_MAX);
        self.start_phase = self.start_phase.min(127);
        self.slew = self.slew.min(127);
        self
    }
}

/// One update's result.
///
/// `output` is the raw waveform value (pre-depth, pre-fade); `level` is what
/// consumers modulate with, after depth and fade scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LfoSample {
    /// Unshifted cycle position in [0, 1).
    pub phase: f64,
    pub output: f64,
    pub level: f64,
}

/// Mutable engine state, owned exclusively by one [`LfoEngine`].
#[derive(Debug, Clone)]
struct EngineState {
    phase: f64,
    last_update: Option<f64>,
    /// Fractional cycles traversed since construction. Monotone: direction
    /// never subtracts from it.
    cycles: f64,
    /// `cycles` at the last trigger; cycles-since-trigger and fade progress
    /// both anchor here.
    fade_anchor: f64,
    running: bool,
    /// ONE_SHOT/HALF completion latch.
    frozen: bool,
    /// Cached waveform value for HOLD mode.
    held_output: f64,
}

/// Phase engine plus trigger state machine for one parameter set.
pub struct LfoEngine {
    config: LfoConfig,
    bpm: u32,
    cycle_ms: f64,
    state: EngineState,
}

impl LfoEngine {
    pub fn new(config: LfoConfig, bpm: u32) -> Self {
        let config = config.normalized();
        let bpm = timing::clamp_bpm(bpm);
        let cycle_ms = timing::cycle_timing(config.speed, config.multiplier, bpm).ms;

        // ONE_SHOT and HALF wait for their first trigger; the rest run from
        // construction.
        let frozen = matches!(config.mode, TrigMode::OneShot | TrigMode::Half);
        let held_output = raw_output(&config, 0.0);

        Self {
            config,
            bpm,
            cycle_ms,
            state: EngineState {
                phase: 0.0,
                last_update: None,
                cycles: 0.0,
                fade_anchor: 0.0,
                running: true,
                frozen,
                held_output,
            },
        }
    }

    pub fn config(&self) -> &LfoConfig {
        &self.config
    }

    /// Timing descriptor for the UI timing display.
    pub fn timing(&self) -> CycleTiming {
        timing::cycle_timing(self.config.speed, self.config.multiplier, self.bpm)
    }

    /// Fractional cycles elapsed since the last trigger.
    pub fn cycles_since_trigger(&self) -> f64 {
        self.state.cycles - self.state.fade_anchor
    }

    /// Whole cycles completed since the last trigger.
    pub fn cycle_count(&self) -> u64 {
        self.cycles_since_trigger() as u64
    }

    /// Whether the engine is advancing at all.
    pub fn is_running(&self) -> bool {
        self.state.running && !self.state.frozen
    }

    /// Resume advancing. Orthogonal to trigger handling.
    pub fn start(&mut self) {
        self.state.running = true;
    }

    /// Pause without losing phase.
    pub fn stop(&mut self) {
        self.state.running = false;
    }

    /// Deliver a trigger event.
    ///
    /// Phase, cycle anchor, and fade anchor reset in one call, so a caller
    /// reading between updates never observes a half-reset engine.
    pub fn trigger(&mut self) {
        match self.config.mode {
            TrigMode::Free => {}
            TrigMode::Triggered | TrigMode::OneShot | TrigMode::Half => {
                self.state.phase = 0.0;
                self.state.fade_anchor = self.state.cycles;
                self.state.frozen = false;
            }
            TrigMode::Hold => {
                self.state.held_output = raw_output(&self.config, self.state.phase);
                self.state.fade_anchor = self.state.cycles;
            }
        }
    }

    /// Advance to `now_ms` and return the new sample.
    ///
    /// The first call after construction establishes the clock reference and
    /// returns zero advance. A paused or frozen engine still consumes the
    /// timestamp so that resuming does not replay the gap as one huge delta.
    pub fn update(&mut self, now_ms: f64) -> LfoSample {
        let delta_ms = match self.state.last_update {
            None => 0.0,
            Some(prev) => now_ms - prev,
        };
        self.state.last_update = Some(now_ms);

        if self.is_running() && delta_ms != 0.0 && self.cycle_ms.is_finite() {
            let advance = delta_ms / self.cycle_ms;
            let signed = advance * self.config.speed.signum();
            self.state.phase = (self.state.phase + signed).rem_euclid(1.0);
            self.state.cycles += advance.abs();

            match self.config.mode {
                TrigMode::OneShot if self.cycles_since_trigger() >= 1.0 => {
                    self.state.frozen = true;
                }
                TrigMode::Half if self.cycles_since_trigger() >= 0.5 => {
                    self.state.frozen = true;
                }
                _ => {}
            }
        }

        self.sample()
    }

    /// Current sample without advancing. Reads are only valid between
    /// updates (single-writer contract).
    pub fn sample(&self) -> LfoSample {
        let output = match self.config.mode {
            TrigMode::Hold => self.state.held_output,
            _ => raw_output(&self.config, self.state.phase),
        };
        let level = fade::apply(
            output,
            self.config.depth,
            self.config.fade,
            self.config.mode != TrigMode::Free,
            self.cycles_since_trigger(),
        );
        LfoSample {
            phase: self.state.phase,
            output,
            level,
        }
    }
}

// Sampler invocation with the start-phase offset applied. The engine's own
// phase stays unshifted for display/step purposes.
fn raw_output(config: &LfoConfig, phase: f64) -> f64 {
    let shifted = (phase + config.start_phase as f64 / 128.0).rem_euclid(1.0);
    if config.waveform == Waveform::Random && config.slew > 0 {
        random_step::sample_with_slew(shifted, config.slew, config.seed)
    } else {
        config.waveform.sample(shifted, config.seed)
    }
}

/// Run the engine offline at a fixed frame rate, firing triggers at the
/// given times. One canonical simulation path: the CLI preview and the
/// harness's expected model both go through here.
pub fn simulate(
    config: &LfoConfig,
    bpm: u32,
    duration_ms: f64,
    fps: f64,
    trigger_times_ms: &[f64],
) -> Vec<LfoSample> {
    let mut engine = LfoEngine::new(config.clone(), bpm);
    let frame_ms = 1000.0 / fps.max(1.0);
    let mut samples = Vec::new();
    let mut next_trigger = 0;

    let mut t = 0.0;
    while t <= duration_ms {
        while next_trigger < trigger_times_ms.len() && trigger_times_ms[next_trigger] <= t {
            engine.trigger();
            next_trigger += 1;
        }
        samples.push(engine.update(t));
        t += frame_ms;
    }
    samples
}
