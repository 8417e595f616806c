//! # Lfolab - Groovebox LFO Simulation and Verification
//!
//! Lfolab models the LFO subsystem of a hardware groovebox: cycle timing
//! against the sequencer tempo, the seven waveform shapes, the five trigger
//! modes, and the depth/fade scaling, all reproduced from empirical
//! measurement of the real device rather than any published documentation.
//! The same model doubles as the expected-value oracle for a MIDI verification
//! harness that drives the actual hardware and statistically compares its
//! CC output stream against the simulation.
//!
//! ## Core Pieces
//!
//! - [`waveform`] - pure phase-to-value sampling for the seven shapes
//! - [`random_step`] - deterministic sample-and-hold behind the RANDOM shape
//! - [`timing`] - (speed, multiplier, bpm) to cycle duration and note label
//! - [`engine`] - phase accumulation over wall-clock time plus the trigger
//!   state machine (FREE / TRIGGERED / HOLD / ONE_SHOT / HALF)
//! - [`fade`] - depth normalization and the empirical fade envelope
//! - [`cell`] - single-writer observation cell for fan-out to consumers
//! - [`midi_link`], [`capture`], [`verify`], [`harness`] - the hardware
//!   verification stack
//!
//! ## Quick Start
//!
//! ```rust
//! use lfolab::engine::{LfoConfig, LfoEngine, TrigMode};
//! use lfolab::waveform::Waveform;
//!
//! // Triangle LFO, one cycle per 4000 ms at 120 bpm, restarted on trigger
//! let config = LfoConfig {
//!     waveform: Waveform::Triangle,
//!     speed: 16.0,
//!     multiplier: 4,
//!     depth: 40,
//!     mode: TrigMode::Triggered,
//!     ..LfoConfig::default_free()
//! };
//! let mut engine = LfoEngine::new(config, 120);
//!
//! // Drive it from an animation loop; timestamps are milliseconds
//! engine.update(0.0);
//! let sample = engine.update(1000.0);
//! assert!((sample.phase - 0.25).abs() < 1e-6);
//!
//! // A trigger resets the cycle
//! engine.trigger();
//! assert_eq!(engine.sample().phase, 0.0);
//! ```
//!
//! ## Driving Consumers
//!
//! One engine feeds many readers (renderer, audio mapper, timing display)
//! through [`cell::LfoCell`]: the update loop publishes each sample, readers
//! hold cloneable handles and load lock-free snapshots.
//!
//! ## Verifying Against Hardware
//!
//! ```no_run
//! use lfolab::{harness, verify};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = harness::HarnessSettings {
//!     out_device: "Groovebox".to_string(),
//!     in_device: "Groovebox".to_string(),
//!     ..Default::default()
//! };
//! let suite = harness::run_suite(&settings, &verify::default_suite()).await?;
//! println!("{} passed, {} failed", suite.passed, suite.failed);
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod cell;
pub mod engine;
pub mod fade;
pub mod harness;
pub mod midi_link;
pub mod plan;
pub mod random_step;
pub mod timing;
pub mod verify;
pub mod waveform;
