//! Lfolab CLI - simulate the groovebox LFO or verify it against hardware

use clap::{Parser, Subcommand};
use lfolab::engine::{self, LfoConfig, TrigMode};
use lfolab::harness::{self, HarnessSettings};
use lfolab::midi_link::{CaptureIn, ControlOut};
use lfolab::plan::Plan;
use lfolab::timing;
use lfolab::verify;
use lfolab::waveform::Waveform;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lfolab")]
#[command(about = "Groovebox LFO simulation engine and hardware verification harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available MIDI input and output devices
    Devices,

    /// Print the cycle timing for a parameter set
    Timing {
        /// Signed speed, -64.00..63.99
        #[arg(short, long, default_value = "8.0", allow_hyphen_values = true)]
        speed: f64,

        /// Multiplier (1, 2, 4, ... 2048)
        #[arg(short, long, default_value = "16")]
        multiplier: u32,

        /// Tempo in bpm (20-300)
        #[arg(short, long, default_value = "120")]
        bpm: u32,
    },

    /// Run the offline simulation and print per-frame samples
    Sim {
        /// Waveform: triangle, sine, square, sawtooth, exponential, ramp, random
        #[arg(short, long, default_value = "sine")]
        waveform: String,

        /// Signed speed, -64.00..63.99
        #[arg(short, long, default_value = "8.0", allow_hyphen_values = true)]
        speed: f64,

        /// Multiplier (1, 2, 4, ... 2048)
        #[arg(short, long, default_value = "16")]
        multiplier: u32,

        /// Depth, -64..63
        #[arg(short, long, default_value = "63", allow_hyphen_values = true)]
        depth: i32,

        /// Fade, -64..63 (negative fades in, positive fades out)
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        fade: i32,

        /// Start phase, 0..127
        #[arg(long, default_value = "0")]
        start_phase: u8,

        /// Trigger mode: free, triggered, hold, one_shot, half
        #[arg(long, default_value = "triggered")]
        mode: String,

        /// Tempo in bpm (20-300)
        #[arg(short, long, default_value = "120")]
        bpm: u32,

        /// Simulated duration in milliseconds
        #[arg(long, default_value = "4000")]
        duration: f64,

        /// Frames per second of the update loop
        #[arg(long, default_value = "60")]
        fps: f64,
    },

    /// Run the hardware verification suite
    Verify {
        /// MIDI output device (substring match)
        #[arg(short, long)]
        device: Option<String>,

        /// MIDI input device; defaults to the output device
        #[arg(short, long)]
        in_device: Option<String>,

        /// Tempo in bpm (20-300)
        #[arg(short, long)]
        bpm: Option<u32>,

        /// MIDI channel, 0-based
        #[arg(short, long)]
        channel: Option<u8>,

        /// CC number the device's modulation output is tapped to
        #[arg(long)]
        watch_cc: Option<u8>,

        /// Settle delay after each config push, in milliseconds
        #[arg(long)]
        settle: Option<u64>,

        /// TOML test plan
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Only run built-in tests whose name contains this (repeatable)
        #[arg(short, long)]
        only: Vec<String>,

        /// Write the structured suite report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => {
            println!("MIDI output devices:");
            for device in ControlOut::list_devices()? {
                println!("  - {}", device.name);
            }
            println!("MIDI input devices:");
            for device in CaptureIn::list_devices()? {
                println!("  - {}", device.name);
            }
        }

        Commands::Timing { speed, multiplier, bpm } => {
            let t = timing::cycle_timing(speed, multiplier, bpm);
            if t.ms.is_finite() {
                println!("cycle: {:.2} ms  ({}, {:.2} steps)", t.ms, t.note_label, t.steps);
            } else {
                println!("cycle: infinite (LFO frozen)");
            }
        }

        Commands::Sim {
            waveform,
            speed,
            multiplier,
            depth,
            fade,
            start_phase,
            mode,
            bpm,
            duration,
            fps,
        } => {
            let config = LfoConfig {
                waveform: parse_waveform(&waveform)?,
                speed,
                multiplier,
                depth,
                fade,
                start_phase,
                mode: parse_mode(&mode)?,
                slew: 0,
                seed: 1,
            };
            let t = timing::cycle_timing(config.speed, config.multiplier, bpm);
            println!("# cycle {:.2} ms ({})", t.ms, t.note_label);
            println!("#{:>9} {:>8} {:>8} {:>8}", "ms", "phase", "output", "level");

            // One trigger at t=0, like the harness does
            let samples = engine::simulate(&config, bpm, duration, fps, &[0.0]);
            let frame_ms = 1000.0 / fps.max(1.0);
            for (i, s) in samples.iter().enumerate() {
                println!(
                    "{:>10.1} {:>8.4} {:>8.4} {:>8.4}",
                    i as f64 * frame_ms,
                    s.phase,
                    s.output,
                    s.level
                );
            }
        }

        Commands::Verify {
            device,
            in_device,
            bpm,
            channel,
            watch_cc,
            settle,
            plan,
            only,
            report,
        } => {
            let mut settings = HarnessSettings::default();

            let plan = match plan {
                Some(path) => Plan::load(&path)?,
                None => Plan::default(),
            };
            plan.apply(&mut settings);

            // CLI flags win over the plan file
            if let Some(v) = device {
                settings.out_device = v;
            }
            if let Some(v) = in_device {
                settings.in_device = v;
            }
            if settings.in_device.is_empty() {
                settings.in_device = settings.out_device.clone();
            }
            if let Some(v) = bpm {
                settings.bpm = v;
            }
            if let Some(v) = channel {
                settings.channel = v;
            }
            if let Some(v) = watch_cc {
                settings.watch_cc = v;
            }
            if let Some(v) = settle {
                settings.settle_ms = v;
            }

            let mut tests = plan.select(verify::default_suite());
            if !only.is_empty() {
                tests.retain(|t| only.iter().any(|f| t.name.contains(f.as_str())));
            }
            if tests.is_empty() {
                return Err("no tests selected".into());
            }

            let runtime = tokio::runtime::Runtime::new()?;
            let suite = runtime.block_on(harness::run_suite(&settings, &tests))?;

            for test in &suite.tests {
                let verdict = if test.passed { "PASS" } else { "FAIL" };
                println!(
                    "{} {:<24} range {}/{} expected",
                    verdict, test.name, test.shape.observed_range, test.shape.expected_range
                );
            }
            println!("{} passed, {} failed", suite.passed, suite.failed);

            if let Some(path) = report {
                std::fs::write(&path, serde_json::to_string_pretty(&suite)?)?;
                println!("report written to {}", path.display());
            }

            if !suite.all_passed() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn parse_waveform(name: &str) -> Result<Waveform, Box<dyn std::error::Error>> {
    match name.to_lowercase().as_str() {
        "triangle" | "tri" => Ok(Waveform::Triangle),
        "sine" | "sin" => Ok(Waveform::Sine),
        "square" | "sqr" => Ok(Waveform::Square),
        "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
        "exponential" | "exp" => Ok(Waveform::Exponential),
        "ramp" => Ok(Waveform::Ramp),
        "random" | "rnd" => Ok(Waveform::Random),
        _ => Err(format!("unknown waveform '{name}'").into()),
    }
}

fn parse_mode(name: &str) -> Result<TrigMode, Box<dyn std::error::Error>> {
    match name.to_lowercase().as_str() {
        "free" => Ok(TrigMode::Free),
        "triggered" | "trig" => Ok(TrigMode::Triggered),
        "hold" => Ok(TrigMode::Hold),
        "one_shot" | "oneshot" | "one" => Ok(TrigMode::OneShot),
        "half" => Ok(TrigMode::Half),
        _ => Err(format!("unknown trigger mode '{name}'").into()),
    }
}
