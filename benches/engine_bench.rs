//! Benchmarks for the LFO engine hot path
//!
//! The engine runs once per display frame in the host UI, so a single
//! update must stay trivially cheap; the sampler also backs the static
//! preview renderer, which sweeps hundreds of phases per redraw.
//!
//! Run with: cargo bench --bench engine_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lfolab::engine::{LfoConfig, LfoEngine, TrigMode};
use lfolab::waveform::Waveform;

fn bench_update_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    for wave in [Waveform::Sine, Waveform::Triangle, Waveform::Random] {
        group.bench_function(format!("{:?}", wave).to_lowercase(), |b| {
            let config = LfoConfig {
                waveform: wave,
                speed: 32.0,
                multiplier: 8,
                depth: 63,
                fade: -16,
                start_phase: 0,
                mode: TrigMode::Triggered,
                slew: 0,
                seed: 1,
            };
            let mut engine = LfoEngine::new(config, 120);
            engine.trigger();
            let mut now = 0.0;
            b.iter(|| {
                now += 16.6;
                black_box(engine.update(black_box(now)))
            });
        });
    }

    group.finish();
}

fn bench_sampler_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler_sweep");

    for wave in Waveform::ALL {
        group.bench_function(format!("{:?}", wave).to_lowercase(), |b| {
            b.iter(|| {
                let mut acc = 0.0;
                for i in 0..512 {
                    let phase = i as f64 / 512.0;
                    acc += wave.sample(black_box(phase), 1);
                }
                black_box(acc)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_update_loop, bench_sampler_sweep);
criterion_main!(benches);
