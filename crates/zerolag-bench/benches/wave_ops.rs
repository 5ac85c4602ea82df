//! Criterion benchmarks for resimulation waves and rollback.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use zerolag_bench::{play_match, reference_profile, stress_profile};
use zerolag_core::{Command, Model, PlayerId, Priority, Settings};
use zerolag_engine::ResimulatingEngine;
use zerolag_test_utils::{CounterSettings, Nudge};

/// Benchmark: one update with no late input, so the wave only extends
/// the cursor by a step.
fn bench_steady_advance(c: &mut Criterion) {
    let settings = CounterSettings::default();
    let dt = settings.fixed_dt;
    let mut engine = ResimulatingEngine::new(settings).unwrap();
    for _ in 0..64 {
        engine.advance_present_time(dt);
    }

    c.bench_function("steady_advance", |b| {
        b.iter(|| {
            engine.advance_present_time(dt);
            black_box(engine.view_model().step());
        });
    });
}

/// Benchmark: every update receives a command for the oldest step still
/// inside the lag window, forcing a rollback to a dense snapshot.
fn bench_rollback_advance(c: &mut Criterion) {
    let settings = CounterSettings::default();
    let dt = settings.fixed_dt;
    let lag = settings.max_lag_in_steps();
    let mut engine = ResimulatingEngine::new(settings).unwrap();
    for _ in 0..64 {
        engine.advance_present_time(dt);
    }

    let mut amount = 0;
    c.bench_function("rollback_advance", |b| {
        b.iter(|| {
            amount += 1;
            let step = engine.present_step().before(lag);
            engine.receive_command(Command::new(PlayerId(0), step, Priority::MIN, Nudge::new(amount)));
            engine.advance_present_time(dt);
            black_box(engine.view_model().state_hash());
        });
    });
}

/// Benchmark: a whole reference match with late arrivals.
fn bench_reference_match(c: &mut Criterion) {
    let profile = reference_profile(42);
    c.bench_function("reference_match", |b| {
        b.iter(|| {
            let engine = play_match(&profile);
            black_box(engine.view_model().step());
        });
    });
}

/// Benchmark: a whole stress match with late arrivals.
fn bench_stress_match(c: &mut Criterion) {
    let profile = stress_profile(42);
    let mut group = c.benchmark_group("stress");
    group.sample_size(10);
    group.bench_function("stress_match", |b| {
        b.iter(|| {
            let engine = play_match(&profile);
            black_box(engine.metrics().rollbacks);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_steady_advance,
    bench_rollback_advance,
    bench_reference_match,
    bench_stress_match
);
criterion_main!(benches);
