//! Criterion micro-benchmarks for command log insertion and flattening.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use zerolag_core::{Fix64, StepId};
use zerolag_engine::{CommandLog, NetworkCommandLog};
use zerolag_test_utils::{random_arrivals, random_commands, shuffled};

fn dt() -> Fix64 {
    Fix64::from_num(0.0625)
}

/// Benchmark: insert 1000 commands in arrival order, 16 players over
/// 200 steps.
fn bench_log_insert_1000(c: &mut Criterion) {
    let commands = random_commands(42, 16, 200, 1000);
    c.bench_function("log_insert_1000", |b| {
        b.iter(|| {
            let mut log = CommandLog::fixed(dt());
            for command in &commands {
                log.receive_command(command.clone());
            }
            black_box(log.command_count());
        });
    });
}

/// Benchmark: insert the same commands shuffled, so every step's
/// ordered set sees out-of-order keys.
fn bench_log_insert_shuffled_1000(c: &mut Criterion) {
    let commands = shuffled(7, &random_commands(42, 16, 200, 1000));
    c.bench_function("log_insert_shuffled_1000", |b| {
        b.iter(|| {
            let mut log = CommandLog::fixed(dt());
            for command in &commands {
                log.receive_command(command.clone());
            }
            black_box(log.command_count());
        });
    });
}

/// Benchmark: cumulative commands hash over a 200-step log.
fn bench_cumulative_hash(c: &mut Criterion) {
    let mut log = CommandLog::fixed(dt());
    for command in random_commands(42, 16, 200, 1000) {
        log.receive_command(command);
    }
    c.bench_function("cumulative_hash_200", |b| {
        b.iter(|| black_box(log.cumulative_commands_hash(StepId(200))));
    });
}

/// Benchmark: flatten a network log with 1000 late receipts.
fn bench_network_flatten_1000(c: &mut Criterion) {
    let commands = random_commands(42, 16, 200, 1000);
    let mut log = NetworkCommandLog::fixed(dt());
    log.extend_to(210);
    for arrival in random_arrivals(43, &commands, 8) {
        log.receive_command(arrival.received_at, arrival.command);
    }
    c.bench_function("network_flatten_1000", |b| {
        b.iter(|| black_box(log.flatten_to_log().command_count()));
    });
}

criterion_group!(
    benches,
    bench_log_insert_1000,
    bench_log_insert_shuffled_1000,
    bench_cumulative_hash,
    bench_network_flatten_1000
);
criterion_main!(benches);
