//! Criterion micro-benchmarks for the replay codec and log hashing.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use zerolag_core::{Fix64, StepId};
use zerolag_engine::CommandLog;
use zerolag_replay::codec::{decode_frame, encode_frame, serialize_command};
use zerolag_replay::hash::log_hash;
use zerolag_replay::{Checkpoint, Frame};
use zerolag_test_utils::random_commands;

/// Build a frame with `n` commands for benchmarking.
fn make_frame(n: usize) -> Frame {
    Frame {
        step: StepId(42),
        duration: Fix64::from_num(0.0625),
        commands: random_commands(42, 8, 42, n)
            .iter()
            .map(serialize_command)
            .collect(),
        timeouts: Vec::new(),
        checkpoint: Some(Checkpoint {
            step: StepId(38),
            state_hash: 0xDEAD_BEEF,
        }),
    }
}

/// Benchmark: encode a frame with 50 commands.
fn bench_codec_encode_frame(c: &mut Criterion) {
    let frame = make_frame(50);

    c.bench_function("codec_encode_frame", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(4096);
            encode_frame(&mut buf, &frame).unwrap();
            black_box(&buf);
        });
    });
}

/// Benchmark: decode the same frame.
fn bench_codec_decode_frame(c: &mut Criterion) {
    let frame = make_frame(50);
    let mut encoded = Vec::with_capacity(4096);
    encode_frame(&mut encoded, &frame).unwrap();

    c.bench_function("codec_decode_frame", |b| {
        b.iter(|| {
            let mut cursor = encoded.as_slice();
            let decoded = decode_frame(&mut cursor).unwrap().unwrap();
            black_box(&decoded);
        });
    });
}

/// Benchmark: hash a 1000-command log.
fn bench_log_hash_1000(c: &mut Criterion) {
    let mut log = CommandLog::fixed(Fix64::from_num(0.0625));
    for command in random_commands(42, 16, 200, 1000) {
        log.receive_command(command);
    }

    c.bench_function("log_hash_1000", |b| {
        b.iter(|| black_box(log_hash(&log, StepId(200))));
    });
}

criterion_group!(
    benches,
    bench_codec_encode_frame,
    bench_codec_decode_frame,
    bench_log_hash_1000
);
criterion_main!(benches);
