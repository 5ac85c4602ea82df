//! Record a server match to a file, then replay and verify it.
//!
//! Demonstrates:
//!   1. Recording every step of an input-delayed server with ReplayWriter
//!   2. Attaching checkpoint hashes of confirmed models
//!   3. Reading the recording back and verifying it with replay_and_compare
//!
//! Run with:
//!   RUST_LOG=zerolag_replay=debug cargo run --example record_and_replay

use std::fs::File;
use std::io::{BufReader, BufWriter};

use tracing_subscriber::EnvFilter;
use zerolag_core::Model;
use zerolag_engine::LinearEngine;
use zerolag_replay::{
    replay_and_compare, Checkpoint, ReplayError, ReplayHeader, ReplayReader, ReplayWriter, StepMode,
};
use zerolag_test_utils::{random_arrivals, random_commands, CounterSettings};

const STEPS: u64 = 256;
const DELAY: u64 = 4;

fn main() -> Result<(), ReplayError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== ZeroLag Record and Replay ===\n");
    let settings = CounterSettings::default();
    let dt = settings.fixed_dt;
    let commands = random_commands(42, 4, STEPS - 2 * DELAY, 300);
    let arrivals = random_arrivals(43, &commands, DELAY);
    let path = std::env::temp_dir().join("zerolag_example.zlag");

    // ─── Record ─────────────────────────────────────────────────
    let mut server = LinearEngine::server(settings.clone(), DELAY)?;
    let header = ReplayHeader::for_settings(&settings, StepMode::Fixed);
    let mut writer = ReplayWriter::new(BufWriter::new(File::create(&path)?), header)?;

    let mut next = arrivals.iter().peekable();
    for present in 0..STEPS {
        let mut received = Vec::new();
        while let Some(arrival) = next.next_if(|a| a.received_at.0 == present) {
            server.receive_command(arrival.command.clone());
            received.push(arrival.command.clone());
        }
        server.advance_present_time(dt);

        let view = server.view_model();
        let checkpoint = (present % 32 == 0).then(|| Checkpoint {
            step: view.step(),
            state_hash: view.state_hash(),
        });
        writer.record_step(dt, &received, &[], checkpoint)?;
    }
    writer.flush()?;
    println!(
        "Recorded {} frames ({} commands) to {}",
        writer.frames_written(),
        commands.len(),
        path.display()
    );
    drop(writer);

    // ─── Replay ─────────────────────────────────────────────────
    let reader = ReplayReader::open(BufReader::new(File::open(&path)?))?;
    let summary = replay_and_compare(reader, settings)?;
    println!(
        "Replayed {} steps, {} checkpoints verified, final state {:016x}",
        summary.steps_replayed, summary.checkpoints_verified, summary.final_state_hash
    );

    std::fs::remove_file(&path)?;
    Ok(())
}
