//! Threaded engine: resimulation on a dedicated computation thread.
//!
//! Demonstrates:
//!   1. Starting a ThreadedEngine
//!   2. Feeding commands from the driving thread as they arrive late
//!   3. Reading the view model, which only moves forward
//!   4. Stopping the engine and joining its thread
//!
//! Run with:
//!   RUST_LOG=zerolag_engine=info cargo run --example threaded

use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use zerolag_core::Model;
use zerolag_engine::ThreadedEngine;
use zerolag_test_utils::{random_arrivals, random_commands, CounterSettings};

const STEPS: u64 = 160;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== ZeroLag Threaded Engine ===\n");
    let settings = CounterSettings::default();
    let dt = settings.fixed_dt;
    let commands = random_commands(7, 4, STEPS - 8, 120);
    let arrivals = random_arrivals(8, &commands, 4);

    let mut engine = match ThreadedEngine::new(settings) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("invalid settings: {e}");
            return;
        }
    };

    let mut next = arrivals.iter().peekable();
    for present in 0..STEPS {
        while let Some(arrival) = next.next_if(|a| a.received_at.0 <= present) {
            engine.receive_command(arrival.command.clone());
        }
        engine.advance_present_time(dt);
        if present % 16 == 0 {
            let view = engine.view_model();
            println!(
                "  present {:>3}  view {:>3}  total {:>5}",
                engine.present_step(),
                view.step(),
                view.total()
            );
        }
        // One frame at 16 steps per second, sped up 8x.
        thread::sleep(Duration::from_millis(8));
    }

    let metrics = engine.metrics();
    println!(
        "\nReceived {} commands; {} waves, {} rollbacks, {} views published",
        metrics.commands_received,
        metrics.waves_completed,
        metrics.rollbacks,
        metrics.view_models_published
    );
    engine.stop();
}
