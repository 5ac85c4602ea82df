//! ZeroLag Quickstart: a complete, minimal rollback match from scratch.
//!
//! Demonstrates:
//!   1. Implementing a command payload, a model, and match settings
//!   2. Building a ResimulatingEngine
//!   3. Advancing present time and reading the view model
//!   4. Receiving a late command and watching the engine roll back
//!   5. Cancelling a command with a timeout
//!
//! Run with:
//!   RUST_LOG=zerolag_engine=debug cargo run --example quickstart

use tracing_subscriber::EnvFilter;
use zerolag_core::hash::Fnv1a;
use zerolag_core::{
    Command, CommandPayload, Fix64, Model, PlayerId, Priority, Settings, StepId, TimeoutCommand,
};
use zerolag_engine::ResimulatingEngine;

// ─── Match parameters ───────────────────────────────────────────

const STEPS_PER_SECOND: i32 = 16;
const LAG_STEPS: u64 = 4;
const RUNNERS: usize = 2;

// ─── Payload: change a runner's speed ───────────────────────────

#[derive(Clone, Debug)]
struct SetSpeed {
    runner: usize,
    speed: i32,
}

impl CommandPayload for SetSpeed {
    fn content_hash(&self) -> u64 {
        Fnv1a::new()
            .u64(self.runner as u64)
            .i64(i64::from(self.speed))
            .finish()
    }
}

// ─── Model: runners on a line ───────────────────────────────────
//
// Each step applies speed changes, then moves every runner by
// speed * dt. Positions are fixed-point, so every peer lands on the
// same bits.

#[derive(Clone, Debug, Default)]
struct Track {
    step: StepId,
    speeds: [Fix64; RUNNERS],
    positions: [Fix64; RUNNERS],
}

impl Track {
    fn apply(&mut self, commands: &[Command<SetSpeed>]) {
        for command in commands {
            let SetSpeed { runner, speed } = *command.payload();
            if let Some(slot) = self.speeds.get_mut(runner) {
                *slot = Fix64::from_num(speed);
            }
        }
    }

    fn run(&mut self, dt: Fix64) {
        for (position, speed) in self.positions.iter_mut().zip(self.speeds) {
            *position = position.saturating_add(speed.saturating_mul(dt));
        }
    }
}

impl Model for Track {
    type Payload = SetSpeed;

    fn step(&self) -> StepId {
        self.step
    }

    fn update_step(&mut self, dt: Fix64, commands: &[Command<SetSpeed>]) {
        self.apply(commands);
        self.run(dt);
        self.step = self.step.next();
    }

    fn update(&mut self, dt: Fix64, _commands: &[Command<SetSpeed>]) {
        self.run(dt);
    }

    fn copy_from(&mut self, other: &Self) {
        self.clone_from(other);
    }

    fn state_hash(&self) -> u64 {
        self.positions
            .iter()
            .chain(&self.speeds)
            .fold(Fnv1a::new().u64(self.step.0), |h, v| h.i64(v.to_bits()))
            .finish()
    }
}

// ─── Settings ───────────────────────────────────────────────────

struct RaceSettings;

impl Settings for RaceSettings {
    type Model = Track;

    fn fixed_dt(&self) -> Fix64 {
        Fix64::ONE / Fix64::from_num(STEPS_PER_SECOND)
    }

    fn max_allowed_lag(&self) -> Fix64 {
        self.fixed_dt() * Fix64::from_num(LAG_STEPS)
    }

    fn max_lag_in_steps(&self) -> u64 {
        LAG_STEPS
    }

    fn create_zero_model(&self, _replication_allowed: bool) -> Track {
        Track::default()
    }

    fn settings_hash(&self) -> u64 {
        Fnv1a::new()
            .i64(self.fixed_dt().to_bits())
            .u64(LAG_STEPS)
            .finish()
    }
}

fn speed(runner: usize, step: u64, speed: i32) -> Command<SetSpeed> {
    Command::new(
        PlayerId(runner as u32),
        StepId(step),
        Priority::MIN,
        SetSpeed { runner, speed },
    )
}

fn print_view(engine: &ResimulatingEngine<RaceSettings>) {
    let view = engine.view_model();
    let positions: Vec<String> = view.positions.iter().map(|p| format!("{p:>8.4}")).collect();
    println!(
        "  present {:>3}  view {:>3}  positions [{}]",
        engine.present_step(),
        view.step(),
        positions.join(", ")
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== ZeroLag Quickstart ===\n");
    let settings = RaceSettings;
    let dt = settings.fixed_dt();
    println!(
        "Step {dt} s, lag window {} steps, {RUNNERS} runners\n",
        settings.max_lag_in_steps()
    );

    let mut engine = match ResimulatingEngine::new(settings) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("invalid settings: {e}");
            return;
        }
    };

    // Both runners start moving on time.
    engine.receive_command(speed(0, 1, 2));
    engine.receive_command(speed(1, 1, 1));
    println!("Running 16 steps with on-time input...");
    for _ in 0..16 {
        engine.advance_present_time(dt);
    }
    print_view(&engine);

    // Runner 1 sped up at step 14, but the news arrives at step 16.
    println!("\nLate command: runner 1 speeds up at step 14...");
    engine.receive_command(speed(1, 14, 4));
    for _ in 0..3 {
        engine.advance_present_time(dt);
        print_view(&engine);
    }

    // Runner 0's stop at step 20 is cancelled by the authority.
    println!("\nRunner 0 stops at step 20, then the stop times out...");
    let stop = speed(0, 20, 0);
    engine.receive_command(stop.clone());
    engine.receive_timeout(TimeoutCommand::for_command(&stop, StepId(22)));
    for _ in 0..8 {
        engine.advance_present_time(dt);
    }
    print_view(&engine);

    let metrics = engine.metrics();
    println!(
        "\nSimulated {} steps in {} waves, {} rollbacks (ratio {:.2})",
        metrics.steps_simulated,
        metrics.waves_completed,
        metrics.rollbacks,
        metrics.rollback_ratio()
    );
}
