//! Benchmark profiles and utilities for the ZeroLag rollback engine.
//!
//! Provides pre-built [`MatchProfile`]s for benchmarking:
//!
//! - [`reference_profile`]: 4 players, 400 steps, at most 4 steps of input lag
//! - [`stress_profile`]: 16 players, 2000 steps, at most 8 steps of input lag
//! - [`play_match`]: drive a resimulating engine through a profile

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use zerolag_core::{Fix64, StepId};
use zerolag_engine::ResimulatingEngine;
use zerolag_test_utils::{random_arrivals, random_commands, Arrival, CounterSettings};

/// A seeded match: settings, length, and every command with the step at
/// which it arrives.
#[derive(Clone, Debug)]
pub struct MatchProfile {
    pub settings: CounterSettings,
    pub steps: u64,
    pub arrivals: Vec<Arrival>,
}

impl MatchProfile {
    fn build(seed: u64, players: u32, steps: u64, commands: usize, max_lag: u64) -> Self {
        let dt = Fix64::from_num(0.0625);
        let lag = dt * Fix64::from_num(max_lag);
        let last_step = steps.saturating_sub(max_lag + 1).max(1);
        let commands = random_commands(seed, players, last_step, commands);
        Self {
            settings: CounterSettings::new(dt, lag).with_seed(seed),
            steps,
            arrivals: random_arrivals(seed.wrapping_add(1), &commands, max_lag),
        }
    }

    /// Number of commands in the match.
    pub fn command_count(&self) -> usize {
        self.arrivals.len()
    }
}

/// Build a reference profile: 4 players sending 600 commands over 400
/// steps, each arriving up to 4 steps late.
pub fn reference_profile(seed: u64) -> MatchProfile {
    MatchProfile::build(seed, 4, 400, 600, 4)
}

/// Build a stress profile: 16 players sending 8000 commands over 2000
/// steps, each arriving up to 8 steps late.
pub fn stress_profile(seed: u64) -> MatchProfile {
    MatchProfile::build(seed, 16, 2000, 8000, 8)
}

/// Play `profile` on a fresh resimulating engine, one fixed step per
/// update, delivering commands at their arrival steps.
pub fn play_match(profile: &MatchProfile) -> ResimulatingEngine<CounterSettings> {
    let mut engine = ResimulatingEngine::new(profile.settings.clone())
        .unwrap_or_else(|e| panic!("invalid bench settings: {e}"));
    let dt = profile.settings.fixed_dt;
    let mut next = profile.arrivals.iter().peekable();
    for present in 0..profile.steps {
        while let Some(arrival) = next.next_if(|a| a.received_at <= StepId(present)) {
            engine.receive_command(arrival.command.clone());
        }
        engine.advance_present_time(dt);
    }
    engine
}
