//! Seeded command streams.
//!
//! All generators take an explicit seed and use [`ChaCha8Rng`], so a
//! failing test reproduces exactly.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use zerolag_core::{Command, PlayerId, Priority, StepId};

use crate::fixtures::Nudge;

/// A command together with the step at which a peer received it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arrival {
    /// Step during which the peer received the command.
    pub received_at: StepId,
    /// The command as issued.
    pub command: Command<Nudge>,
}

/// `count` commands from `players` players, scheduled in steps
/// `1..=last_step` with random priorities and amounts.
pub fn random_commands(seed: u64, players: u32, last_step: u64, count: usize) -> Vec<Command<Nudge>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let player = PlayerId(rng.random_range(0..players.max(1)));
            let step = StepId(rng.random_range(1..=last_step.max(1)));
            let priority = Priority::new(rng.random_range(0..=Priority::MAX.get()))
                .unwrap_or(Priority::MIN);
            let amount = rng.random_range(-50..=50);
            let payload = if rng.random_bool(0.25) {
                Nudge::deferred(amount)
            } else {
                Nudge::new(amount)
            };
            Command::new(player, step, priority, payload)
        })
        .collect()
}

/// Assign each command a receipt step `lag` steps after its execution
/// step, with `lag` uniform in `0..=max_lag`. Sorted by receipt step,
/// ties in generation order.
pub fn random_arrivals(seed: u64, commands: &[Command<Nudge>], max_lag: u64) -> Vec<Arrival> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut arrivals: Vec<Arrival> = commands
        .iter()
        .map(|command| Arrival {
            received_at: command.step().after(rng.random_range(0..=max_lag)),
            command: command.clone(),
        })
        .collect();
    arrivals.sort_by_key(|a| a.received_at);
    arrivals
}

/// `items` in a seeded random order.
pub fn shuffled<T: Clone>(seed: u64, items: &[T]) -> Vec<T> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = items.to_vec();
    out.shuffle(&mut rng);
    out
}
