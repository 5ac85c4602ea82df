//! Mock model, settings, and payload.
//!
//! - [`Nudge`]: adds a signed amount to the model total. Carries its own
//!   timeout policy.
//! - [`CounterModel`]: sums nudges and folds every applied command into
//!   an order-sensitive trace, so any difference in command set or
//!   intra-step order changes [`Model::state_hash`]. Also draws from a
//!   [`SimRng`] each step, exercising seeded model randomness.
//! - [`CounterSettings`]: step duration, lag, and RNG seed.

use zerolag_core::hash::Fnv1a;
use zerolag_core::time::whole_steps;
use zerolag_core::wire::take_array;
use zerolag_core::{
    Command, CommandPayload, DecodeError, Fix64, Model, PayloadCodec, Settings, SimRng, StepId,
    TimeoutAction,
};

// ── Nudge ──────────────────────────────────────────────────────────

/// Payload adding `amount` to [`CounterModel::total`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Nudge {
    /// Added to the total when the command executes.
    pub amount: i32,
    /// Policy reported by [`CommandPayload::on_timeout`].
    pub on_timeout: TimeoutAction,
}

impl Nudge {
    /// A nudge that is cancelled if it times out.
    pub fn new(amount: i32) -> Self {
        Self {
            amount,
            on_timeout: TimeoutAction::Cancel,
        }
    }

    /// A nudge that is executed later if it times out.
    pub fn deferred(amount: i32) -> Self {
        Self {
            amount,
            on_timeout: TimeoutAction::ExecuteLater,
        }
    }
}

impl CommandPayload for Nudge {
    fn content_hash(&self) -> u64 {
        Fnv1a::new()
            .i64(i64::from(self.amount))
            .byte(self.on_timeout.tag())
            .finish()
    }

    fn on_timeout(&self) -> TimeoutAction {
        self.on_timeout
    }
}

/// `amount` as 4 LE bytes, then the timeout action tag.
impl PayloadCodec for Nudge {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.push(self.on_timeout.tag());
    }

    fn decode(mut bytes: &[u8]) -> Result<Self, DecodeError> {
        let amount = i32::from_le_bytes(take_array(&mut bytes)?);
        let [tag] = take_array(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(DecodeError::new(format!("{} trailing bytes", bytes.len())));
        }
        let on_timeout = TimeoutAction::from_tag(tag).map_err(|e| DecodeError::new(e.to_string()))?;
        Ok(Self { amount, on_timeout })
    }
}

// ── CounterModel ───────────────────────────────────────────────────

/// Deterministic model summing [`Nudge`] amounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterModel {
    step: StepId,
    total: i64,
    trace: u64,
    noise: u64,
    rng: SimRng,
    /// Presentation time, advanced by both update kinds. Not hashed.
    elapsed: Fix64,
    alive: bool,
}

impl CounterModel {
    /// A model at step 0 with RNG seed 0.
    pub fn zero() -> Self {
        Self::with_seed(0)
    }

    /// A model at step 0 whose RNG starts from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            step: StepId::ZERO,
            total: 0,
            trace: 0,
            noise: 0,
            rng: SimRng::new(seed),
            elapsed: Fix64::ZERO,
            alive: false,
        }
    }

    /// Sum of all applied nudges.
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Order-sensitive digest of applied commands.
    pub fn trace(&self) -> u64 {
        self.trace
    }

    /// Presentation time, including free-run updates.
    pub fn elapsed(&self) -> Fix64 {
        self.elapsed
    }

    /// Whether the model was enlivened for presentation.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    fn apply(&mut self, commands: &[Command<Nudge>]) {
        for command in commands {
            self.total += i64::from(command.payload().amount);
            self.trace = Fnv1a::new()
                .u64(self.trace)
                .u64(command.order_key().0)
                .finish();
        }
    }
}

impl Model for CounterModel {
    type Payload = Nudge;

    fn step(&self) -> StepId {
        self.step
    }

    fn update_step(&mut self, dt: Fix64, commands: &[Command<Nudge>]) {
        self.apply(commands);
        self.noise = self.noise.wrapping_add(self.rng.next_u64());
        self.elapsed = self.elapsed.saturating_add(dt);
        self.step = self.step.next();
    }

    fn update(&mut self, dt: Fix64, commands: &[Command<Nudge>]) {
        self.apply(commands);
        self.elapsed = self.elapsed.saturating_add(dt);
    }

    fn copy_from(&mut self, other: &Self) {
        let alive = self.alive;
        *self = other.clone();
        self.alive = alive;
    }

    fn state_hash(&self) -> u64 {
        Fnv1a::new()
            .u64(self.step.0)
            .i64(self.total)
            .u64(self.trace)
            .u64(self.noise)
            .u64(self.rng.seed())
            .finish()
    }

    fn enliven(&mut self) {
        self.alive = true;
    }

    fn mortify(&mut self) {
        self.alive = false;
    }
}

// ── CounterSettings ────────────────────────────────────────────────

/// Settings for [`CounterModel`] matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterSettings {
    /// Duration of one step.
    pub fixed_dt: Fix64,
    /// Latest a command may arrive and still be applied in place.
    pub max_allowed_lag: Fix64,
    /// Seed of every zero model's RNG.
    pub seed: u64,
}

impl CounterSettings {
    /// Settings with seed 0.
    pub fn new(fixed_dt: Fix64, max_allowed_lag: Fix64) -> Self {
        Self {
            fixed_dt,
            max_allowed_lag,
            seed: 0,
        }
    }

    /// The same settings with a different model seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for CounterSettings {
    /// 16 steps per second, a quarter second of lag (4 steps).
    fn default() -> Self {
        Self::new(Fix64::from_num(0.0625), Fix64::from_num(0.25))
    }
}

impl Settings for CounterSettings {
    type Model = CounterModel;

    fn fixed_dt(&self) -> Fix64 {
        self.fixed_dt
    }

    fn max_allowed_lag(&self) -> Fix64 {
        self.max_allowed_lag
    }

    fn max_lag_in_steps(&self) -> u64 {
        whole_steps(self.max_allowed_lag, self.fixed_dt)
    }

    fn create_zero_model(&self, _replication_allowed: bool) -> CounterModel {
        CounterModel::with_seed(self.seed)
    }

    fn settings_hash(&self) -> u64 {
        Fnv1a::new()
            .i64(self.fixed_dt.to_bits())
            .i64(self.max_allowed_lag.to_bits())
            .u64(self.seed)
            .finish()
    }
}
