//! Per-execution-step command log.
//!
//! [`CommandLog`] maps each step to its commands, kept sorted by
//! [`OrderKey`]. Any arrival order of the same command set produces the
//! same list, so every peer executes a step's commands identically. The
//! log also records how long each step lasts and the total simulated
//! time covered so far.

use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;
use zerolag_core::{Command, CommandPayload, Fix64, OrderKey, StepId, TimeoutCommand};

/// Commands of a single step, sorted ascending by order key, then by
/// content hash.
pub type StepCommands<P> = SmallVec<[Command<P>; 4]>;

/// How step durations are recorded.
#[derive(Clone, Debug, PartialEq)]
enum StepDurations {
    /// Every step lasts `dt`; only the count is stored.
    Fixed { dt: Fix64, count: u64 },
    /// Each step's duration is logged individually.
    Logged(Vec<Fix64>),
}

/// Commands keyed by the step they execute in.
#[derive(Clone, PartialEq)]
pub struct CommandLog<P> {
    commands: BTreeMap<StepId, StepCommands<P>>,
    durations: StepDurations,
    saved_time: Fix64,
}

/// Position of a command within its step. Order keys drop the low hash
/// bits, so ties fall back to the full content hash.
fn rank<P>(command: &Command<P>) -> (OrderKey, u64) {
    (command.order_key(), command.content_hash())
}

impl<P: CommandPayload> CommandLog<P> {
    /// A log whose steps all last `dt`.
    pub fn fixed(dt: Fix64) -> Self {
        Self {
            commands: BTreeMap::new(),
            durations: StepDurations::Fixed { dt, count: 0 },
            saved_time: Fix64::ZERO,
        }
    }

    /// A log that records each step's duration as it is added.
    pub fn variable() -> Self {
        Self {
            commands: BTreeMap::new(),
            durations: StepDurations::Logged(Vec::new()),
            saved_time: Fix64::ZERO,
        }
    }

    // ── Commands ────────────────────────────────────────────────

    /// Insert a command into its step, keeping the step sorted.
    pub fn receive_command(&mut self, command: Command<P>) {
        let new_rank = rank(&command);
        let list = self.commands.entry(command.step()).or_default();
        let at = list.partition_point(|c| rank(c) < new_rank);
        list.insert(at, command);
    }

    /// The commands of `step` in execution order.
    pub fn commands_at(&self, step: StepId) -> &[Command<P>] {
        self.commands
            .get(&step)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// The target of `timeout`, if it has been received.
    ///
    /// Absence is normal: the target may still be in flight.
    pub fn find_timed_out(&self, timeout: &TimeoutCommand) -> Option<&Command<P>> {
        let list = self.commands.get(&timeout.target_step)?;
        Self::position_of(list, timeout.target_key).map(|i| &list[i])
    }

    /// Remove and return the target of `timeout`.
    pub fn take_timed_out(&mut self, timeout: &TimeoutCommand) -> Option<Command<P>> {
        let list = self.commands.get_mut(&timeout.target_step)?;
        let at = Self::position_of(list, timeout.target_key)?;
        let command = list.remove(at);
        if list.is_empty() {
            self.commands.remove(&timeout.target_step);
        }
        Some(command)
    }

    /// Resolve `timeout` entirely inside this log.
    ///
    /// Removes the target and re-inserts it at the reschedule step for
    /// `ExecuteLater`. Returns the target's original step, or `None` if
    /// the target is not present.
    pub fn apply_timeout(&mut self, timeout: &TimeoutCommand) -> Option<StepId> {
        let command = self.take_timed_out(timeout)?;
        let step = command.step();
        if let Some(moved) = timeout.apply(command) {
            self.receive_command(moved);
        }
        Some(step)
    }

    /// First command with `key`. Among key ties this is the one with the
    /// lowest content hash, whatever order they arrived in.
    fn position_of(list: &[Command<P>], key: OrderKey) -> Option<usize> {
        let at = list.partition_point(|c| c.order_key() < key);
        (at < list.len() && list[at].order_key() == key).then_some(at)
    }

    /// Steps that hold at least one command, ascending.
    pub fn steps(&self) -> impl Iterator<Item = (StepId, &[Command<P>])> + '_ {
        self.commands.iter().map(|(step, list)| (*step, list.as_slice()))
    }

    /// Total number of commands across all steps.
    pub fn command_count(&self) -> usize {
        self.commands.values().map(|list| list.len()).sum()
    }

    /// Wrapping sum of the content hashes of all commands at steps
    /// `0..=step`. Two peers with equal sums almost certainly hold the
    /// same commands up to `step`.
    pub fn cumulative_commands_hash(&self, step: StepId) -> u64 {
        self.commands
            .range(..=step)
            .flat_map(|(_, list)| list.iter())
            .fold(0u64, |acc, c| acc.wrapping_add(c.content_hash()))
    }
}

impl<P> CommandLog<P> {
    // ── Step durations ──────────────────────────────────────────

    /// Record one more step lasting `dt`.
    ///
    /// In fixed mode `dt` is expected to equal the fixed step duration.
    pub fn add_step(&mut self, dt: Fix64) {
        match &mut self.durations {
            StepDurations::Fixed { count, .. } => *count += 1,
            StepDurations::Logged(list) => list.push(dt),
        }
        self.saved_time = self.saved_time.saturating_add(dt);
    }

    /// Add fixed-duration steps until the log covers `count` steps.
    pub fn extend_to(&mut self, count: u64) {
        if let StepDurations::Fixed { dt, .. } = self.durations {
            while self.step_count() < count {
                self.add_step(dt);
            }
        }
    }

    /// Number of steps with a recorded duration.
    pub fn step_count(&self) -> u64 {
        match &self.durations {
            StepDurations::Fixed { count, .. } => *count,
            StepDurations::Logged(list) => list.len() as u64,
        }
    }

    /// Duration of `step`.
    ///
    /// Fixed mode answers for any step. Variable mode answers only for
    /// steps already added.
    pub fn step_duration(&self, step: StepId) -> Option<Fix64> {
        match &self.durations {
            StepDurations::Fixed { dt, .. } => Some(*dt),
            StepDurations::Logged(list) => {
                usize::try_from(step.0).ok().and_then(|i| list.get(i)).copied()
            }
        }
    }

    /// The fixed step duration, if this log is in fixed mode.
    pub fn fixed_dt(&self) -> Option<Fix64> {
        match self.durations {
            StepDurations::Fixed { dt, .. } => Some(dt),
            StepDurations::Logged(_) => None,
        }
    }

    /// Sum of all recorded step durations.
    pub fn saved_time(&self) -> Fix64 {
        self.saved_time
    }

    /// Total simulated duration covered by the log.
    pub fn duration(&self) -> Fix64 {
        match &self.durations {
            StepDurations::Fixed { dt, count } => zerolag_core::time::span_of(*dt, *count),
            StepDurations::Logged(list) => list
                .iter()
                .fold(Fix64::ZERO, |acc, dt| acc.saturating_add(*dt)),
        }
    }

    /// Logged step durations, empty in fixed mode.
    pub fn logged_durations(&self) -> &[Fix64] {
        match &self.durations {
            StepDurations::Fixed { .. } => &[],
            StepDurations::Logged(list) => list,
        }
    }

    /// An empty log with the same duration bookkeeping as `self`.
    pub fn with_same_timing<Q>(&self) -> CommandLog<Q> {
        CommandLog {
            commands: BTreeMap::new(),
            durations: self.durations.clone(),
            saved_time: self.saved_time,
        }
    }
}

impl<P> fmt::Debug for CommandLog<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandLog")
            .field("steps_with_commands", &self.commands.len())
            .field(
                "commands",
                &self.commands.values().map(|l| l.len()).sum::<usize>(),
            )
            .field("step_count", &self.step_count())
            .field("saved_time", &self.saved_time)
            .finish()
    }
}
