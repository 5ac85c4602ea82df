//! Command log keyed by receipt step.
//!
//! [`NetworkCommandLog`] records what a peer observed: every command and
//! timeout under the step at which it arrived locally, in arrival order.
//! [`flatten_to_log`](NetworkCommandLog::flatten_to_log) rebuilds the
//! canonical per-execution-step [`CommandLog`] a live engine would have
//! produced, and the lag analytics answer how late input actually was.

use indexmap::IndexMap;
use tracing::warn;
use zerolag_core::time::span_of;
use zerolag_core::{Command, CommandPayload, Fix64, StepId, TimeoutCommand};

use crate::log::CommandLog;

/// Commands and timeouts grouped by the step they were received in.
#[derive(Clone, Debug)]
pub struct NetworkCommandLog<P> {
    commands: IndexMap<StepId, Vec<Command<P>>>,
    timeouts: IndexMap<StepId, Vec<TimeoutCommand>>,
    timing: CommandLog<P>,
    fixed_dt: Fix64,
}

impl<P: CommandPayload> NetworkCommandLog<P> {
    /// A network log for a fixed-step match.
    pub fn fixed(fixed_dt: Fix64) -> Self {
        Self {
            commands: IndexMap::new(),
            timeouts: IndexMap::new(),
            timing: CommandLog::fixed(fixed_dt),
            fixed_dt,
        }
    }

    /// A network log whose steps have individually logged durations.
    ///
    /// `fixed_dt` is still used to express lag as time.
    pub fn variable(fixed_dt: Fix64) -> Self {
        Self {
            commands: IndexMap::new(),
            timeouts: IndexMap::new(),
            timing: CommandLog::variable(),
            fixed_dt,
        }
    }

    /// Record one more step lasting `dt`.
    pub fn add_step(&mut self, dt: Fix64) {
        self.timing.add_step(dt);
    }

    /// Add fixed-duration steps until the log covers `count` steps.
    pub fn extend_to(&mut self, count: u64) {
        self.timing.extend_to(count);
    }

    /// Record `command` as received during step `received_at`.
    pub fn receive_command(&mut self, received_at: StepId, command: Command<P>) {
        self.commands.entry(received_at).or_default().push(command);
    }

    /// Record `timeout` as received during step `received_at`.
    pub fn receive_timeout(&mut self, received_at: StepId, timeout: TimeoutCommand) {
        self.timeouts.entry(received_at).or_default().push(timeout);
    }

    /// Commands received during `step`, in arrival order.
    pub fn commands_received_at(&self, step: StepId) -> &[Command<P>] {
        self.commands.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Timeouts received during `step`, in arrival order.
    pub fn timeouts_received_at(&self, step: StepId) -> &[TimeoutCommand] {
        self.timeouts.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every receipt step holding commands or timeouts, ascending.
    pub fn receipt_steps(&self) -> Vec<StepId> {
        let mut steps: Vec<StepId> = self
            .commands
            .keys()
            .chain(self.timeouts.keys())
            .copied()
            .collect();
        steps.sort_unstable();
        steps.dedup();
        steps
    }

    /// Rebuild the per-execution-step log.
    ///
    /// All commands are merged first, in receipt order, then all timeouts
    /// are applied in receipt order. A timeout whose target never arrived
    /// is skipped.
    pub fn flatten_to_log(&self) -> CommandLog<P> {
        let mut log = self.timing.with_same_timing();
        for command in self.commands.values().flatten() {
            log.receive_command(command.clone());
        }
        for (received_at, timeout) in self
            .timeouts
            .iter()
            .flat_map(|(step, list)| list.iter().map(move |t| (*step, t)))
        {
            if log.apply_timeout(timeout).is_none() {
                warn!(
                    received_at = received_at.0,
                    target_step = timeout.target_step.0,
                    target_key = %timeout.target_key,
                    "timeout target missing from flattened log"
                );
            }
        }
        log
    }

    /// The target of `timeout` in the flattened log, if present.
    pub fn find_timed_out(&self, timeout: &TimeoutCommand) -> Option<Command<P>> {
        self.flatten_to_log().find_timed_out(timeout).cloned()
    }

    /// Largest observed delay between a command's execution step and the
    /// step it was received in, as time.
    ///
    /// Timeouts count with the step of the command they target.
    pub fn calc_max_lag(&self) -> Fix64 {
        let command_lag = self.commands.iter().flat_map(|(received_at, list)| {
            list.iter().map(move |c| received_at.steps_since(c.step()))
        });
        let timeout_lag = self.timeouts.iter().flat_map(|(received_at, list)| {
            list.iter()
                .map(move |t| received_at.steps_since(t.target_step))
        });
        let max_steps = command_lag.chain(timeout_lag).max().unwrap_or(0);
        span_of(self.fixed_dt, max_steps)
    }

    /// Latest step at which anything was received.
    pub fn calc_max_receiving_step(&self) -> StepId {
        self.commands
            .keys()
            .chain(self.timeouts.keys())
            .copied()
            .max()
            .unwrap_or(StepId::ZERO)
    }

    /// Total commands recorded.
    pub fn command_count(&self) -> usize {
        self.commands.values().map(Vec::len).sum()
    }

    /// Total timeouts recorded.
    pub fn timeout_count(&self) -> usize {
        self.timeouts.values().map(Vec::len).sum()
    }

    /// Number of steps with a recorded duration.
    pub fn step_count(&self) -> u64 {
        self.timing.step_count()
    }

    /// The step duration used for lag analytics.
    pub fn fixed_dt(&self) -> Fix64 {
        self.fixed_dt
    }

    /// Duration bookkeeping shared with the flattened log.
    pub fn timing(&self) -> &CommandLog<P> {
        &self.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerolag_core::{OrderKey, PlayerId, Priority, TimeoutAction};
    use zerolag_test_utils::Nudge;

    fn cmd(player: u32, step: u64, amount: i32) -> Command<Nudge> {
        Command::new(PlayerId(player), StepId(step), Priority::MIN, Nudge::new(amount))
    }

    #[test]
    fn flatten_indexes_by_execution_step() {
        let mut net = NetworkCommandLog::fixed(Fix64::ONE);
        net.receive_command(StepId(5), cmd(1, 3, 1));
        net.receive_command(StepId(5), cmd(2, 4, 2));
        net.receive_command(StepId(7), cmd(1, 6, 3));

        let log = net.flatten_to_log();
        assert_eq!(log.commands_at(StepId(3)).len(), 1);
        assert_eq!(log.commands_at(StepId(4)).len(), 1);
        assert_eq!(log.commands_at(StepId(6)).len(), 1);
        assert!(log.commands_at(StepId(5)).is_empty());
    }

    #[test]
    fn flatten_applies_timeouts_after_commands() {
        let mut net = NetworkCommandLog::fixed(Fix64::ONE);
        let late = cmd(1, 10, 1);
        // Timeout arrives before its target.
        net.receive_timeout(
            StepId(12),
            TimeoutCommand::new(StepId(10), late.order_key(), TimeoutAction::ExecuteLater, StepId(14)),
        );
        net.receive_command(StepId(13), late);

        let log = net.flatten_to_log();
        assert!(log.commands_at(StepId(10)).is_empty());
        assert_eq!(log.commands_at(StepId(14)).len(), 1);
    }

    #[test]
    fn flatten_skips_orphan_timeouts() {
        let mut net = NetworkCommandLog::fixed(Fix64::ONE);
        net.receive_command(StepId(2), cmd(1, 1, 1));
        net.receive_timeout(
            StepId(3),
            TimeoutCommand::new(StepId(1), OrderKey(7), TimeoutAction::Cancel, StepId(1)),
        );
        let log = net.flatten_to_log();
        assert_eq!(log.command_count(), 1);
    }

    #[test]
    fn flatten_matches_live_log() {
        let commands: Vec<_> = (0..12).map(|i| cmd(i % 3, (i * 7 % 9) as u64, i as i32)).collect();
        let mut live = CommandLog::fixed(Fix64::ONE);
        let mut net = NetworkCommandLog::fixed(Fix64::ONE);
        for (i, c) in commands.iter().enumerate() {
            live.receive_command(c.clone());
            net.receive_command(StepId(i as u64), c.clone());
        }
        let cancel = TimeoutCommand::new(
            commands[4].step(),
            commands[4].order_key(),
            TimeoutAction::Cancel,
            commands[4].step(),
        );
        live.apply_timeout(&cancel);
        net.receive_timeout(StepId(20), cancel);

        let flat = net.flatten_to_log();
        for step in 0..10 {
            assert_eq!(flat.commands_at(StepId(step)), live.commands_at(StepId(step)));
        }
    }

    #[test]
    fn max_lag_covers_commands_and_timeouts() {
        let dt = Fix64::from_num(0.5);
        let mut net = NetworkCommandLog::fixed(dt);
        net.receive_command(StepId(5), cmd(1, 3, 1));
        net.receive_command(StepId(6), cmd(1, 8, 1));
        assert_eq!(net.calc_max_lag(), Fix64::from_num(1));

        let target = cmd(2, 1, 2);
        net.receive_command(StepId(2), target.clone());
        net.receive_timeout(StepId(9), TimeoutCommand::for_command(&target, StepId(10)));
        assert_eq!(net.calc_max_lag(), Fix64::from_num(4));
    }

    #[test]
    fn max_receiving_step() {
        let mut net: NetworkCommandLog<Nudge> = NetworkCommandLog::fixed(Fix64::ONE);
        assert_eq!(net.calc_max_receiving_step(), StepId::ZERO);
        net.receive_command(StepId(4), cmd(1, 1, 1));
        net.receive_timeout(
            StepId(9),
            TimeoutCommand::new(StepId(1), OrderKey(0), TimeoutAction::Cancel, StepId(1)),
        );
        assert_eq!(net.calc_max_receiving_step(), StepId(9));
        assert_eq!(net.receipt_steps(), vec![StepId(4), StepId(9)]);
    }
}
