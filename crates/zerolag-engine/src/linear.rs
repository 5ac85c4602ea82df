//! Linear engine: no history, no resimulation.
//!
//! The cursor trails the present step by a fixed input delay and never
//! moves backward. Suitable for an authority that accepts input delay
//! instead of rollback, a single-player match, or replaying a finished
//! log. The cursor is the view model.

use std::sync::Arc;

use zerolag_core::time::whole_steps;
use zerolag_core::{Fix64, ModelOf, PayloadOf, Settings, StepId};

use crate::config::{ConfigError, EngineConfig};
use crate::engine::{AdvancePolicy, Engine, EngineCore};
use crate::log::CommandLog;

/// Advance policy stepping the cursor straight to
/// `present_step - delay - 1`.
#[derive(Clone, Copy, Debug)]
pub struct LinearAdvance {
    delay: u64,
}

impl LinearAdvance {
    /// A policy trailing the present by `delay` steps.
    pub fn new(delay: u64) -> Self {
        Self { delay }
    }

    /// Input delay in steps.
    pub fn delay(&self) -> u64 {
        self.delay
    }
}

impl<S: Settings> AdvancePolicy<S> for LinearAdvance {
    fn present_step_unclamped(&self, core: &EngineCore<S>) -> StepId {
        match core.log.fixed_dt() {
            Some(dt) => StepId(whole_steps(core.present_time, dt)),
            None => StepId(core.log.step_count()),
        }
    }

    fn on_present_time_added(&mut self, core: &mut EngineCore<S>, dt: Fix64) {
        match core.log.fixed_dt() {
            None => core.log.add_step(dt),
            Some(fixed) => {
                while core.present_time.saturating_sub(core.log.saved_time()) >= fixed {
                    core.log.add_step(fixed);
                }
            }
        }
        let present = core.clamp_present(self.present_step_unclamped(core));
        let target = present.before(self.delay.saturating_add(1));
        while core.cursor.step() < target {
            core.step_cursor();
        }
    }

    fn catch_up_steps(&self, _core: &EngineCore<S>) -> u64 {
        1
    }
}

/// Engine stepping linearly with a fixed input delay.
pub type LinearEngine<S> = Engine<S, LinearAdvance>;

impl<S: Settings> Engine<S, LinearAdvance> {
    fn linear(settings: S, log: CommandLog<PayloadOf<S>>, delay: u64) -> Result<Self, ConfigError> {
        let core = EngineCore::new(Arc::new(settings), EngineConfig::linear(), log, false)?;
        Ok(Self::from_parts(core, LinearAdvance::new(delay)))
    }

    /// An authority stepping at the fixed rate and executing input
    /// `delay` steps behind the present.
    pub fn server(settings: S, delay: u64) -> Result<Self, ConfigError> {
        let log = CommandLog::fixed(settings.fixed_dt());
        Self::linear(settings, log, delay)
    }

    /// A single-player match: every present-time advance logs one step
    /// of exactly that duration, with no input delay.
    pub fn single_player(settings: S) -> Result<Self, ConfigError> {
        Self::linear(settings, CommandLog::variable(), 0)
    }

    /// An engine replaying a recorded log, at the fixed rate when
    /// `fixed_dt` is set and with per-advance durations otherwise.
    pub fn replay(settings: S, fixed_dt: bool) -> Result<Self, ConfigError> {
        let log = if fixed_dt {
            CommandLog::fixed(settings.fixed_dt())
        } else {
            CommandLog::variable()
        };
        Self::linear(settings, log, 0)
    }

    /// The cursor, which doubles as the view model.
    pub fn view_model(&self) -> &ModelOf<S> {
        self.core.cursor.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerolag_core::{Command, Model, PlayerId, Priority};
    use zerolag_test_utils::{CounterSettings, Nudge};

    fn dt() -> Fix64 {
        Fix64::from_num(0.125)
    }

    fn settings() -> CounterSettings {
        CounterSettings::new(dt(), Fix64::from_num(0.5))
    }

    #[test]
    fn server_trails_present_by_delay() {
        let mut engine = LinearEngine::server(settings(), 2).unwrap();
        engine.advance_present_time(Fix64::from_num(1));
        assert_eq!(engine.present_step(), StepId(8));
        assert_eq!(engine.command_log().step_count(), 8);
        assert_eq!(engine.view_model().step(), StepId(5));
    }

    #[test]
    fn server_accumulates_partial_steps() {
        let mut engine = LinearEngine::server(settings(), 0).unwrap();
        engine.advance_present_time(Fix64::from_num(0.0625));
        assert_eq!(engine.command_log().step_count(), 0);
        engine.advance_present_time(Fix64::from_num(0.0625));
        assert_eq!(engine.command_log().step_count(), 1);
        assert_eq!(engine.present_step(), StepId(1));
        assert_eq!(engine.view_model().step(), StepId::ZERO);
    }

    #[test]
    fn single_player_logs_one_step_per_advance() {
        let mut engine = LinearEngine::single_player(settings()).unwrap();
        engine.advance_present_time(Fix64::from_num(0.25));
        engine.advance_present_time(Fix64::from_num(0.5));
        assert_eq!(engine.present_step(), StepId(2));
        assert_eq!(engine.view_model().step(), StepId(1));
        assert_eq!(engine.get_step_duration(StepId(1)), Some(Fix64::from_num(0.5)));
        assert_eq!(engine.get_step_duration(StepId(2)), None);
    }

    #[test]
    fn delayed_input_is_executed() {
        let mut engine = LinearEngine::server(settings(), 1).unwrap();
        engine.receive_command(Command::new(PlayerId(1), StepId(2), Priority::MIN, Nudge::new(4)));
        engine.advance_present_time(Fix64::from_num(0.5));
        assert_eq!(engine.view_model().step(), StepId(2));
        assert_eq!(engine.view_model().total(), 0);
        engine.advance_present_time(dt());
        assert_eq!(engine.view_model().step(), StepId(3));
        assert_eq!(engine.view_model().total(), 4);
    }

    #[test]
    fn timeouts_are_ignored() {
        let mut engine = LinearEngine::server(settings(), 0).unwrap();
        let command = Command::new(PlayerId(1), StepId(1), Priority::MIN, Nudge::new(2));
        engine.receive_command(command.clone());
        engine.receive_timeout(zerolag_core::TimeoutCommand::for_command(&command, StepId(3)));
        engine.advance_present_time(Fix64::from_num(1));
        assert_eq!(engine.command_log().commands_at(StepId(1)), &[command]);
        assert_eq!(engine.view_model().total(), 2);
    }

    #[test]
    fn freeze_holds_present_one_past_horizon() {
        let mut engine = LinearEngine::server(settings(), 0).unwrap();
        engine.debug_set_freeze(StepId(3));
        engine.advance_present_time(Fix64::from_num(2));
        assert_eq!(engine.present_step(), StepId(4));
        assert_eq!(engine.view_model().step(), StepId(3));

        engine.receive_command(Command::new(PlayerId(1), StepId(9), Priority::MIN, Nudge::new(1)));
        assert_eq!(engine.command_log().command_count(), 0);
        assert_eq!(engine.metrics().commands_dropped, 1);
    }

    #[test]
    fn stopped_engine_ignores_everything() {
        let mut engine = LinearEngine::server(settings(), 0).unwrap();
        engine.stop();
        engine.receive_command(Command::new(PlayerId(1), StepId(1), Priority::MIN, Nudge::new(1)));
        engine.advance_present_time(Fix64::from_num(1));
        assert!(engine.is_stopped());
        assert_eq!(engine.command_log().command_count(), 0);
        assert_eq!(engine.metrics().commands_dropped, 1);
        assert_eq!(engine.view_model().step(), StepId::ZERO);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let bad = CounterSettings::new(Fix64::ZERO, Fix64::ONE);
        assert!(matches!(
            LinearEngine::server(bad, 0),
            Err(ConfigError::InvalidFixedDt { .. })
        ));
    }
}
