//! Rollback behavior of the resimulating engine.
//!
//! Each scenario drives a [`ResimulatingEngine`] one present step per
//! update, delivers commands late, and checks that the view model ends
//! up identical to a continuous simulation of the final log.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use zerolag_core::{Command, Fix64, Model, PlayerId, Priority, StepId};
use zerolag_engine::{
    AnchorSource, CommandLog, Engine, EngineConfig, EngineObserver, ResimulatingAdvance,
    ResimulatingEngine, ViewPublisher, WaveReport,
};
use zerolag_test_utils::{random_arrivals, random_commands, CounterModel, CounterSettings, Nudge};

fn dt() -> Fix64 {
    CounterSettings::default().fixed_dt
}

fn nudge(step: u64, amount: i32) -> Command<Nudge> {
    Command::new(PlayerId(1), StepId(step), Priority::MIN, Nudge::new(amount))
}

/// Simulate `log` from step 0 without interruption.
fn continuous(log: &CommandLog<Nudge>, steps: u64) -> CounterModel {
    let mut model = CounterModel::zero();
    for _ in 0..steps {
        let step = model.step();
        model.update_step(dt(), log.commands_at(step));
    }
    model
}

fn advance_steps(engine: &mut ResimulatingEngine<CounterSettings>, steps: u64) {
    for _ in 0..steps {
        engine.advance_present_time(dt());
    }
}

// ── Dense rollback ─────────────────────────────────────────────

#[test]
fn late_command_rolls_back_to_dense_snapshot() {
    let mut engine = ResimulatingEngine::new(CounterSettings::default()).unwrap();
    advance_steps(&mut engine, 16);
    assert_eq!(engine.view_model().step(), StepId(16));
    assert_eq!(engine.metrics().rollbacks, 0);

    engine.receive_command(nudge(10, 7));
    assert_eq!(engine.last_actual_step(), StepId(10));

    // The in-flight wave still reaches present and is published, then
    // the next wave restarts from the snapshot at step 10.
    advance_steps(&mut engine, 1);
    assert_eq!(engine.view_model().step(), StepId(17));
    assert_eq!(engine.view_model().total(), 0);
    assert_eq!(engine.core().cursor_step(), StepId(10));
    assert_eq!(engine.metrics().rollbacks, 1);

    advance_steps(&mut engine, 1);
    assert_eq!(engine.view_model().step(), StepId(18));
    assert_eq!(engine.view_model().total(), 7);
    assert_eq!(
        engine.view_model().state_hash(),
        continuous(engine.command_log(), 18).state_hash()
    );
    assert_eq!(engine.last_actual_step(), StepId(18));
}

#[test]
fn anchor_reuse_skips_resimulation() {
    let mut engine = ResimulatingEngine::new(CounterSettings::default()).unwrap();
    advance_steps(&mut engine, 12);
    let metrics = engine.metrics();
    assert_eq!(metrics.waves_completed, 12);
    assert_eq!(metrics.anchor_reuses, 12);
    assert_eq!(metrics.rollbacks, 0);
    assert_eq!(metrics.steps_simulated, 12);
}

// ── Zero-model fallback ────────────────────────────────────────

#[test]
fn correction_beyond_history_restarts_from_zero() {
    let config = EngineConfig::with_history(8, 2, 8);
    let mut engine = ResimulatingEngine::with_config(CounterSettings::default(), config).unwrap();
    advance_steps(&mut engine, 20);

    let history = engine.policy().history();
    assert_eq!(
        history.dense_steps().map(|s| s.0).collect::<Vec<_>>(),
        (13..=20).collect::<Vec<_>>()
    );
    assert_eq!(history.sparse_steps().map(|s| s.0).collect::<Vec<_>>(), vec![8, 16]);
    assert_eq!(history.anchor(StepId(5)).source, AnchorSource::Zero);

    engine.receive_command(nudge(5, 3));
    advance_steps(&mut engine, 1);
    assert_eq!(engine.core().cursor_step(), StepId::ZERO);

    advance_steps(&mut engine, 10);
    assert_eq!(engine.view_model().total(), 3);
    let step = engine.view_model().step().0;
    assert_eq!(
        engine.view_model().state_hash(),
        continuous(engine.command_log(), step).state_hash()
    );
}

// ── Observer ───────────────────────────────────────────────────

#[derive(Clone, Default)]
struct WaveLog(Arc<Mutex<Vec<WaveReport>>>);

impl EngineObserver<CounterModel> for WaveLog {
    fn after_wave(&mut self, report: &WaveReport) {
        self.0.lock().unwrap().push(*report);
    }
}

#[test]
fn observer_sees_rollback_waves() {
    let waves = WaveLog::default();
    let mut engine = ResimulatingEngine::new(CounterSettings::default())
        .unwrap()
        .with_observer(waves.clone());
    advance_steps(&mut engine, 6);
    engine.receive_command(nudge(3, 1));
    advance_steps(&mut engine, 2);
    assert_eq!(engine.metrics().waves_completed, 8);
    assert_eq!(engine.metrics().rollbacks, 1);

    let reports = waves.0.lock().unwrap();
    assert_eq!(reports.len(), 8);
    assert_eq!(
        reports[6],
        WaveReport {
            present_step: StepId(7),
            next_start: StepId(3),
            published: true,
            rolled_back: true,
        }
    );
    assert_eq!(
        reports[7],
        WaveReport {
            present_step: StepId(8),
            next_start: StepId(8),
            published: true,
            rolled_back: false,
        }
    );
}

// ── Publication ────────────────────────────────────────────────

/// A view that looks willing but turns every model away, as when the
/// driving thread takes a newer model between the check and the offer.
struct RefusingView;

impl ViewPublisher<CounterModel> for RefusingView {
    fn accepts(&self, _step: StepId) -> bool {
        true
    }

    fn publish(&mut self, model: CounterModel) -> Result<Option<CounterModel>, CounterModel> {
        Err(model)
    }
}

#[test]
fn refused_publications_are_not_counted() {
    let settings = Arc::new(CounterSettings::default());
    let config = EngineConfig::for_settings(settings.as_ref());
    let mut engine = Engine::<CounterSettings, ResimulatingAdvance<CounterModel, RefusingView>>::with_publisher(
        settings, config, RefusingView,
    )
    .unwrap();
    engine.receive_command(nudge(2, 3));
    for _ in 0..8 {
        engine.advance_present_time(dt());
    }

    let metrics = engine.metrics();
    assert!(metrics.waves_completed > 0);
    assert_eq!(metrics.view_models_published, 0);
}

// ── Properties ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whatever the arrival pattern, once input stops the view model
    /// matches a continuous simulation of the final log.
    #[test]
    fn late_arrivals_converge_to_continuous_simulation(
        seed in any::<u64>(),
        count in 1usize..40,
        max_lag in 0u64..12,
    ) {
        let last_step = 40;
        let commands = random_commands(seed, 3, last_step, count);
        let arrivals = random_arrivals(seed ^ 0x5eed, &commands, max_lag);

        let mut engine = ResimulatingEngine::new(CounterSettings::default()).unwrap();
        let mut next = arrivals.iter().peekable();
        for present in 0..=last_step + max_lag {
            while let Some(arrival) = next.next_if(|a| a.received_at.0 <= present) {
                engine.receive_command(arrival.command.clone());
            }
            engine.advance_present_time(dt());
        }
        advance_steps(&mut engine, 40);

        let view = engine.view_model();
        prop_assert_eq!(engine.command_log().command_count(), count);
        prop_assert_eq!(
            view.state_hash(),
            continuous(engine.command_log(), view.step().0).state_hash()
        );
        let history = engine.policy().history();
        prop_assert!(history.dense_len() <= engine.core().config().dense_count);
        prop_assert!(history.sparse_len() <= engine.core().config().sparse_count);
    }
}
