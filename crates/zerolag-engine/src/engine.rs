//! The stepping core shared by every engine variant.
//!
//! [`Engine`] pairs an [`EngineCore`] (command log, model pool, cursor,
//! present time, debug limits, metrics) with an [`AdvancePolicy`] that
//! decides what happens when present time moves. The linear and
//! resimulating engines are the two policies; the threaded engine drives
//! a resimulating engine from its own loop.

use std::fmt;
use std::sync::Arc;

use tracing::warn;
use zerolag_core::{Command, Fix64, Model, ModelOf, PayloadOf, Settings, StepId, TimeoutCommand};

use crate::config::{ConfigError, EngineConfig};
use crate::cursor::SimulationCursor;
use crate::log::CommandLog;
use crate::metrics::EngineMetrics;
use crate::observer::{EngineObserver, NoopObserver};
use crate::pool::ModelPool;

// ── EngineCore ─────────────────────────────────────────────────────

/// State every engine variant owns.
pub struct EngineCore<S: Settings> {
    pub(crate) settings: Arc<S>,
    pub(crate) config: EngineConfig,
    pub(crate) log: CommandLog<PayloadOf<S>>,
    pub(crate) pool: ModelPool<S>,
    pub(crate) cursor: SimulationCursor<ModelOf<S>>,
    /// Earliest step whose simulated result may be stale.
    pub(crate) last_actual_step: StepId,
    pub(crate) present_time: Fix64,
    pub(crate) stopped: bool,
    pub(crate) max_input_step: Option<StepId>,
    pub(crate) max_present_step: Option<StepId>,
    pub(crate) observer: Box<dyn EngineObserver<ModelOf<S>>>,
    pub(crate) metrics: EngineMetrics,
}

impl<S: Settings> EngineCore<S> {
    /// Validate `config` and build a core with a live zero-model cursor.
    pub(crate) fn new(
        settings: Arc<S>,
        config: EngineConfig,
        log: CommandLog<PayloadOf<S>>,
        replication_allowed: bool,
    ) -> Result<Self, ConfigError> {
        config.validate(settings.as_ref())?;
        let mut pool = ModelPool::new(
            Arc::clone(&settings),
            replication_allowed,
            config.model_pool_size,
        );
        let mut cursor = pool.create();
        cursor.enliven();
        Ok(Self {
            settings,
            config,
            log,
            pool,
            cursor: SimulationCursor::new(cursor),
            last_actual_step: StepId::ZERO,
            present_time: Fix64::ZERO,
            stopped: false,
            max_input_step: None,
            max_present_step: None,
            observer: Box::new(NoopObserver),
            metrics: EngineMetrics::default(),
        })
    }

    /// Merge `command` into the log and mark its step stale.
    ///
    /// Dropped if the engine is stopped or the command lies beyond the
    /// debug input horizon.
    pub(crate) fn receive_command(&mut self, command: Command<PayloadOf<S>>) {
        if self.stopped {
            self.metrics.commands_dropped += 1;
            return;
        }
        if let Some(horizon) = self.max_input_step {
            if command.step() > horizon {
                warn!(
                    step = command.step().0,
                    horizon = horizon.0,
                    "command beyond debug input horizon dropped"
                );
                self.metrics.commands_dropped += 1;
                return;
            }
        }
        self.last_actual_step = self.last_actual_step.min(command.step());
        self.log.receive_command(command);
        self.metrics.commands_received += 1;
    }

    /// `step` limited by the debug freeze, if one is set.
    pub(crate) fn clamp_present(&self, step: StepId) -> StepId {
        match self.max_present_step {
            Some(max) => step.min(max),
            None => step,
        }
    }

    /// Advance the cursor by one step using the logged commands.
    pub(crate) fn step_cursor(&mut self) -> StepId {
        let next = self.cursor.step_once(
            &self.log,
            self.settings.fixed_dt(),
            self.observer.as_mut(),
        );
        self.metrics.steps_simulated += 1;
        next
    }

    /// The match settings.
    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The per-execution-step command log.
    pub fn command_log(&self) -> &CommandLog<PayloadOf<S>> {
        &self.log
    }

    /// Step of the model currently being simulated.
    pub fn cursor_step(&self) -> StepId {
        self.cursor.step()
    }

    /// Accumulated present time.
    pub fn present_time(&self) -> Fix64 {
        self.present_time
    }

    /// Whether a debug freeze is active.
    pub fn is_frozen(&self) -> bool {
        self.max_present_step.is_some()
    }
}

// ── AdvancePolicy ──────────────────────────────────────────────────

/// How an engine reacts to present time moving forward.
///
/// Implemented by [`LinearAdvance`](crate::linear::LinearAdvance) and
/// [`ResimulatingAdvance`](crate::resim::ResimulatingAdvance).
pub trait AdvancePolicy<S: Settings>: Send {
    /// The step matching the core's present time, before any debug clamp.
    fn present_step_unclamped(&self, core: &EngineCore<S>) -> StepId;

    /// Simulate toward present after `dt` was added to present time.
    fn on_present_time_added(&mut self, core: &mut EngineCore<S>, dt: Fix64);

    /// Accept a timeout. Policies without resimulation ignore it.
    fn receive_timeout(&mut self, core: &mut EngineCore<S>, timeout: TimeoutCommand) {
        let _ = (core, timeout);
    }

    /// Steps the present may lead the debug input horizon while frozen.
    fn catch_up_steps(&self, core: &EngineCore<S>) -> u64;
}

// ── Engine ─────────────────────────────────────────────────────────

/// A stepping core driven by an advance policy.
///
/// Every operation is a no-op once [`stop`](Engine::stop) was called.
pub struct Engine<S: Settings, A> {
    pub(crate) core: EngineCore<S>,
    pub(crate) advance: A,
}

impl<S: Settings, A: AdvancePolicy<S>> Engine<S, A> {
    pub(crate) fn from_parts(core: EngineCore<S>, advance: A) -> Self {
        Self { core, advance }
    }

    /// Replace the instrumentation observer.
    pub fn with_observer(mut self, observer: impl EngineObserver<ModelOf<S>> + 'static) -> Self {
        self.core.observer = Box::new(observer);
        self
    }

    /// Merge a command into the log.
    ///
    /// Any step at or after the command's step becomes stale and is
    /// resimulated by a resimulating engine.
    pub fn receive_command(&mut self, command: Command<PayloadOf<S>>) {
        self.core.receive_command(command);
    }

    /// Hand a timeout to the advance policy.
    pub fn receive_timeout(&mut self, timeout: TimeoutCommand) {
        if self.core.stopped {
            return;
        }
        self.advance.receive_timeout(&mut self.core, timeout);
    }

    /// Move present time forward by `dt` and simulate toward it.
    pub fn advance_present_time(&mut self, dt: Fix64) {
        if self.core.stopped {
            return;
        }
        self.core.present_time = self.core.present_time.saturating_add(dt);
        self.advance.on_present_time_added(&mut self.core, dt);
    }

    /// Stop the engine. Terminal.
    pub fn stop(&mut self) {
        self.core.stopped = true;
    }

    /// Whether [`stop`](Engine::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.core.stopped
    }

    /// Duration of `step`, if the log knows it.
    pub fn get_step_duration(&self, step: StepId) -> Option<Fix64> {
        self.core.log.step_duration(step)
    }

    /// The step matching present time, limited by any debug freeze.
    pub fn present_step(&self) -> StepId {
        self.core
            .clamp_present(self.advance.present_step_unclamped(&self.core))
    }

    /// Earliest step whose simulated result may be stale.
    pub fn last_actual_step(&self) -> StepId {
        self.core.last_actual_step
    }

    /// The per-execution-step command log.
    pub fn command_log(&self) -> &CommandLog<PayloadOf<S>> {
        &self.core.log
    }

    /// Cumulative counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.core.metrics
    }

    /// Shared state of the engine.
    pub fn core(&self) -> &EngineCore<S> {
        &self.core
    }

    /// The advance policy.
    pub fn policy(&self) -> &A {
        &self.advance
    }

    /// Freeze input at `max_input_step`.
    ///
    /// Commands for later steps are dropped, and the present step stops
    /// advancing once it leads the horizon by the policy's catch-up
    /// allowance. The view model is not free-run while frozen.
    pub fn debug_set_freeze(&mut self, max_input_step: StepId) {
        let catch_up = self.advance.catch_up_steps(&self.core);
        self.core.max_input_step = Some(max_input_step);
        self.core.max_present_step = Some(max_input_step.after(catch_up));
    }

    /// Lift a debug freeze.
    pub fn debug_clear_freeze(&mut self) {
        self.core.max_input_step = None;
        self.core.max_present_step = None;
    }

    /// Whether a debug freeze is active.
    pub fn is_frozen(&self) -> bool {
        self.core.is_frozen()
    }

    /// Simulate exactly `steps` per update instead of pacing by speed.
    /// `None` restores speed pacing.
    pub fn debug_set_max_steps_per_update(&mut self, steps: Option<u32>) {
        self.core.config.max_steps_per_update = steps;
    }
}

impl<S: Settings, A: fmt::Debug> fmt::Debug for Engine<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("present_time", &self.core.present_time)
            .field("cursor_step", &self.core.cursor.step())
            .field("last_actual_step", &self.core.last_actual_step)
            .field("stopped", &self.core.stopped)
            .field("max_present_step", &self.core.max_present_step)
            .field("log", &self.core.log)
            .field("policy", &self.advance)
            .finish()
    }
}
