//! Resimulating engine: prediction with rollback.
//!
//! The cursor runs ahead of confirmed input in waves. Each wave ends when
//! the cursor reaches the present step: the finished cursor becomes the
//! view model if it is newer, and the next wave restarts from the
//! newest snapshot at or before the earliest stale step.
//!
//! # Wave pacing
//!
//! A wave may simulate `simulation_speed` times faster than real time:
//! after `t` seconds of wall time since the wave began, at most
//! `floor((t * speed - simulated) / dt)` new steps run this update. A
//! debug step cap replaces the speed rule with a fixed count.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use zerolag_core::time::{span_of, whole_steps};
use zerolag_core::{Fix64, Model, ModelOf, Settings, StepId, TimeoutCommand};

use crate::config::{ConfigError, EngineConfig};
use crate::engine::{AdvancePolicy, Engine, EngineCore};
use crate::history::{AnchorSource, SnapshotHistory};
use crate::log::CommandLog;
use crate::observer::WaveReport;
use crate::timeout::TimeoutResolver;
use crate::view::{InlineView, ViewPublisher};

/// Advance policy with snapshot history, timeout resolution, and waves.
pub struct ResimulatingAdvance<M, V> {
    history: SnapshotHistory<M>,
    resolver: TimeoutResolver,
    publisher: V,
    wave_time: Fix64,
    wave_sim_time: Fix64,
    wave_started: bool,
}

impl<M: Model, V: ViewPublisher<M>> ResimulatingAdvance<M, V> {
    fn new(zero: M, config: &EngineConfig, publisher: V) -> Self {
        Self {
            history: SnapshotHistory::new(
                zero,
                config.dense_count,
                config.sparse_count,
                config.sparse_period,
            ),
            resolver: TimeoutResolver::with_cap(config.max_pending_timeouts),
            publisher,
            wave_time: Fix64::ZERO,
            wave_sim_time: Fix64::ZERO,
            wave_started: false,
        }
    }

    /// Rollback anchors.
    pub fn history(&self) -> &SnapshotHistory<M> {
        &self.history
    }

    /// Timeouts waiting for their targets.
    pub fn pending_timeouts(&self) -> &TimeoutResolver {
        &self.resolver
    }

    /// The view publisher.
    pub fn publisher(&self) -> &V {
        &self.publisher
    }

    fn present_step<S: Settings<Model = M>>(core: &EngineCore<S>) -> StepId {
        StepId(whole_steps(core.present_time, core.settings.fixed_dt()))
    }

    /// Resolve pending timeouts and extend the log to the present step.
    fn sync_log<S: Settings<Model = M>>(&mut self, core: &mut EngineCore<S>) -> StepId {
        for resolution in self.resolver.resolve(&mut core.log) {
            let target = resolution.command.step();
            core.last_actual_step = core.last_actual_step.min(target);
            core.metrics.timeouts_resolved += 1;
            debug!(
                target_step = target.0,
                action = ?resolution.timeout.action,
                "timeout resolved"
            );
            if let Some(moved) = resolution.into_rescheduled() {
                core.receive_command(moved);
            }
        }
        let present = core.clamp_present(Self::present_step(core));
        core.log.extend_to(present.0);
        present
    }

    /// Steps the speed rule allows this update.
    fn steps_allowed<S: Settings<Model = M>>(&mut self, core: &EngineCore<S>, dt: Fix64) -> u64 {
        self.wave_time = self.wave_time.saturating_add(dt);
        if let Some(cap) = core.config.max_steps_per_update {
            return u64::from(cap);
        }
        let budget = self
            .wave_time
            .saturating_mul(core.config.simulation_speed)
            .saturating_sub(self.wave_sim_time);
        whole_steps(budget, core.settings.fixed_dt())
    }

    /// Advance the cursor one step and record it.
    fn wave_step<S: Settings<Model = M>>(&mut self, core: &mut EngineCore<S>, present: StepId) {
        if !self.wave_started {
            self.wave_started = true;
            core.observer.before_wave(core.cursor.step(), present);
        }
        let updating_actual = core.last_actual_step >= core.cursor.step();
        let next = core.step_cursor();
        self.history
            .record(next, core.cursor.model(), &mut core.pool);
        if updating_actual {
            core.last_actual_step = core.last_actual_step.max(next);
        }
        if next == present {
            self.complete_wave(core, present);
        }
    }

    /// Publish the finished cursor and pick the next wave's start.
    fn complete_wave<S: Settings<Model = M>>(&mut self, core: &mut EngineCore<S>, present: StepId) {
        let anchor = self.history.anchor(core.last_actual_step);
        let anchor_step = anchor.step;
        let cursor_step = core.cursor.step();
        let mut published = false;

        if self.publisher.accepts(cursor_step) {
            let fresh = core.pool.checkout_live(anchor.model);
            let finished = core.cursor.replace(fresh);
            match self.publisher.publish(finished) {
                Ok(spare) => {
                    published = true;
                    core.metrics.view_models_published += 1;
                    debug!(step = cursor_step.0, "view model published");
                    if let Some(spare) = spare {
                        core.pool.retire(spare);
                    }
                }
                Err(rejected) => core.pool.retire(rejected),
            }
        } else if anchor_step != cursor_step {
            let fresh = core.pool.checkout_live(anchor.model);
            let stale = core.cursor.replace(fresh);
            core.pool.retire(stale);
        }

        let rolled_back = anchor_step < cursor_step;
        if rolled_back {
            core.metrics.rollbacks += 1;
            debug!(
                anchor = anchor_step.0,
                discarded = cursor_step.0,
                source = ?anchor.source,
                "rolling back"
            );
            if anchor.source != AnchorSource::Dense {
                debug!(
                    last_actual = core.last_actual_step.0,
                    anchor = anchor_step.0,
                    "correction beyond dense history"
                );
            }
        } else {
            core.metrics.anchor_reuses += 1;
        }
        core.metrics.waves_completed += 1;

        self.wave_time = Fix64::ZERO;
        self.wave_sim_time = Fix64::ZERO;
        self.wave_started = false;
        core.observer.after_wave(&WaveReport {
            present_step: present,
            next_start: anchor_step,
            published,
            rolled_back,
        });
    }
}

impl<S, V> AdvancePolicy<S> for ResimulatingAdvance<ModelOf<S>, V>
where
    S: Settings,
    V: ViewPublisher<ModelOf<S>>,
{
    fn present_step_unclamped(&self, core: &EngineCore<S>) -> StepId {
        Self::present_step(core)
    }

    fn on_present_time_added(&mut self, core: &mut EngineCore<S>, dt: Fix64) {
        let present = self.sync_log(core);
        let allowed = self.steps_allowed(core, dt);
        let count = present.steps_since(core.cursor.step()).min(allowed);
        self.wave_sim_time = self
            .wave_sim_time
            .saturating_add(span_of(core.settings.fixed_dt(), count));
        for _ in 0..count {
            if core.cursor.step() >= present {
                break;
            }
            self.wave_step(core, present);
        }
        if !core.is_frozen() {
            self.publisher.free_run(dt);
        }
    }

    fn receive_timeout(&mut self, core: &mut EngineCore<S>, timeout: TimeoutCommand) {
        if let Some(discarded) = self.resolver.receive(timeout) {
            core.metrics.timeouts_discarded += 1;
            warn!(
                target_step = discarded.target_step.0,
                target_key = %discarded.target_key,
                "pending timeout cap reached, oldest timeout discarded"
            );
        }
    }

    fn catch_up_steps(&self, core: &EngineCore<S>) -> u64 {
        core.config.catch_up_steps(core.settings.max_lag_in_steps())
    }
}

impl<M: Model, V> fmt::Debug for ResimulatingAdvance<M, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResimulatingAdvance")
            .field("history", &self.history)
            .field("pending_timeouts", &self.resolver.len())
            .field("wave_time", &self.wave_time)
            .field("wave_sim_time", &self.wave_sim_time)
            .finish()
    }
}

/// Engine predicting ahead of input and rolling back on corrections.
pub type ResimulatingEngine<S> = Engine<S, ResimulatingAdvance<ModelOf<S>, InlineView<ModelOf<S>>>>;

impl<S, V> Engine<S, ResimulatingAdvance<ModelOf<S>, V>>
where
    S: Settings,
    V: ViewPublisher<ModelOf<S>>,
{
    /// Build an engine around a custom view publisher.
    pub fn with_publisher(
        settings: Arc<S>,
        config: EngineConfig,
        publisher: V,
    ) -> Result<Self, ConfigError> {
        let log = CommandLog::fixed(settings.fixed_dt());
        let mut core = EngineCore::new(settings, config, log, true)?;
        let zero = core.pool.create();
        let advance = ResimulatingAdvance::new(zero, &core.config, publisher);
        Ok(Self::from_parts(core, advance))
    }

    /// Replace present time outright. Used by a computation thread that
    /// reads present time from a shared cell.
    pub(crate) fn set_present_time(&mut self, present_time: Fix64) {
        self.core.present_time = present_time;
    }

    /// Resolve timeouts and extend the log to present. Returns the
    /// present step.
    pub(crate) fn sync_to_present(&mut self) -> StepId {
        if self.core.stopped {
            return self.core.cursor.step();
        }
        self.advance.sync_log(&mut self.core)
    }

    /// Run one wave step if the cursor is behind `present`.
    ///
    /// Returns whether a step ran.
    pub(crate) fn step_toward(&mut self, present: StepId) -> bool {
        if self.core.stopped || self.core.cursor.step() >= present {
            return false;
        }
        self.advance.wave_step(&mut self.core, present);
        true
    }
}

impl<S: Settings> Engine<S, ResimulatingAdvance<ModelOf<S>, InlineView<ModelOf<S>>>> {
    /// A resimulating engine with history sized from `settings`.
    pub fn new(settings: S) -> Result<Self, ConfigError> {
        let config = EngineConfig::for_settings(&settings);
        Self::with_config(settings, config)
    }

    /// A resimulating engine with explicit configuration.
    pub fn with_config(settings: S, config: EngineConfig) -> Result<Self, ConfigError> {
        let settings = Arc::new(settings);
        let mut view = settings.create_zero_model(true);
        view.enliven();
        Self::with_publisher(settings, config, InlineView::new(view))
    }

    /// The newest published model, free-run between publications.
    pub fn view_model(&self) -> &ModelOf<S> {
        self.advance.publisher.model()
    }
}
