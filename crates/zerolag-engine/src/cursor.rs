//! The model instance being simulated forward.

use tracing::trace;
use zerolag_core::{Fix64, Model, StepId};

use crate::log::CommandLog;
use crate::observer::EngineObserver;

/// Owns the model a wave is currently advancing.
///
/// Every step re-reads its command list from the log, so commands merged
/// between two steps are always seen by the next one.
#[derive(Debug)]
pub struct SimulationCursor<M> {
    model: M,
}

impl<M: Model> SimulationCursor<M> {
    /// Wrap `model` as the cursor. The caller is responsible for having
    /// enlivened it.
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Step the cursor currently represents.
    #[inline]
    pub fn step(&self) -> StepId {
        self.model.step()
    }

    /// The cursor model.
    #[inline]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Advance one step with the commands `log` holds for the current
    /// step. Returns the new step.
    ///
    /// The step lasts `log.step_duration(step)`, or `fallback_dt` when
    /// the log has no duration recorded for it.
    pub fn step_once(
        &mut self,
        log: &CommandLog<M::Payload>,
        fallback_dt: Fix64,
        observer: &mut dyn EngineObserver<M>,
    ) -> StepId {
        let step = self.model.step();
        let commands = log.commands_at(step);
        let dt = log.step_duration(step).unwrap_or(fallback_dt);
        observer.before_step(&self.model, commands);
        self.model.update_step(dt, commands);
        observer.after_step(&self.model);
        trace!(step = step.0, commands = commands.len(), "stepped cursor");
        self.model.step()
    }

    /// Install `model` as the cursor and return the previous one.
    pub fn replace(&mut self, model: M) -> M {
        std::mem::replace(&mut self.model, model)
    }

    /// Release the cursor model.
    pub fn into_inner(self) -> M {
        self.model
    }
}
