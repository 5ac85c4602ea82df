//! Optional instrumentation hooks.
//!
//! An [`EngineObserver`] is invoked at fixed points of the stepping
//! loop. Every method has a no-op default, so an observer implements
//! only the hooks it cares about. Engines start with [`NoopObserver`].

use zerolag_core::{Command, Model, StepId};

/// Summary of a completed wave, passed to [`EngineObserver::after_wave`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaveReport {
    /// The present step the wave reached.
    pub present_step: StepId,
    /// Step the next wave starts from.
    pub next_start: StepId,
    /// Whether the finished cursor was handed to the view publisher.
    pub published: bool,
    /// Whether the next wave restarts before the present step.
    pub rolled_back: bool,
}

/// Hooks fired around steps and waves.
///
/// Runs on whichever thread does the stepping, which is the computation
/// thread for a threaded engine.
pub trait EngineObserver<M: Model>: Send {
    /// Before `model` applies `commands` and advances one step.
    fn before_step(&mut self, model: &M, commands: &[Command<M::Payload>]) {
        let _ = (model, commands);
    }

    /// After `model` advanced one step.
    fn after_step(&mut self, model: &M) {
        let _ = model;
    }

    /// When the first step of a wave is about to run.
    fn before_wave(&mut self, start: StepId, present_step: StepId) {
        let _ = (start, present_step);
    }

    /// When a wave reached the present step.
    fn after_wave(&mut self, report: &WaveReport) {
        let _ = report;
    }
}

/// Observer that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl<M: Model> EngineObserver<M> for NoopObserver {}
