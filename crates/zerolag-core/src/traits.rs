//! Capabilities an application provides to the engine.

use crate::command::{Command, CommandPayload};
use crate::id::StepId;
use crate::time::Fix64;

/// Deterministic simulation state.
///
/// The engine never looks inside a model. It only steps it, copies it
/// for snapshots, and compares hashes. Given the same starting state
/// and the same command slices, every method must produce bit-identical
/// results on every peer.
///
/// A model instance is held by exactly one role at a time (simulation
/// cursor, history snapshot, view model, or idle in the pool), so
/// implementations need no interior synchronization.
pub trait Model: Send + 'static {
    /// Payload type of the commands this model consumes.
    type Payload: CommandPayload;

    /// The step this model currently represents.
    fn step(&self) -> StepId;

    /// Apply the commands scheduled for the current step and advance the
    /// step counter by exactly one.
    ///
    /// `commands` is sorted by [`OrderKey`](crate::OrderKey) and every
    /// command in it targets [`step()`](Model::step).
    fn update_step(&mut self, dt: Fix64, commands: &[Command<Self::Payload>]);

    /// Free-running update that does not advance the step counter.
    ///
    /// Used to keep a presented model moving between published steps.
    fn update(&mut self, dt: Fix64, commands: &[Command<Self::Payload>]);

    /// Overwrite `self` with a deep value copy of `other`.
    fn copy_from(&mut self, other: &Self);

    /// Deterministic hash of the full state.
    fn state_hash(&self) -> u64;

    /// Called when the instance enters an active role (cursor or view model).
    fn enliven(&mut self) {}

    /// Called when the instance leaves an active role.
    fn mortify(&mut self) {}
}

/// Match-wide constants and the zero-model factory.
///
/// Shared read-only between the driving thread and the computation
/// thread of a threaded engine.
pub trait Settings: Send + Sync + 'static {
    /// The model type this match simulates.
    type Model: Model;

    /// Duration of one step in fixed-step mode.
    fn fixed_dt(&self) -> Fix64;

    /// Largest network lag the match promises to correct exactly.
    fn max_allowed_lag(&self) -> Fix64;

    /// [`max_allowed_lag`](Settings::max_allowed_lag) expressed in steps.
    fn max_lag_in_steps(&self) -> u64;

    /// A fresh model at step 0.
    ///
    /// `replication_allowed` is false for engines that never copy models
    /// (linear engines), letting applications skip copy bookkeeping.
    fn create_zero_model(&self, replication_allowed: bool) -> Self::Model;

    /// Deterministic hash of these settings, compared between peers and
    /// stored in replays.
    fn settings_hash(&self) -> u64;
}

/// Model type of a [`Settings`] implementation.
pub type ModelOf<S> = <S as Settings>::Model;

/// Command payload type of a [`Settings`] implementation.
pub type PayloadOf<S> = <<S as Settings>::Model as Model>::Payload;
