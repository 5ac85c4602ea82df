//! View-model publication.
//!
//! When a wave reaches the present step the engine offers the finished
//! cursor to a [`ViewPublisher`]. [`InlineView`] keeps the view model
//! next to the engine for single-threaded use. [`HandoffPublisher`]
//! passes it across a thread boundary through a [`ViewModelHandoff`].
//!
//! # Handoff protocol
//!
//! ```text
//! computation thread                 ViewModelHandoff               driving thread
//!        |                        { pending, displayed_step }              |
//!        |--offer(cursor)------------->|                                   |
//!        |   accepted if step >        | pending := cursor                 |
//!        |   displayed and pending     |                                   |
//!        |<--previous pending (spare)--|                                   |
//!        |                             |<--take_newer(&mut displayed)------|
//!        |                             | swap if pending.step >            |
//!        |                             | displayed.step                    |
//! ```
//!
//! The driving thread only ever swaps in a strictly newer model, so the
//! step it observes never decreases.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use zerolag_core::{Fix64, Model, StepId};

/// Receives finished cursors at the end of each wave.
pub trait ViewPublisher<M: Model>: Send {
    /// Whether a model at `step` would replace the current view.
    fn accepts(&self, step: StepId) -> bool;

    /// Take ownership of `model` as the new view.
    ///
    /// On success returns the replaced view, if any, for the engine to
    /// retire. A model that is no longer newer comes back as `Err`.
    fn publish(&mut self, model: M) -> Result<Option<M>, M>;

    /// Advance the presented model between published steps.
    fn free_run(&mut self, dt: Fix64) {
        let _ = dt;
    }
}

// ── InlineView ─────────────────────────────────────────────────────

/// View model owned by the engine itself.
#[derive(Debug)]
pub struct InlineView<M> {
    model: M,
}

impl<M: Model> InlineView<M> {
    /// Start with `model`, normally a live zero model.
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// The current view model.
    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: Model> ViewPublisher<M> for InlineView<M> {
    fn accepts(&self, step: StepId) -> bool {
        self.model.step() < step
    }

    fn publish(&mut self, model: M) -> Result<Option<M>, M> {
        if !self.accepts(model.step()) {
            return Err(model);
        }
        Ok(Some(std::mem::replace(&mut self.model, model)))
    }

    fn free_run(&mut self, dt: Fix64) {
        self.model.update(dt, &[]);
    }
}

// ── ViewModelHandoff ───────────────────────────────────────────────

struct HandoffSlot<M> {
    pending: Option<M>,
    displayed_step: StepId,
}

impl<M: Model> HandoffSlot<M> {
    /// Step of a pending model the driving thread has not taken yet.
    ///
    /// After a swap the slot holds the previously displayed model, which
    /// is a spare rather than a pending view.
    fn unconsumed_step(&self) -> Option<StepId> {
        self.pending
            .as_ref()
            .map(Model::step)
            .filter(|step| *step > self.displayed_step)
    }

    fn accepts(&self, step: StepId) -> bool {
        let newest = self.unconsumed_step().unwrap_or(self.displayed_step);
        newest < step
    }
}

/// Lock-guarded slot moving view models from the computation thread to
/// the driving thread.
pub struct ViewModelHandoff<M> {
    slot: Mutex<HandoffSlot<M>>,
}

impl<M: Model> ViewModelHandoff<M> {
    /// An empty handoff; the driving thread starts at `displayed_step`.
    pub fn new(displayed_step: StepId) -> Self {
        Self {
            slot: Mutex::new(HandoffSlot {
                pending: None,
                displayed_step,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandoffSlot<M>> {
        // The slot holds no invariant a panicking holder could break.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a model at `step` is newer than both the displayed model
    /// and any pending model not yet taken.
    pub fn accepts(&self, step: StepId) -> bool {
        self.lock().accepts(step)
    }

    /// Place `model` in the pending slot if it is newer than the
    /// displayed model and than any pending model not yet taken.
    ///
    /// On success returns the previous pending model, if any, as a spare.
    /// On rejection returns `model` back as `Err`.
    pub fn offer(&self, model: M) -> Result<Option<M>, M> {
        let mut slot = self.lock();
        if !slot.accepts(model.step()) {
            return Err(model);
        }
        Ok(slot.pending.replace(model))
    }

    /// Swap `displayed` with the pending model if the pending one is newer.
    ///
    /// Returns whether a swap happened. The model swapped out stays in
    /// the slot until the computation thread collects it as a spare.
    pub fn take_newer(&self, displayed: &mut M) -> bool {
        let mut slot = self.lock();
        let slot = &mut *slot;
        let swapped = match slot.pending.as_mut() {
            Some(pending) if pending.step() > displayed.step() => {
                std::mem::swap(pending, displayed);
                true
            }
            _ => false,
        };
        slot.displayed_step = displayed.step();
        swapped
    }

    /// Step of the pending model, if one is waiting.
    pub fn pending_step(&self) -> Option<StepId> {
        self.lock().pending.as_ref().map(Model::step)
    }

    /// Step of the model the driving thread last reported displaying.
    pub fn displayed_step(&self) -> StepId {
        self.lock().displayed_step
    }
}

impl<M: Model> fmt::Debug for ViewModelHandoff<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.lock();
        f.debug_struct("ViewModelHandoff")
            .field("pending_step", &slot.pending.as_ref().map(Model::step))
            .field("displayed_step", &slot.displayed_step)
            .finish()
    }
}

// ── HandoffPublisher ───────────────────────────────────────────────

/// Computation-thread side of a [`ViewModelHandoff`].
#[derive(Debug)]
pub struct HandoffPublisher<M: Model> {
    handoff: Arc<ViewModelHandoff<M>>,
}

impl<M: Model> HandoffPublisher<M> {
    /// Publish into `handoff`.
    pub fn new(handoff: Arc<ViewModelHandoff<M>>) -> Self {
        Self { handoff }
    }

    /// The shared handoff.
    pub fn handoff(&self) -> &Arc<ViewModelHandoff<M>> {
        &self.handoff
    }
}

impl<M: Model> ViewPublisher<M> for HandoffPublisher<M> {
    fn accepts(&self, step: StepId) -> bool {
        self.handoff.accepts(step)
    }

    fn publish(&mut self, model: M) -> Result<Option<M>, M> {
        self.handoff.offer(model)
    }
}
