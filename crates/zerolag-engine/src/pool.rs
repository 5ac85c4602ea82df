//! Recycled model instances.
//!
//! [`ModelPool`] hands out models by value and takes them back by value,
//! so an instance is always owned by exactly one role. The pool grows on
//! demand: the pre-warm size only avoids allocations during the first
//! waves.

use std::sync::Arc;

use zerolag_core::{Model, ModelOf, Settings};

/// Free list of model instances created from the match's zero model.
pub struct ModelPool<S: Settings> {
    settings: Arc<S>,
    replication_allowed: bool,
    idle: Vec<ModelOf<S>>,
    created: usize,
}

impl<S: Settings> ModelPool<S> {
    /// Create a pool holding `prewarm` zero models.
    pub fn new(settings: Arc<S>, replication_allowed: bool, prewarm: usize) -> Self {
        let mut pool = Self {
            settings,
            replication_allowed,
            idle: Vec::with_capacity(prewarm),
            created: 0,
        };
        for _ in 0..prewarm {
            let model = pool.create();
            pool.idle.push(model);
        }
        pool
    }

    /// A fresh zero model, bypassing the free list.
    pub fn create(&mut self) -> ModelOf<S> {
        self.created += 1;
        self.settings.create_zero_model(self.replication_allowed)
    }

    /// Take an idle instance, creating one if none is left.
    ///
    /// The returned model holds stale state from its previous use; callers
    /// overwrite it with [`Model::copy_from`] before reading it.
    pub fn checkout(&mut self) -> ModelOf<S> {
        match self.idle.pop() {
            Some(model) => model,
            None => self.create(),
        }
    }

    /// Take an instance holding a copy of `source`.
    pub fn checkout_copy(&mut self, source: &ModelOf<S>) -> ModelOf<S> {
        let mut model = self.checkout();
        model.copy_from(source);
        model
    }

    /// Take an instance holding a copy of `source` and mark it alive.
    pub fn checkout_live(&mut self, source: &ModelOf<S>) -> ModelOf<S> {
        let mut model = self.checkout_copy(source);
        model.enliven();
        model
    }

    /// Return an idle instance.
    pub fn release(&mut self, model: ModelOf<S>) {
        self.idle.push(model);
    }

    /// Mark a live instance dead and return it.
    pub fn retire(&mut self, mut model: ModelOf<S>) {
        model.mortify();
        self.release(model);
    }

    /// Instances waiting in the free list.
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Instances created over the pool's lifetime.
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Whether models from this pool may be copied.
    pub fn replication_allowed(&self) -> bool {
        self.replication_allowed
    }

    /// The settings models are created from.
    pub fn settings(&self) -> &Arc<S> {
        &self.settings
    }
}
