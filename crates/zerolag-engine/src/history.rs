//! Dense and sparse snapshot history for rollback anchors.
//!
//! [`SnapshotHistory`] keeps copies of the cursor after each simulated
//! step. The dense window holds the most recent steps contiguously, so
//! any correction within the match's maximum lag restarts from an exact
//! snapshot. The sparse window keeps every `period`-th step further back,
//! bounding memory while still offering a nearby anchor for larger
//! corrections. The zero model at step 0 is the fallback of last resort.
//!
//! # Eviction
//!
//! Recording step `n`:
//!
//! 1. drops every entry at step `>= n` (speculative state from an
//!    earlier wave that a correction has since invalidated),
//! 2. appends `n` to dense, and to sparse if `n % period == 0`,
//! 3. drops dense entries older than `n - dense_count + 1` and sparse
//!    entries older than `n - sparse_count * period + 1`.

use std::collections::VecDeque;
use std::fmt;

use zerolag_core::{Model, Settings, StepId};

use crate::config::MAX_HISTORY_LEN;
use crate::pool::ModelPool;

/// Where an anchor came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorSource {
    /// The contiguous recent window.
    Dense,
    /// The periodic older window.
    Sparse,
    /// The step-0 zero model.
    Zero,
}

/// A validated restart point at or before a requested step.
#[derive(Debug)]
pub struct Anchor<'a, M> {
    /// Step the anchor model represents.
    pub step: StepId,
    /// The snapshot itself. Copy it before simulating.
    pub model: &'a M,
    /// Which window supplied the anchor.
    pub source: AnchorSource,
}

/// Saved `(step, model)` pairs used to restart simulation after a
/// correction.
pub struct SnapshotHistory<M> {
    dense: VecDeque<(StepId, M)>,
    sparse: VecDeque<(StepId, M)>,
    dense_count: usize,
    sparse_count: usize,
    sparse_period: u64,
    zero: M,
}

// Compile-time assertion: history can move to the computation thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check<M: Model>() {
        assert_send::<SnapshotHistory<M>>();
    }
};

impl<M: Model> SnapshotHistory<M> {
    /// Create an empty history around `zero`, which must be at step 0.
    ///
    /// `dense_count`, `sparse_count` and `sparse_period` are expected to
    /// be at least 1; [`EngineConfig::validate`](crate::config::EngineConfig::validate)
    /// enforces this.
    pub fn new(zero: M, dense_count: usize, sparse_count: usize, sparse_period: u64) -> Self {
        Self {
            dense: VecDeque::with_capacity(dense_count.min(MAX_HISTORY_LEN) + 1),
            sparse: VecDeque::with_capacity(sparse_count.min(MAX_HISTORY_LEN) + 1),
            dense_count: dense_count.max(1),
            sparse_count: sparse_count.max(1),
            sparse_period: sparse_period.max(1),
            zero,
        }
    }

    /// Save a copy of `model` as the confirmed state of `step`.
    pub fn record<S>(&mut self, step: StepId, model: &M, pool: &mut ModelPool<S>)
    where
        S: Settings<Model = M>,
    {
        Self::evict_from(&mut self.dense, step, pool);
        Self::evict_from(&mut self.sparse, step, pool);

        self.dense.push_back((step, pool.checkout_copy(model)));
        if step.0 % self.sparse_period == 0 {
            self.sparse.push_back((step, pool.checkout_copy(model)));
        }

        let dense_span = self.dense_count as u64;
        let sparse_span = (self.sparse_count as u64).saturating_mul(self.sparse_period);
        Self::evict_older(&mut self.dense, step, dense_span, pool);
        Self::evict_older(&mut self.sparse, step, sparse_span, pool);
    }

    /// Drop entries at `step` or later.
    fn evict_from<S>(window: &mut VecDeque<(StepId, M)>, step: StepId, pool: &mut ModelPool<S>)
    where
        S: Settings<Model = M>,
    {
        while window.back().is_some_and(|(s, _)| *s >= step) {
            if let Some((_, model)) = window.pop_back() {
                pool.release(model);
            }
        }
    }

    /// Drop entries more than `span - 1` steps before `step`.
    fn evict_older<S>(
        window: &mut VecDeque<(StepId, M)>,
        step: StepId,
        span: u64,
        pool: &mut ModelPool<S>,
    ) where
        S: Settings<Model = M>,
    {
        while window
            .front()
            .is_some_and(|(s, _)| s.0.saturating_add(span) <= step.0)
        {
            if let Some((_, model)) = window.pop_front() {
                pool.release(model);
            }
        }
    }

    /// The newest snapshot at or before `target`.
    ///
    /// Never fails: falls back to the zero model at step 0.
    pub fn anchor(&self, target: StepId) -> Anchor<'_, M> {
        if let Some((step, model)) = self.dense.iter().rev().find(|(s, _)| *s <= target) {
            return Anchor {
                step: *step,
                model,
                source: AnchorSource::Dense,
            };
        }
        if let Some((step, model)) = self.sparse.iter().rev().find(|(s, _)| *s <= target) {
            return Anchor {
                step: *step,
                model,
                source: AnchorSource::Sparse,
            };
        }
        Anchor {
            step: StepId::ZERO,
            model: &self.zero,
            source: AnchorSource::Zero,
        }
    }

    /// Release every snapshot except the zero model back to `pool`.
    pub fn clear<S>(&mut self, pool: &mut ModelPool<S>)
    where
        S: Settings<Model = M>,
    {
        for (_, model) in self.dense.drain(..).chain(self.sparse.drain(..)) {
            pool.release(model);
        }
    }

    /// Steps held in the dense window, oldest first.
    pub fn dense_steps(&self) -> impl Iterator<Item = StepId> + '_ {
        self.dense.iter().map(|(s, _)| *s)
    }

    /// Steps held in the sparse window, oldest first.
    pub fn sparse_steps(&self) -> impl Iterator<Item = StepId> + '_ {
        self.sparse.iter().map(|(s, _)| *s)
    }

    /// Number of dense snapshots.
    pub fn dense_len(&self) -> usize {
        self.dense.len()
    }

    /// Number of sparse snapshots.
    pub fn sparse_len(&self) -> usize {
        self.sparse.len()
    }

    /// The step-0 fallback anchor.
    pub fn zero_model(&self) -> &M {
        &self.zero
    }
}

impl<M: Model> fmt::Debug for SnapshotHistory<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |window: &VecDeque<(StepId, M)>| -> Vec<String> {
            window
                .iter()
                .map(|(s, m)| format!("{s}:{:03}", m.state_hash() % 1000))
                .collect()
        };
        f.debug_struct("SnapshotHistory")
            .field("dense", &show(&self.dense))
            .field("sparse", &show(&self.sparse))
            .field("zero", &format_args!("{:03}", self.zero.state_hash() % 1000))
            .finish()
    }
}
