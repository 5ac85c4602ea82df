//! Engine configuration, validation, and error types.
//!
//! [`EngineConfig`] sizes the snapshot history and the model pool and
//! holds the pacing knobs of the resimulating engine.
//! [`validate()`](EngineConfig::validate) checks structural invariants
//! before an engine is built.

use std::time::Duration;

use thiserror::Error;
use zerolag_core::time::whole_steps;
use zerolag_core::{Fix64, Settings};

/// Number of sparse snapshots kept beyond the dense window.
pub const DEFAULT_SPARSE_COUNT: usize = 10;

/// How many times faster than real time a wave may run by default.
pub const DEFAULT_SIMULATION_SPEED: i32 = 10;

/// Largest dense or sparse history an engine will keep.
pub const MAX_HISTORY_LEN: usize = 1 << 16;

/// Idle sleep of the computation thread when it has caught up.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(30);

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`EngineConfig::validate()`] or engine start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings report a zero or negative step duration.
    #[error("fixed_dt must be positive, got {value}")]
    InvalidFixedDt {
        /// The invalid value.
        value: Fix64,
    },
    /// The settings report a zero or negative maximum lag.
    #[error("max_allowed_lag must be positive, got {value}")]
    InvalidMaxLag {
        /// The invalid value.
        value: Fix64,
    },
    /// Dense history must hold at least one snapshot.
    #[error("dense_count must be at least 1")]
    DenseCountZero,
    /// Sparse history must hold at least one snapshot.
    #[error("sparse_count must be at least 1")]
    SparseCountZero,
    /// A history window would not fit in memory.
    #[error("{kind} history of {len} exceeds the limit of {max}")]
    HistoryTooLarge {
        /// Which window: `"dense"` or `"sparse"`.
        kind: &'static str,
        /// The requested length.
        len: usize,
        /// [`MAX_HISTORY_LEN`].
        max: usize,
    },
    /// The pool would pre-create more models than history can use.
    #[error("model_pool_size of {len} exceeds the limit of {max}")]
    PoolTooLarge {
        /// The requested size.
        len: usize,
        /// Twice [`MAX_HISTORY_LEN`].
        max: usize,
    },
    /// Sparse snapshots need a positive period.
    #[error("sparse_period must be at least 1")]
    SparsePeriodZero,
    /// Waves cannot run at zero or negative speed.
    #[error("simulation_speed must be positive, got {value}")]
    InvalidSimulationSpeed {
        /// The invalid value.
        value: Fix64,
    },
    /// A debug step cap of zero would never advance the simulation.
    #[error("max_steps_per_update must be at least 1 when set")]
    StepCapZero,
    /// The computation thread would spin without sleeping.
    #[error("idle_interval must be non-zero")]
    IdleIntervalZero,
    /// A pending-timeout cap of zero would drop every timeout.
    #[error("max_pending_timeouts must be at least 1 when set")]
    PendingTimeoutCapZero,
    /// The computation thread could not be spawned.
    #[error("thread spawn failed: {reason}")]
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}

// ── EngineConfig ───────────────────────────────────────────────────

/// Sizing and pacing configuration shared by all engine variants.
///
/// Build one with [`for_settings`](EngineConfig::for_settings), which
/// derives history sizes from the match's step duration and maximum
/// lag, then override fields as needed.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Contiguous recent snapshots kept for exact rollback.
    pub dense_count: usize,
    /// Period-aligned older snapshots kept beyond the dense window.
    pub sparse_count: usize,
    /// Only steps with `step % sparse_period == 0` enter sparse history.
    pub sparse_period: u64,
    /// Models created up front. A performance hint, never a cap.
    pub model_pool_size: usize,
    /// Wave speed relative to real time. Default: 10.
    pub simulation_speed: Fix64,
    /// Fixed number of steps per update, overriding speed pacing.
    pub max_steps_per_update: Option<u32>,
    /// Computation-thread sleep when caught up to present. Default: 30 ms.
    pub idle_interval: Duration,
    /// Upper bound on unresolved timeouts. `None` keeps them all.
    pub max_pending_timeouts: Option<usize>,
}

impl EngineConfig {
    /// Dense snapshot count guaranteeing an exact anchor for any
    /// correction within `max_allowed_lag`: `max(1, 2 * lag / dt)`,
    /// clamped to [`MAX_HISTORY_LEN`].
    pub fn dense_count_for(max_allowed_lag: Fix64, fixed_dt: Fix64) -> usize {
        let lag = max_allowed_lag.saturating_mul(Fix64::from_num(2));
        usize::try_from(whole_steps(lag, fixed_dt))
            .unwrap_or(usize::MAX)
            .clamp(1, MAX_HISTORY_LEN)
    }

    /// Derive a configuration from match settings.
    pub fn for_settings<S: Settings>(settings: &S) -> Self {
        let dense = Self::dense_count_for(settings.max_allowed_lag(), settings.fixed_dt());
        Self::with_history(dense, DEFAULT_SPARSE_COUNT, dense as u64)
    }

    /// Explicit history sizes with default pacing.
    pub fn with_history(dense_count: usize, sparse_count: usize, sparse_period: u64) -> Self {
        Self {
            dense_count,
            sparse_count,
            sparse_period,
            model_pool_size: dense_count.saturating_add(sparse_count),
            simulation_speed: Fix64::from_num(DEFAULT_SIMULATION_SPEED),
            max_steps_per_update: None,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            max_pending_timeouts: None,
        }
    }

    /// Configuration for engines that keep no history.
    pub fn linear() -> Self {
        Self {
            model_pool_size: 0,
            ..Self::with_history(1, 1, 1)
        }
    }

    /// Validate structural invariants against the match settings.
    pub fn validate<S: Settings>(&self, settings: &S) -> Result<(), ConfigError> {
        // 1. Step duration and lag must be positive.
        let dt = settings.fixed_dt();
        if dt <= Fix64::ZERO {
            return Err(ConfigError::InvalidFixedDt { value: dt });
        }
        let lag = settings.max_allowed_lag();
        if lag <= Fix64::ZERO {
            return Err(ConfigError::InvalidMaxLag { value: lag });
        }
        // 2. History needs room for at least one snapshot of each kind.
        if self.dense_count == 0 {
            return Err(ConfigError::DenseCountZero);
        }
        if self.sparse_count == 0 {
            return Err(ConfigError::SparseCountZero);
        }
        for (kind, len) in [("dense", self.dense_count), ("sparse", self.sparse_count)] {
            if len > MAX_HISTORY_LEN {
                return Err(ConfigError::HistoryTooLarge {
                    kind,
                    len,
                    max: MAX_HISTORY_LEN,
                });
            }
        }
        if self.model_pool_size > 2 * MAX_HISTORY_LEN {
            return Err(ConfigError::PoolTooLarge {
                len: self.model_pool_size,
                max: 2 * MAX_HISTORY_LEN,
            });
        }
        if self.sparse_period == 0 {
            return Err(ConfigError::SparsePeriodZero);
        }
        // 3. Pacing.
        if self.simulation_speed <= Fix64::ZERO {
            return Err(ConfigError::InvalidSimulationSpeed {
                value: self.simulation_speed,
            });
        }
        if self.max_steps_per_update == Some(0) {
            return Err(ConfigError::StepCapZero);
        }
        if self.idle_interval.is_zero() {
            return Err(ConfigError::IdleIntervalZero);
        }
        if self.max_pending_timeouts == Some(0) {
            return Err(ConfigError::PendingTimeoutCapZero);
        }
        Ok(())
    }

    /// Steps the present may run ahead of the input horizon while frozen,
    /// so that lagging waves can still reach it:
    /// `max_lag_in_steps * (1 + 1 / speed) + 1`.
    pub fn catch_up_steps(&self, max_lag_in_steps: u64) -> u64 {
        let lag = Fix64::saturating_from_num(max_lag_in_steps);
        let overrun = lag
            .checked_div(self.simulation_speed)
            .map_or(0, |v| v.floor().saturating_to_num::<u64>());
        max_lag_in_steps
            .saturating_add(overrun)
            .saturating_add(1)
    }
}
