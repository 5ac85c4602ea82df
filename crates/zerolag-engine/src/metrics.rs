//! Cumulative engine counters.
//!
//! [`EngineMetrics`] is updated by whichever thread owns the engine core
//! and can be copied out for telemetry. The threaded engine copies it
//! across the thread boundary on request.

/// Cumulative counters collected while an engine runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineMetrics {
    /// Model steps simulated, including resimulated ones.
    pub steps_simulated: u64,
    /// Waves that reached the present step.
    pub waves_completed: u64,
    /// Waves that restarted from a history anchor.
    pub rollbacks: u64,
    /// Waves that kept the live cursor because it sat on the anchor step.
    pub anchor_reuses: u64,
    /// Commands merged into the log.
    pub commands_received: u64,
    /// Commands dropped because the engine was stopped or the command lay
    /// beyond the debug input horizon. A threaded engine counts only
    /// commands its computation thread saw.
    pub commands_dropped: u64,
    /// Timeouts whose target was found and resolved.
    pub timeouts_resolved: u64,
    /// Timeouts discarded by the pending-timeout cap.
    pub timeouts_discarded: u64,
    /// Models the view-model publisher accepted.
    pub view_models_published: u64,
}

impl EngineMetrics {
    /// Share of waves that had to restart from a history anchor.
    pub fn rollback_ratio(&self) -> f64 {
        if self.waves_completed == 0 {
            return 0.0;
        }
        self.rollbacks as f64 / self.waves_completed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = EngineMetrics::default();
        assert_eq!(m.steps_simulated, 0);
        assert_eq!(m.waves_completed, 0);
        assert_eq!(m.rollbacks, 0);
        assert_eq!(m.view_models_published, 0);
        assert_eq!(m.rollback_ratio(), 0.0);
    }

    #[test]
    fn rollback_ratio_divides_by_waves() {
        let m = EngineMetrics {
            waves_completed: 4,
            rollbacks: 1,
            ..Default::default()
        };
        assert_eq!(m.rollback_ratio(), 0.25);
    }
}
