//! Log comparison and replay verification.
//!
//! [`compare_logs`] finds the first step at which two peers' finalized
//! logs disagree. [`replay_match`] re-simulates a recording from step 0
//! with a linear replay engine and checks every recorded checkpoint.

use std::collections::BTreeSet;
use std::io::Read;

use tracing::{debug, warn};
use zerolag_core::{CommandPayload, Model, OrderKey, PayloadCodec, PayloadOf, Settings, StepId};
use zerolag_engine::{CommandLog, LinearEngine};

use crate::error::ReplayError;
use crate::hash::log_hash;
use crate::reader::{RecordedMatch, ReplayReader};
use crate::types::StepMode;

/// The first step at which two logs disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DivergenceReport {
    /// The diverging step.
    pub step: StepId,
    /// Order keys of the recorded log's commands at `step`.
    pub recorded: Vec<OrderKey>,
    /// Order keys of the replayed log's commands at `step`.
    pub replayed: Vec<OrderKey>,
}

/// Outcome of a successful verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Step of the final replayed model, which is the number of steps
    /// it executed.
    pub steps_replayed: u64,
    /// Checkpoints whose hash matched.
    pub checkpoints_verified: usize,
    /// Checkpoints past the last replayed step.
    pub checkpoints_skipped: usize,
    /// State hash of the model after the last replayed step.
    pub final_state_hash: u64,
    /// [`log_hash`] of the flattened log through the final model's step.
    pub log_hash: u64,
}

/// Compare two finalized logs step by step.
///
/// Returns `None` if every step holds the same commands in the same
/// order, or a report for the first step that differs.
pub fn compare_logs<P: CommandPayload>(
    recorded: &CommandLog<P>,
    replayed: &CommandLog<P>,
) -> Option<DivergenceReport> {
    let keys = |log: &CommandLog<P>, step: StepId| -> Vec<OrderKey> {
        log.commands_at(step).iter().map(|c| c.order_key()).collect()
    };
    let steps: BTreeSet<StepId> = recorded
        .steps()
        .chain(replayed.steps())
        .map(|(step, _)| step)
        .collect();

    steps.into_iter().find_map(|step| {
        let (a, b) = (keys(recorded, step), keys(replayed, step));
        (a != b).then_some(DivergenceReport {
            step,
            recorded: a,
            replayed: b,
        })
    })
}

/// Re-simulate `recorded` under `settings` and check its checkpoints.
///
/// Fails with [`ReplayError::SettingsMismatch`] if the recording was made
/// with different settings, and with [`ReplayError::StateMismatch`] at the
/// first checkpoint whose hash differs.
pub fn replay_match<S: Settings>(
    settings: S,
    recorded: &RecordedMatch<PayloadOf<S>>,
) -> Result<ReplaySummary, ReplayError> {
    let current = settings.settings_hash();
    if recorded.header.settings_hash != current {
        return Err(ReplayError::SettingsMismatch {
            recorded: recorded.header.settings_hash,
            current,
        });
    }

    let log = recorded.log.flatten_to_log();
    let fixed = recorded.header.mode == StepMode::Fixed;
    let mut engine = LinearEngine::replay(settings, fixed)?;
    for (_, commands) in log.steps() {
        for command in commands {
            engine.receive_command(command.clone());
        }
    }

    let mut checkpoints = recorded.checkpoints.clone();
    checkpoints.sort_by_key(|c| c.step);
    let mut pending = checkpoints.iter().peekable();
    let mut verified = 0;

    let steps = log.step_count();
    for index in 0..steps {
        let duration = log
            .step_duration(StepId(index))
            .unwrap_or(recorded.header.fixed_dt);
        engine.advance_present_time(duration);

        let model = engine.view_model();
        while let Some(checkpoint) = pending.next_if(|c| c.step <= model.step()) {
            let replayed = model.state_hash();
            if checkpoint.step != model.step() || checkpoint.state_hash != replayed {
                return Err(ReplayError::StateMismatch {
                    step: checkpoint.step,
                    recorded: checkpoint.state_hash,
                    replayed,
                });
            }
            verified += 1;
        }
    }

    let skipped = pending.count();
    if skipped > 0 {
        warn!(skipped, steps, "checkpoints beyond the recorded steps were not verified");
    }
    let replayed_through = engine.view_model().step();
    let summary = ReplaySummary {
        steps_replayed: replayed_through.0,
        checkpoints_verified: verified,
        checkpoints_skipped: skipped,
        final_state_hash: engine.view_model().state_hash(),
        log_hash: log_hash(&log, replayed_through),
    };
    debug!(
        steps = summary.steps_replayed,
        verified = summary.checkpoints_verified,
        "replay verified"
    );
    Ok(summary)
}

/// Read a whole recording from `reader` and verify it with
/// [`replay_match`].
pub fn replay_and_compare<S, R>(reader: ReplayReader<R>, settings: S) -> Result<ReplaySummary, ReplayError>
where
    S: Settings,
    PayloadOf<S>: PayloadCodec,
    R: Read,
{
    let recorded = reader.read_match()?;
    replay_match(settings, &recorded)
}
