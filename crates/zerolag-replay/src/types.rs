//! Data types for replay recording and playback.

use zerolag_core::{Fix64, Settings, StepId, TimeoutCommand};

use crate::error::ReplayError;

/// How the recorded match measured its steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepMode {
    /// Every step lasts the fixed duration.
    Fixed,
    /// Each frame carries its own step duration.
    Variable,
}

impl StepMode {
    /// Wire tag.
    pub fn tag(self) -> u8 {
        match self {
            Self::Fixed => 0,
            Self::Variable => 1,
        }
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self, ReplayError> {
        match tag {
            0 => Ok(Self::Fixed),
            1 => Ok(Self::Variable),
            tag => Err(ReplayError::MalformedFrame {
                detail: format!("unknown step mode tag {tag}"),
            }),
        }
    }
}

/// Match parameters stored at the start of every replay.
///
/// # Examples
///
/// ```
/// use zerolag_core::Fix64;
/// use zerolag_replay::{ReplayHeader, StepMode};
///
/// let header = ReplayHeader {
///     settings_hash: 0xDEAD_BEEF,
///     fixed_dt: Fix64::from_num(0.0625),
///     mode: StepMode::Fixed,
/// };
/// assert_eq!(header.mode, StepMode::Fixed);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayHeader {
    /// [`Settings::settings_hash`] of the recorded match.
    pub settings_hash: u64,
    /// Fixed step duration of the recorded match.
    pub fixed_dt: Fix64,
    /// Whether frames carry individual step durations.
    pub mode: StepMode,
}

impl ReplayHeader {
    /// Header describing a match played with `settings`.
    pub fn for_settings<S: Settings>(settings: &S, mode: StepMode) -> Self {
        Self {
            settings_hash: settings.settings_hash(),
            fixed_dt: settings.fixed_dt(),
            mode,
        }
    }
}

/// A command in wire form.
///
/// The order key is stored alongside the fields it is derived from, so
/// playback can detect a payload codec that does not round-trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedCommand {
    /// Issuing player.
    pub player: u32,
    /// Execution step.
    pub step: u64,
    /// Priority class, `0..=3`.
    pub priority: u8,
    /// Recorded [`OrderKey`](zerolag_core::OrderKey) bits.
    pub order_key: u64,
    /// Encoded payload bytes.
    pub payload: Vec<u8>,
}

/// Confirmed model hash the recorder saw at a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    /// Step the hashed model represents.
    pub step: StepId,
    /// [`Model::state_hash`](zerolag_core::Model::state_hash) at that step.
    pub state_hash: u64,
}

/// Everything received during one local step.
///
/// Frames are written for every step in order, including empty ones,
/// so that step durations can be reconstructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Receipt step this frame records.
    pub step: StepId,
    /// Duration of the step.
    pub duration: Fix64,
    /// Commands received during the step, in arrival order.
    pub commands: Vec<SerializedCommand>,
    /// Timeouts received during the step, in arrival order.
    pub timeouts: Vec<TimeoutCommand>,
    /// Optional confirmed model hash for verification.
    pub checkpoint: Option<Checkpoint>,
}
