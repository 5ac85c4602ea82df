//! Error types for the replay system.

use std::io;

use thiserror::Error;
use zerolag_core::{CommandError, DecodeError, OrderKey, StepId};
use zerolag_engine::ConfigError;

/// Errors from recording, reading, or verifying a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The stream does not start with the `b"ZLAG"` magic bytes.
    #[error("invalid magic bytes (expected b\"ZLAG\")")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found in the stream.
        found: u8,
    },
    /// A header or frame could not be decoded.
    #[error("malformed frame: {detail}")]
    MalformedFrame {
        /// What went wrong.
        detail: String,
    },
    /// A recorded command field is out of range.
    #[error("invalid command field: {0}")]
    InvalidCommand(#[from] CommandError),
    /// A recorded payload could not be decoded.
    #[error("payload of command for step {step} could not be decoded")]
    Payload {
        /// Execution step of the command.
        step: StepId,
        /// The decoder's complaint.
        #[source]
        source: DecodeError,
    },
    /// A decoded command does not reproduce its recorded order key,
    /// so peers would execute it in a different position.
    #[error("order key mismatch for command at step {step}: recorded {recorded}, computed {computed}")]
    OrderKeyMismatch {
        /// Execution step of the command.
        step: StepId,
        /// Key stored in the replay.
        recorded: OrderKey,
        /// Key computed from the decoded command.
        computed: OrderKey,
    },
    /// The replay was recorded with different match settings.
    #[error("settings hash mismatch: recorded={recorded:#018x}, current={current:#018x}")]
    SettingsMismatch {
        /// Hash from the replay header.
        recorded: u64,
        /// Hash of the settings supplied for playback.
        current: u64,
    },
    /// The playback engine rejected the supplied settings.
    #[error("cannot build playback engine: {0}")]
    Config(#[from] ConfigError),
    /// A replayed model disagrees with a recorded checkpoint.
    #[error("state mismatch at step {step}: recorded={recorded:#018x}, replayed={replayed:#018x}")]
    StateMismatch {
        /// Step of the checkpoint.
        step: StepId,
        /// Hash from the replay.
        recorded: u64,
        /// Hash of the replayed model.
        replayed: u64,
    },
}
