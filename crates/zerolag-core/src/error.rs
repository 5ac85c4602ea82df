//! Error types for command construction and payload decoding.
//!
//! Engine operations never fail at runtime: late or unknown input is
//! handled by policy (drop, keep pending, widen the rollback window).
//! The only fallible surfaces in this crate are building a command from
//! untrusted parts and decoding payload bytes.

use thiserror::Error;

/// Errors from constructing commands or their components.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Priority outside `0..=3`.
    #[error("priority {value} is out of range 0..=3")]
    InvalidPriority {
        /// The rejected value.
        value: u8,
    },
    /// A timeout record carries an unknown action tag.
    #[error("unknown timeout action tag {tag}")]
    UnknownTimeoutAction {
        /// The rejected tag.
        tag: u8,
    },
}

/// A payload could not be rebuilt from its encoded bytes.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("malformed payload: {detail}")]
pub struct DecodeError {
    /// What was wrong with the bytes.
    pub detail: String,
}

impl DecodeError {
    /// An error carrying `detail`.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
