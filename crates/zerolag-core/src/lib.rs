//! Core types and traits for the ZeroLag lockstep rollback engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other ZeroLag crate: step and player
//! identifiers, the fixed-point time type, commands with their
//! deterministic order keys, timeout records, the [`Model`] and
//! [`Settings`] capabilities an application provides, and a
//! deterministic random number generator for model code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod command;
pub mod error;
pub mod hash;
pub mod id;
pub mod rng;
pub mod time;
pub mod traits;
pub mod wire;

pub use command::{Command, CommandPayload, TimeoutAction, TimeoutCommand};
pub use error::{CommandError, DecodeError};
pub use id::{OrderKey, PlayerId, Priority, StepId};
pub use rng::SimRng;
pub use time::Fix64;
pub use traits::{Model, ModelOf, PayloadOf, Settings};
pub use wire::PayloadCodec;
