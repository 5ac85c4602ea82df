//! ZeroLag: deterministic lockstep simulation with prediction and rollback.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! ZeroLag sub-crates. For most users, adding `zerolag` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use zerolag::prelude::*;
//!
//! #[derive(Clone)]
//! struct Add(i64);
//! impl CommandPayload for Add {
//!     fn content_hash(&self) -> u64 { self.0 as u64 }
//! }
//!
//! // A model summing every command it executes.
//! #[derive(Clone, Default)]
//! struct Tally { step: StepId, sum: i64 }
//! impl Model for Tally {
//!     type Payload = Add;
//!     fn step(&self) -> StepId { self.step }
//!     fn update_step(&mut self, _dt: Fix64, commands: &[Command<Add>]) {
//!         self.sum += commands.iter().map(|c| c.payload().0).sum::<i64>();
//!         self.step = self.step.next();
//!     }
//!     fn update(&mut self, _dt: Fix64, _commands: &[Command<Add>]) {}
//!     fn copy_from(&mut self, other: &Self) { self.clone_from(other) }
//!     fn state_hash(&self) -> u64 { self.step.0 ^ self.sum as u64 }
//! }
//!
//! struct Match;
//! impl Settings for Match {
//!     type Model = Tally;
//!     fn fixed_dt(&self) -> Fix64 { Fix64::from_num(0.0625) }
//!     fn max_allowed_lag(&self) -> Fix64 { Fix64::from_num(0.25) }
//!     fn max_lag_in_steps(&self) -> u64 { 4 }
//!     fn create_zero_model(&self, _replication_allowed: bool) -> Tally { Tally::default() }
//!     fn settings_hash(&self) -> u64 { 1 }
//! }
//!
//! let dt = Match.fixed_dt();
//! let mut engine = ResimulatingEngine::new(Match).unwrap();
//! for _ in 0..16 {
//!     engine.advance_present_time(dt);
//! }
//!
//! // A command for step 10 arrives late; the engine rolls back and
//! // resimulates the steps it affects.
//! engine.receive_command(Command::new(PlayerId(0), StepId(10), Priority::MIN, Add(3)));
//! engine.advance_present_time(dt);
//! engine.advance_present_time(dt);
//! assert_eq!(engine.view_model().step(), StepId(18));
//! assert_eq!(engine.view_model().sum, 3);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `zerolag-core` | IDs, fixed-point time, commands, timeouts, core traits |
//! | [`engine`] | `zerolag-engine` | Linear, resimulating, and threaded engines |
//! | [`replay`] | `zerolag-replay` | Match recording and replay verification |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`zerolag-core`).
///
/// Contains commands, order keys, timeout records, the fixed-point
/// [`types::Fix64`] time type, and the traits an application implements
/// ([`types::Model`], [`types::Settings`], [`types::CommandPayload`]).
pub use zerolag_core as types;

/// Lockstep engines and their building blocks (`zerolag-engine`).
///
/// [`engine::LinearEngine`] steps with a fixed input delay,
/// [`engine::ResimulatingEngine`] predicts and rolls back in place, and
/// [`engine::ThreadedEngine`] runs resimulation on its own thread.
pub use zerolag_engine as engine;

/// Match recording and deterministic replay verification (`zerolag-replay`).
///
/// Record with [`replay::ReplayWriter`], read back and verify with
/// [`replay::ReplayReader`] and [`replay::replay_match`].
pub use zerolag_replay as replay;

/// Common imports for typical ZeroLag usage.
///
/// ```rust
/// use zerolag::prelude::*;
/// ```
///
/// This imports the most frequently used types: engines, core traits,
/// identifiers, commands, and the replay writer and reader.
pub mod prelude {
    // Core types and traits
    pub use zerolag_core::{
        Command, CommandPayload, Fix64, Model, OrderKey, PayloadCodec, PlayerId, Priority,
        Settings, SimRng, StepId, TimeoutAction, TimeoutCommand,
    };

    // Errors
    pub use zerolag_core::{CommandError, DecodeError};
    pub use zerolag_engine::ConfigError;
    pub use zerolag_replay::ReplayError;

    // Engine
    pub use zerolag_engine::{
        EngineConfig, EngineMetrics, EngineObserver, LinearEngine, ResimulatingEngine,
        ThreadedEngine, WaveReport,
    };

    // Replay
    pub use zerolag_replay::{ReplayReader, ReplayWriter};
}
