//! Lockstep simulation engines with prediction and rollback.
//!
//! Provides the engine variants built on one stepping core:
//!
//! - [`LinearEngine`]: steps straight to the present minus an input
//!   delay. No history, no resimulation.
//! - [`ResimulatingEngine`]: runs ahead of confirmed input in waves and
//!   rolls back to dense or sparse snapshots when late commands or
//!   timeouts invalidate simulated steps.
//! - [`ThreadedEngine`]: a resimulating engine whose waves run on a
//!   dedicated computation thread, handing view models to the driving
//!   thread through a lock-guarded slot.
//!
//! The building blocks ([`CommandLog`], [`NetworkCommandLog`],
//! [`TimeoutResolver`], [`SnapshotHistory`], [`ModelPool`]) are public
//! for tools that analyze or replay matches.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod cursor;
pub mod engine;
pub mod history;
pub mod linear;
pub mod log;
pub mod metrics;
pub mod network_log;
pub mod observer;
pub mod pool;
pub mod resim;
pub mod threaded;
pub mod timeout;
pub mod view;

pub use config::{ConfigError, EngineConfig};
pub use cursor::SimulationCursor;
pub use engine::{AdvancePolicy, Engine, EngineCore};
pub use history::{Anchor, AnchorSource, SnapshotHistory};
pub use linear::{LinearAdvance, LinearEngine};
pub use log::{CommandLog, StepCommands};
pub use metrics::EngineMetrics;
pub use network_log::NetworkCommandLog;
pub use observer::{EngineObserver, NoopObserver, WaveReport};
pub use pool::ModelPool;
pub use resim::{ResimulatingAdvance, ResimulatingEngine};
pub use threaded::ThreadedEngine;
pub use timeout::{Resolution, TimeoutResolver};
pub use view::{HandoffPublisher, InlineView, ViewModelHandoff, ViewPublisher};
