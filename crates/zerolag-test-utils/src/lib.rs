//! Test fixtures and workload generators for ZeroLag development.
//!
//! Provides a deterministic mock model ([`CounterModel`]), its settings
//! ([`CounterSettings`]), a command payload ([`Nudge`]), and seeded
//! generators for command streams with simulated network lag.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod workload;

pub use fixtures::{CounterModel, CounterSettings, Nudge};
pub use workload::{random_arrivals, random_commands, shuffled, Arrival};
