//! Match recording and deterministic replay verification for ZeroLag.
//!
//! Records what a peer received during a match, step by step, and replays
//! it later to reproduce the finalized command log and check that the
//! simulation reaches the same states.
//!
//! # Architecture
//!
//! - [`ReplayWriter`] records frames to any `Write` sink
//! - [`ReplayReader`] plays back frames from any `Read` source and
//!   rebuilds the recorded [`NetworkCommandLog`](zerolag_engine::NetworkCommandLog)
//! - [`replay_match`] and [`replay_and_compare`] re-simulate a recording
//!   and verify its checkpoints
//! - [`compare_logs`] locates the first step where two peers' logs differ
//! - All I/O uses a custom binary codec (no serde dependency); payloads
//!   provide their bytes through [`PayloadCodec`](zerolag_core::PayloadCodec)
//!
//! # Format
//!
//! ```text
//! [MAGIC "ZLAG"] [VERSION u8] [settings_hash u64] [fixed_dt i64] [mode u8]
//! [Frame 0] [Frame 1] ... [Frame N]
//! ```
//!
//! Each frame holds the receipt step, its duration, the commands (with
//! their order keys) and timeouts received during it, and an optional
//! checkpoint hash of a confirmed model.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod compare;
pub mod error;
pub mod hash;
pub mod reader;
pub mod types;
pub mod writer;

pub use compare::{compare_logs, replay_and_compare, replay_match, DivergenceReport, ReplaySummary};
pub use error::ReplayError;
pub use hash::log_hash;
pub use reader::{FrameIter, RecordedMatch, ReplayReader};
pub use types::{Checkpoint, Frame, ReplayHeader, SerializedCommand, StepMode};
pub use writer::ReplayWriter;

/// Magic bytes at the start of every replay stream.
pub const MAGIC: [u8; 4] = *b"ZLAG";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;
