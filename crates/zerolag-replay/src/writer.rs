//! Replay recording writer.
//!
//! [`ReplayWriter`] streams frames to any `Write` sink, encoding the
//! binary replay format. The header is written immediately on construction.

use std::io::Write;

use zerolag_core::{Command, CommandPayload, Fix64, PayloadCodec, StepId, TimeoutCommand};
use zerolag_engine::NetworkCommandLog;

use crate::codec::{encode_frame, encode_header, serialize_command};
use crate::error::ReplayError;
use crate::types::{Checkpoint, Frame, ReplayHeader, StepMode};

/// Writes replay data to a byte stream.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code can use `BufWriter<File>`.
///
/// # Examples
///
/// ```
/// use zerolag_core::{Command, Fix64, PlayerId, Priority, StepId};
/// use zerolag_replay::{ReplayHeader, ReplayReader, ReplayWriter, StepMode};
/// use zerolag_test_utils::Nudge;
///
/// let header = ReplayHeader {
///     settings_hash: 7,
///     fixed_dt: Fix64::from_num(0.0625),
///     mode: StepMode::Fixed,
/// };
/// let nudge = Command::new(PlayerId(1), StepId(0), Priority::MIN, Nudge::new(3));
///
/// let mut buf = Vec::new();
/// let mut writer = ReplayWriter::new(&mut buf, header).unwrap();
/// writer.record_step(header.fixed_dt, &[nudge], &[], None).unwrap();
/// writer.record_step::<Nudge>(header.fixed_dt, &[], &[], None).unwrap();
/// assert_eq!(writer.frames_written(), 2);
/// drop(writer);
///
/// let mut reader = ReplayReader::open(buf.as_slice()).unwrap();
/// assert_eq!(reader.header(), &header);
/// let first = reader.next_frame().unwrap().unwrap();
/// assert_eq!(first.step, StepId(0));
/// assert_eq!(first.commands.len(), 1);
/// ```
pub struct ReplayWriter<W: Write> {
    writer: W,
    header: ReplayHeader,
    next_step: StepId,
    frames_written: u64,
}

impl<W: Write> ReplayWriter<W> {
    /// Create a new replay writer, immediately writing the header.
    pub fn new(mut writer: W, header: ReplayHeader) -> Result<Self, ReplayError> {
        encode_header(&mut writer, &header)?;
        Ok(Self {
            writer,
            header,
            next_step: StepId::ZERO,
            frames_written: 0,
        })
    }

    /// Record the next local step: what arrived during it and, optionally,
    /// a confirmed model hash. Returns the step recorded.
    ///
    /// In fixed mode `duration` is replaced by the header's fixed step.
    pub fn record_step<P: PayloadCodec + CommandPayload>(
        &mut self,
        duration: Fix64,
        commands: &[Command<P>],
        timeouts: &[TimeoutCommand],
        checkpoint: Option<Checkpoint>,
    ) -> Result<StepId, ReplayError> {
        let step = self.next_step;
        let duration = match self.header.mode {
            StepMode::Fixed => self.header.fixed_dt,
            StepMode::Variable => duration,
        };
        let frame = Frame {
            step,
            duration,
            commands: commands.iter().map(serialize_command).collect(),
            timeouts: timeouts.to_vec(),
            checkpoint,
        };
        self.write_frame(&frame)?;
        Ok(step)
    }

    /// Record a whole network log, one frame per logged step.
    ///
    /// Frames continue past the logged steps up to the last receipt step,
    /// using the header's fixed step for their duration. Fails if frames
    /// were already written.
    pub fn write_network_log<P: PayloadCodec + CommandPayload>(
        &mut self,
        log: &NetworkCommandLog<P>,
    ) -> Result<(), ReplayError> {
        if self.frames_written > 0 {
            return Err(ReplayError::MalformedFrame {
                detail: format!(
                    "network log must start at step 0, writer is at step {}",
                    self.next_step
                ),
            });
        }
        let received_through = if log.receipt_steps().is_empty() {
            0
        } else {
            log.calc_max_receiving_step().0 + 1
        };
        for index in 0..log.step_count().max(received_through) {
            let step = StepId(index);
            let duration = log
                .timing()
                .step_duration(step)
                .unwrap_or(self.header.fixed_dt);
            self.record_step(
                duration,
                log.commands_received_at(step),
                log.timeouts_received_at(step),
                None,
            )?;
        }
        Ok(())
    }

    /// Write a pre-built frame directly.
    ///
    /// The frame's step becomes the writer's position.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), ReplayError> {
        encode_frame(&mut self.writer, frame)?;
        self.next_step = frame.step.next();
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), ReplayError> {
        self.writer.flush()?;
        Ok(())
    }

    /// The header written at construction.
    pub fn header(&self) -> &ReplayHeader {
        &self.header
    }

    /// Step the next [`record_step`](ReplayWriter::record_step) records.
    pub fn next_step(&self) -> StepId {
        self.next_step
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Consume the writer and return the underlying `Write` sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
