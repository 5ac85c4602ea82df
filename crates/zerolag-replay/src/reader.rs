//! Replay playback reader.
//!
//! [`ReplayReader`] reads frames from any `Read` source, decoding the
//! binary replay format. The header is validated on construction.
//! [`ReplayReader::read_match`] rebuilds the recorded
//! [`NetworkCommandLog`].

use std::io::Read;

use tracing::debug;
use zerolag_core::{CommandPayload, Fix64, PayloadCodec, StepId};
use zerolag_engine::NetworkCommandLog;

use crate::codec::{decode_frame, decode_header, deserialize_command};
use crate::error::ReplayError;
use crate::types::{Checkpoint, Frame, ReplayHeader, StepMode};

/// A decoded recording.
#[derive(Clone, Debug)]
pub struct RecordedMatch<P> {
    /// The replay header.
    pub header: ReplayHeader,
    /// Everything the recorder received, by receipt step.
    pub log: NetworkCommandLog<P>,
    /// Confirmed model hashes, in recording order.
    pub checkpoints: Vec<Checkpoint>,
}

/// Reads replay data from a byte stream.
///
/// Generic over `R: Read` so tests can use `&[u8]` and production
/// code can use `BufReader<File>`.
pub struct ReplayReader<R: Read> {
    reader: R,
    header: ReplayHeader,
    frames_read: u64,
}

impl<R: Read> ReplayReader<R> {
    /// Open a replay stream, reading and validating the header.
    pub fn open(mut reader: R) -> Result<Self, ReplayError> {
        let header = decode_header(&mut reader)?;
        Ok(Self {
            reader,
            header,
            frames_read: 0,
        })
    }

    /// The replay header.
    pub fn header(&self) -> &ReplayHeader {
        &self.header
    }

    /// Read the next frame, or `None` if the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ReplayError> {
        let frame = decode_frame(&mut self.reader)?;
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    /// Number of frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Convert into a frame iterator.
    pub fn frames(self) -> FrameIter<R> {
        FrameIter {
            reader: self.reader,
            done: false,
        }
    }

    /// Read every remaining frame into a [`RecordedMatch`].
    ///
    /// Frames must cover consecutive steps starting at the next unread
    /// step, and every command must decode to its recorded order key.
    pub fn read_match<P: PayloadCodec + CommandPayload>(
        mut self,
    ) -> Result<RecordedMatch<P>, ReplayError> {
        let header = self.header;
        let mut log = match header.mode {
            StepMode::Fixed => NetworkCommandLog::fixed(header.fixed_dt),
            StepMode::Variable => NetworkCommandLog::variable(header.fixed_dt),
        };
        let mut checkpoints = Vec::new();
        let mut expected = StepId(self.frames_read);

        while let Some(frame) = self.next_frame()? {
            if frame.step != expected {
                return Err(ReplayError::MalformedFrame {
                    detail: format!("frame for step {}, expected step {expected}", frame.step),
                });
            }
            if frame.duration <= Fix64::ZERO {
                return Err(ReplayError::MalformedFrame {
                    detail: format!("non-positive duration at step {}", frame.step),
                });
            }
            match header.mode {
                StepMode::Fixed => log.extend_to(frame.step.0 + 1),
                StepMode::Variable => log.add_step(frame.duration),
            }
            for serialized in &frame.commands {
                log.receive_command(frame.step, deserialize_command(serialized)?);
            }
            for timeout in frame.timeouts {
                log.receive_timeout(frame.step, timeout);
            }
            checkpoints.extend(frame.checkpoint);
            expected = expected.next();
        }

        debug!(
            steps = log.step_count(),
            commands = log.command_count(),
            timeouts = log.timeout_count(),
            checkpoints = checkpoints.len(),
            "replay loaded"
        );
        Ok(RecordedMatch {
            header,
            log,
            checkpoints,
        })
    }
}

/// Iterator adapter over replay frames.
pub struct FrameIter<R: Read> {
    reader: R,
    done: bool,
}

impl<R: Read> Iterator for FrameIter<R> {
    type Item = Result<Frame, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match decode_frame(&mut self.reader) {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
