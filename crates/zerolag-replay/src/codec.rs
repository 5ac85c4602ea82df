//! Binary encode/decode for the replay format.
//!
//! All integers are little-endian. Byte arrays are length-prefixed with a
//! `u32` length. Fixed-point values are stored as their raw `i64` bits.
//! No compression, no alignment padding, no self-describing schema.

use std::io::{Read, Write};

use zerolag_core::{
    Command, CommandPayload, Fix64, OrderKey, PayloadCodec, PlayerId, Priority, StepId,
    TimeoutAction, TimeoutCommand,
};

use crate::error::ReplayError;
use crate::types::{Checkpoint, Frame, ReplayHeader, SerializedCommand, StepMode};
use crate::{FORMAT_VERSION, MAGIC};

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), ReplayError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), ReplayError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), ReplayError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a fixed-point value as its little-endian bits.
pub fn write_fix64(w: &mut dyn Write, v: Fix64) -> Result<(), ReplayError> {
    w.write_all(&v.to_bits().to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn write_length_prefixed_bytes(w: &mut dyn Write, b: &[u8]) -> Result<(), ReplayError> {
    write_count(w, b.len())?;
    w.write_all(b)?;
    Ok(())
}

fn write_count(w: &mut dyn Write, len: usize) -> Result<(), ReplayError> {
    let len = u32::try_from(len).map_err(|_| ReplayError::MalformedFrame {
        detail: format!("length {len} exceeds u32"),
    })?;
    write_u32_le(w, len)
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, ReplayError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, ReplayError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, ReplayError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a fixed-point value from its little-endian bits.
pub fn read_fix64(r: &mut dyn Read) -> Result<Fix64, ReplayError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(Fix64::from_bits(i64::from_le_bytes(buf)))
}

/// Read a length-prefixed byte array.
///
/// The buffer grows with the bytes actually read, so a corrupt length
/// cannot force a large allocation.
pub fn read_length_prefixed_bytes(r: &mut dyn Read) -> Result<Vec<u8>, ReplayError> {
    let len = u64::from(read_u32_le(r)?);
    let mut buf = Vec::new();
    (&mut *r).take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(ReplayError::MalformedFrame {
            detail: format!("truncated byte array: got {} of {len} bytes", buf.len()),
        });
    }
    Ok(buf)
}

// ── Header encode/decode ────────────────────────────────────────

/// Encode the replay header (magic, version, match parameters).
pub fn encode_header(w: &mut dyn Write, header: &ReplayHeader) -> Result<(), ReplayError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    write_u64_le(w, header.settings_hash)?;
    write_fix64(w, header.fixed_dt)?;
    write_u8(w, header.mode.tag())?;
    Ok(())
}

/// Decode and validate the replay header.
pub fn decode_header(r: &mut dyn Read) -> Result<ReplayHeader, ReplayError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(ReplayError::InvalidMagic);
    }

    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(ReplayError::UnsupportedVersion { found: version });
    }

    let settings_hash = read_u64_le(r)?;
    let fixed_dt = read_fix64(r)?;
    if fixed_dt <= Fix64::ZERO {
        return Err(ReplayError::MalformedFrame {
            detail: format!("non-positive fixed step duration {fixed_dt}"),
        });
    }
    let mode = StepMode::from_tag(read_u8(r)?)?;
    Ok(ReplayHeader {
        settings_hash,
        fixed_dt,
        mode,
    })
}

// ── Frame encode/decode ─────────────────────────────────────────

/// Encode a single frame.
pub fn encode_frame(w: &mut dyn Write, frame: &Frame) -> Result<(), ReplayError> {
    write_u64_le(w, frame.step.0)?;
    write_fix64(w, frame.duration)?;

    write_count(w, frame.commands.len())?;
    for cmd in &frame.commands {
        write_u32_le(w, cmd.player)?;
        write_u64_le(w, cmd.step)?;
        write_u8(w, cmd.priority)?;
        write_u64_le(w, cmd.order_key)?;
        write_length_prefixed_bytes(w, &cmd.payload)?;
    }

    write_count(w, frame.timeouts.len())?;
    for timeout in &frame.timeouts {
        write_u64_le(w, timeout.target_step.0)?;
        write_u64_le(w, timeout.target_key.0)?;
        write_u8(w, timeout.action.tag())?;
        write_u64_le(w, timeout.reschedule_step.0)?;
    }

    match frame.checkpoint {
        Some(checkpoint) => {
            write_u8(w, 1)?;
            write_u64_le(w, checkpoint.step.0)?;
            write_u64_le(w, checkpoint.state_hash)?;
        }
        None => write_u8(w, 0)?,
    }
    Ok(())
}

/// Decode a single frame.
///
/// Returns `Ok(None)` on clean EOF (no bytes available), `Ok(Some(frame))`
/// on success, or an error on truncated or corrupt data.
pub fn decode_frame(r: &mut dyn Read) -> Result<Option<Frame>, ReplayError> {
    // Read the step header byte-by-byte to tell clean EOF (zero bytes)
    // from truncation (1-7 bytes before EOF).
    let mut step_buf = [0u8; 8];
    let mut filled = 0;
    while filled < 8 {
        match r.read(&mut step_buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(ReplayError::MalformedFrame {
                    detail: format!("truncated frame header: got {filled} of 8 bytes for step"),
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReplayError::Io(e)),
        }
    }
    let step = StepId(u64::from_le_bytes(step_buf));
    let duration = read_fix64(r)?;

    let command_count = read_u32_le(r)? as usize;
    let mut commands = Vec::with_capacity(command_count.min(1024));
    for _ in 0..command_count {
        commands.push(SerializedCommand {
            player: read_u32_le(r)?,
            step: read_u64_le(r)?,
            priority: read_u8(r)?,
            order_key: read_u64_le(r)?,
            payload: read_length_prefixed_bytes(r)?,
        });
    }

    let timeout_count = read_u32_le(r)? as usize;
    let mut timeouts = Vec::with_capacity(timeout_count.min(1024));
    for _ in 0..timeout_count {
        let target_step = StepId(read_u64_le(r)?);
        let target_key = OrderKey(read_u64_le(r)?);
        let action = TimeoutAction::from_tag(read_u8(r)?)?;
        let reschedule_step = StepId(read_u64_le(r)?);
        timeouts.push(TimeoutCommand::new(
            target_step,
            target_key,
            action,
            reschedule_step,
        ));
    }

    let checkpoint = match read_u8(r)? {
        0 => None,
        1 => Some(Checkpoint {
            step: StepId(read_u64_le(r)?),
            state_hash: read_u64_le(r)?,
        }),
        flag => {
            return Err(ReplayError::MalformedFrame {
                detail: format!("invalid checkpoint presence flag: {flag}"),
            })
        }
    };

    Ok(Some(Frame {
        step,
        duration,
        commands,
        timeouts,
        checkpoint,
    }))
}

// ── Command serialization ───────────────────────────────────────

/// Convert a command to wire form.
pub fn serialize_command<P: PayloadCodec + CommandPayload>(command: &Command<P>) -> SerializedCommand {
    let mut payload = Vec::new();
    command.payload().encode(&mut payload);
    SerializedCommand {
        player: command.player().0,
        step: command.step().0,
        priority: command.priority().get(),
        order_key: command.order_key().0,
        payload,
    }
}

/// Rebuild a command from wire form.
///
/// Fails if the priority is out of range, the payload does not decode,
/// or the rebuilt command's order key differs from the recorded one.
pub fn deserialize_command<P: PayloadCodec + CommandPayload>(
    serialized: &SerializedCommand,
) -> Result<Command<P>, ReplayError> {
    let step = StepId(serialized.step);
    let priority = Priority::new(serialized.priority)?;
    let payload = P::decode(&serialized.payload)
        .map_err(|source| ReplayError::Payload { step, source })?;
    let command = Command::new(PlayerId(serialized.player), step, priority, payload);

    let recorded = OrderKey(serialized.order_key);
    let computed = command.order_key();
    if recorded != computed {
        return Err(ReplayError::OrderKeyMismatch {
            step,
            recorded,
            computed,
        });
    }
    Ok(command)
}
