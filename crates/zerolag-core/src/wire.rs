//! Byte encoding of command payloads.
//!
//! The engine never serializes payloads itself. Tools that persist or
//! transmit commands (replay files, network transports) require the
//! payload to implement [`PayloadCodec`].

use crate::error::DecodeError;

/// Stable byte form of a payload.
///
/// `decode(encode(p))` must yield a payload with the same
/// [`content_hash`](crate::CommandPayload::content_hash) as `p`, so that
/// a decoded command keeps its order key.
pub trait PayloadCodec: Sized {
    /// Append the encoded payload to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Rebuild a payload from exactly the bytes `encode` produced.
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError>;
}

/// Split a fixed-size little-endian field off the front of `bytes`.
///
/// Helper for [`PayloadCodec::decode`] implementations.
pub fn take_array<'a, const N: usize>(bytes: &mut &'a [u8]) -> Result<[u8; N], DecodeError> {
    let slice: &'a [u8] = *bytes;
    let (head, rest) = slice
        .split_first_chunk::<N>()
        .ok_or_else(|| DecodeError::new(format!("need {N} bytes, {} left", slice.len())))?;
    let head = *head;
    *bytes = rest;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_array_advances() {
        let data = [1u8, 0, 0, 0, 9];
        let mut rest = &data[..];
        assert_eq!(u32::from_le_bytes(take_array(&mut rest).unwrap()), 1);
        assert_eq!(rest, &[9]);
        assert!(take_array::<4>(&mut rest).is_err());
        assert_eq!(rest, &[9]);
    }
}
