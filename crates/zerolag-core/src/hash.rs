//! FNV-1a hashing helpers.
//!
//! Used for command content hashes, timeout record hashes, and any
//! model state hash that wants a cheap deterministic digest. These
//! hashes are not cryptographically secure. They only need to agree
//! bit-for-bit across peers and platforms.

/// FNV-1a offset basis for 64-bit.
pub const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
pub const FNV_PRIME: u64 = 0x00000100000001B3;

/// Incremental FNV-1a hasher over little-endian encoded values.
///
/// # Examples
///
/// ```
/// use zerolag_core::hash::Fnv1a;
///
/// let a = Fnv1a::new().u32(7).u64(42).finish();
/// let b = Fnv1a::new().u32(7).u64(42).finish();
/// assert_eq!(a, b);
/// assert_ne!(a, Fnv1a::new().u64(42).u32(7).finish());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Fnv1a(u64);

impl Fnv1a {
    /// Start a new hash at the offset basis.
    #[inline]
    pub fn new() -> Self {
        Self(FNV_OFFSET)
    }

    /// Feed a single byte.
    #[inline]
    pub fn byte(self, byte: u8) -> Self {
        Self((self.0 ^ byte as u64).wrapping_mul(FNV_PRIME))
    }

    /// Feed a byte slice.
    #[inline]
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        for &b in bytes {
            self = self.byte(b);
        }
        self
    }

    /// Feed a u32 as 4 LE bytes.
    #[inline]
    pub fn u32(self, v: u32) -> Self {
        self.bytes(&v.to_le_bytes())
    }

    /// Feed a u64 as 8 LE bytes.
    #[inline]
    pub fn u64(self, v: u64) -> Self {
        self.bytes(&v.to_le_bytes())
    }

    /// Feed an i64 as 8 LE bytes.
    #[inline]
    pub fn i64(self, v: i64) -> Self {
        self.bytes(&v.to_le_bytes())
    }

    /// The current hash value.
    #[inline]
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}
