//! Strongly-typed identifiers and the command [`OrderKey`].

use std::fmt;

use crate::error::CommandError;

/// Index of a discrete simulation step.
///
/// Step 0 is the state of the zero model before any command has been
/// applied. Applying the commands of step `n` produces step `n + 1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub u64);

impl StepId {
    /// The first step of every match.
    pub const ZERO: StepId = StepId(0);

    /// The step immediately after this one.
    #[inline]
    pub fn next(self) -> StepId {
        StepId(self.0 + 1)
    }

    /// Step `n` steps later.
    #[inline]
    pub fn after(self, n: u64) -> StepId {
        StepId(self.0.saturating_add(n))
    }

    /// Step `n` steps earlier, clamped at step 0.
    #[inline]
    pub fn before(self, n: u64) -> StepId {
        StepId(self.0.saturating_sub(n))
    }

    /// Number of steps from `earlier` to `self`, or 0 if `earlier` is later.
    #[inline]
    pub fn steps_since(self, earlier: StepId) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StepId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies the player (peer) that issued a command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PlayerId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Command priority in `0..=3`.
///
/// Higher priority commands execute *after* lower priority commands of
/// the same step, so their effects take precedence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority.
    pub const MIN: Priority = Priority(0);
    /// Highest priority.
    pub const MAX: Priority = Priority(3);

    /// Create a priority, rejecting values above [`Priority::MAX`].
    pub fn new(value: u8) -> Result<Self, CommandError> {
        if value > Self::MAX.0 {
            return Err(CommandError::InvalidPriority { value });
        }
        Ok(Self(value))
    }

    /// The raw priority value.
    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Priority {
    type Error = CommandError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

/// Deterministic intra-step sort key of a command.
///
/// Built from the command's content hash with its 3 low bits discarded
/// and the priority spliced into the top bits:
/// `(hash >> 3) | (priority << 61)`. Every peer computes the same key for
/// the same command, so sorting by it yields one execution order without
/// a central sequencer. The bit layout is part of the cross-peer
/// contract and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderKey(pub u64);

impl OrderKey {
    /// Number of low content-hash bits dropped to make room for priority.
    pub const PRIORITY_SHIFT: u32 = 61;

    /// Combine a content hash and a priority into an order key.
    #[inline]
    pub fn new(content_hash: u64, priority: Priority) -> Self {
        Self((content_hash >> 3) | ((priority.get() as u64) << Self::PRIORITY_SHIFT))
    }

    /// The priority encoded in the top bits.
    #[inline]
    pub fn priority(self) -> Priority {
        Priority(((self.0 >> Self::PRIORITY_SHIFT) & 0b11) as u8)
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn priority_rejects_out_of_range() {
        assert!(Priority::new(3).is_ok());
        assert_eq!(
            Priority::new(4),
            Err(CommandError::InvalidPriority { value: 4 })
        );
    }

    #[test]
    fn order_key_layout() {
        let key = OrderKey::new(0xFFFF_FFFF_FFFF_FFFF, Priority::MIN);
        assert_eq!(key.0, 0x1FFF_FFFF_FFFF_FFFF);

        let key = OrderKey::new(0b1000, Priority::MAX);
        assert_eq!(key.0, (3u64 << 61) | 1);
        assert_eq!(key.priority(), Priority::MAX);
    }

    #[test]
    fn order_key_discards_low_three_bits() {
        let a = OrderKey::new(0b1_0000, Priority::MIN);
        let b = OrderKey::new(0b1_0111, Priority::MIN);
        assert_eq!(a, b);
    }

    #[test]
    fn step_arithmetic_saturates() {
        assert_eq!(StepId(3).before(5), StepId::ZERO);
        assert_eq!(StepId(3).steps_since(StepId(10)), 0);
        assert_eq!(StepId(10).steps_since(StepId(3)), 7);
        assert_eq!(StepId(u64::MAX).after(1), StepId(u64::MAX));
    }

    proptest! {
        #[test]
        fn higher_priority_always_orders_later(
            low_hash in any::<u64>(),
            high_hash in any::<u64>(),
            low in 0u8..3,
            bump in 1u8..=3,
        ) {
            let high = (low + bump).min(3);
            prop_assume!(high > low);
            let low_key = OrderKey::new(low_hash, Priority::new(low).unwrap());
            let high_key = OrderKey::new(high_hash, Priority::new(high).unwrap());
            prop_assert!(low_key < high_key);
        }
    }
}
