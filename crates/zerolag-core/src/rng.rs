//! Deterministic random number generator for model code.
//!
//! [`SimRng`] is a single-`u64` multiply-rotate generator. It is `Copy`
//! and hashable so it can live inside a model, be snapshotted with it,
//! and contribute to the model's state hash. Output depends only on the
//! seed and the number of draws, never on platform or thread.

use crate::time::Fix64;

const MULTIPLIER: u64 = 6364136223846793005;
const INCREMENT: u64 = 2147483647;
const ROTATION: u32 = 17;

/// Seedable deterministic generator.
///
/// # Examples
///
/// ```
/// use zerolag_core::SimRng;
///
/// let mut a = SimRng::new(7);
/// let mut b = SimRng::new(7);
/// assert_eq!(a.range_i32(1, 6), b.range_i32(1, 6));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// The current internal state. Feeding it to [`SimRng::new`]
    /// continues the same sequence.
    pub fn seed(&self) -> u64 {
        self.state
    }

    /// Reset to `seed`.
    pub fn set_seed(&mut self, seed: u64) {
        self.state = seed;
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        self.state = MULTIPLIER
            .wrapping_mul(self.state.rotate_left(ROTATION))
            .wrapping_add(INCREMENT);
        self.state
    }

    /// Uniform integer in `[min, max]` (both inclusive).
    ///
    /// Returns `min` when `max <= min`.
    pub fn range_i32(&mut self, min: i32, max: i32) -> i32 {
        self.range_i64(min as i64, max as i64) as i32
    }

    /// Uniform integer in `[min, max]` (both inclusive).
    ///
    /// Returns `min` when `max <= min`.
    pub fn range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max as i128 - min as i128 + 1) as u128;
        let offset = (self.next_u64() as u128) % span;
        (min as i128 + offset as i128) as i64
    }

    /// Uniform index in `0..len`. Returns 0 for an empty range.
    pub fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_u64() % len as u64) as usize
    }

    /// Fixed-point value in `[min, max)`. Returns `min` when `max <= min`.
    pub fn range_fixed(&mut self, min: Fix64, max: Fix64) -> Fix64 {
        if max <= min {
            return min;
        }
        let span = max.saturating_sub(min);
        let raw = Fix64::from_bits((self.next_u64() >> 1) as i64);
        raw % span + min
    }

    /// True with probability `chance` (expected in `[0, 1]`).
    pub fn chance(&mut self, chance: Fix64) -> bool {
        chance > self.range_fixed(Fix64::ZERO, Fix64::ONE)
    }

    /// A uniformly chosen element, or `None` for an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        match items.len() {
            0 => None,
            1 => items.first(),
            n => items.get(self.index(n)),
        }
    }

    /// `count` distinct indices from `0..max`, in draw order.
    ///
    /// Returns all of `0..max` in order when `max <= count`.
    pub fn random_indexes(&mut self, max: usize, count: usize) -> Vec<usize> {
        if max <= count {
            return (0..max).collect();
        }
        let mut pool: Vec<usize> = (0..max).collect();
        let mut picked = Vec::with_capacity(count);
        for i in 0..count {
            let remaining = max - i;
            let slot = self.index(remaining);
            picked.push(pool[slot]);
            pool[slot] = pool[remaining - 1];
        }
        picked
    }

    /// Index drawn with probability proportional to `weights[i]`.
    ///
    /// Falls back to 0 when rounding leaves the draw unassigned.
    pub fn from_weights(&mut self, weights: &[Fix64]) -> usize {
        let total = weights
            .iter()
            .fold(Fix64::ZERO, |acc, w| acc.saturating_add(*w));
        let mut remaining = self.range_fixed(Fix64::ZERO, total);
        for (i, w) in weights.iter().enumerate() {
            remaining -= *w;
            if remaining <= Fix64::ZERO {
                return i;
            }
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fix_from_f64;
    use proptest::prelude::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SimRng::new(99);
        let mut b = SimRng::new(99);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn first_output_matches_recurrence() {
        let mut rng = SimRng::new(1);
        let expected = MULTIPLIER.wrapping_mul(1u64 << 17).wrapping_add(INCREMENT);
        assert_eq!(rng.next_u64(), expected);
        assert_eq!(rng.seed(), expected);
    }

    #[test]
    fn degenerate_ranges_return_min() {
        let mut rng = SimRng::new(3);
        assert_eq!(rng.range_i32(5, 5), 5);
        assert_eq!(rng.range_i32(5, 1), 5);
        let one = Fix64::ONE;
        assert_eq!(rng.range_fixed(one, one), one);
    }

    #[test]
    fn random_indexes_are_distinct() {
        let mut rng = SimRng::new(11);
        let mut picked = rng.random_indexes(20, 8);
        assert_eq!(picked.len(), 8);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 8);
        assert!(picked.iter().all(|&i| i < 20));

        assert_eq!(rng.random_indexes(3, 5), vec![0, 1, 2]);
    }

    #[test]
    fn from_weights_skips_zero_weights() {
        let mut rng = SimRng::new(5);
        let weights = [Fix64::ZERO, fix_from_f64(1.0), Fix64::ZERO];
        for _ in 0..50 {
            let i = rng.from_weights(&weights);
            assert!(i == 1 || i == 0, "got {i}");
        }
    }

    #[test]
    fn pick_handles_small_slices() {
        let mut rng = SimRng::new(8);
        let empty: [u8; 0] = [];
        assert_eq!(rng.pick(&empty), None);
        assert_eq!(rng.pick(&[4]), Some(&4));
    }

    proptest! {
        #[test]
        fn range_i32_stays_in_bounds(seed in any::<u64>(), a in -1000i32..1000, len in 0i32..1000) {
            let mut rng = SimRng::new(seed);
            let b = a + len;
            for _ in 0..16 {
                let v = rng.range_i32(a, b);
                prop_assert!(v >= a && v <= b);
            }
        }

        #[test]
        fn range_fixed_stays_in_bounds(seed in any::<u64>(), lo in -100i32..100, width in 1i32..100) {
            let mut rng = SimRng::new(seed);
            let min = Fix64::from_num(lo);
            let max = Fix64::from_num(lo + width);
            for _ in 0..16 {
                let v = rng.range_fixed(min, max);
                prop_assert!(v >= min && v < max);
            }
        }
    }
}
