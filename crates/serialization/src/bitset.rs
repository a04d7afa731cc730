//! Fixed-width bitset packed as a single `u64`

use std::fmt;
use std::mem::size_of;

use crate::error::Result;
use crate::packing::Packing;

/// A set of `N` flags, `N <= 64`
///
/// Packs as its `u64` representation. Widths above 64 are rejected when
/// the type is instantiated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bitset<const N: usize> {
    bits: u64,
}

impl<const N: usize> Bitset<N> {
    const WIDTH_CHECK: () = assert!(N <= 64, "Bitset width must not exceed 64");

    const MASK: u64 = if N >= 64 { u64::MAX } else { (1u64 << N) - 1 };

    /// All bits clear.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::WIDTH_CHECK;
        Self { bits: 0 }
    }

    /// Build from the low `N` bits of `value`.
    pub fn from_u64(value: u64) -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::WIDTH_CHECK;
        Self {
            bits: value & Self::MASK,
        }
    }

    /// The bits as an integer; bit `i` is flag `i`.
    pub fn to_u64(&self) -> u64 {
        self.bits
    }

    /// Number of flags.
    pub const fn len(&self) -> usize {
        N
    }

    /// True when `N == 0`.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Set or clear flag `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, value: bool) {
        if index >= N {
            return;
        }
        if value {
            self.bits |= 1 << index;
        } else {
            self.bits &= !(1 << index);
        }
    }

    /// Flag `index`; false when out of range.
    pub fn test(&self, index: usize) -> bool {
        index < N && self.bits & (1 << index) != 0
    }

    /// Number of set flags.
    pub fn count(&self) -> u32 {
        self.bits.count_ones()
    }

    /// At least one flag set.
    pub fn any(&self) -> bool {
        self.bits != 0
    }

    /// No flag set.
    pub fn none(&self) -> bool {
        self.bits == 0
    }

    /// Every flag set.
    pub fn all(&self) -> bool {
        self.bits == Self::MASK
    }
}

impl<const N: usize> From<u64> for Bitset<N> {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl<const N: usize> fmt::Debug for Bitset<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitset<{}>(", N)?;
        for i in (0..N).rev() {
            f.write_str(if self.test(i) { "1" } else { "0" })?;
        }
        f.write_str(")")
    }
}

impl<const N: usize> Packing for Bitset<N> {
    fn pack_size(&self) -> usize {
        size_of::<u64>()
    }

    fn pack(&self, buffer: &mut Vec<u8>, position: &mut usize) {
        self.bits.pack(buffer, position);
    }

    fn unpack(&mut self, buffer: &[u8], position: &mut usize) -> Result<()> {
        let mut value = 0u64;
        value.unpack(buffer, position)?;
        *self = Self::from_u64(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_8_value_5() {
        let b = Bitset::<8>::from_u64(5);
        assert!(b.test(0));
        assert!(!b.test(1));
        assert!(b.test(2));
        assert_eq!(b.count(), 2);

        let mut buffer = Vec::new();
        let mut position = 0;
        b.pack(&mut buffer, &mut position);
        assert_eq!(position, 8);

        let mut out = Bitset::<8>::new();
        out.unpack(&buffer, &mut 0).unwrap();
        assert_eq!(out, b);
        assert_eq!(out.to_u64(), 5);
    }

    #[test]
    fn test_unpack_masks_high_bits() {
        let mut buffer = Vec::new();
        let mut position = 0;
        u64::MAX.pack(&mut buffer, &mut position);

        let mut out = Bitset::<3>::new();
        out.unpack(&buffer, &mut 0).unwrap();
        assert_eq!(out.to_u64(), 0b111);
        assert!(out.all());
    }

    #[test]
    fn test_full_width() {
        let b = Bitset::<64>::from_u64(u64::MAX);
        assert!(b.all());
        assert_eq!(b.count(), 64);
        assert!(b.test(63));
    }

    #[test]
    fn test_set_and_clear() {
        let mut b = Bitset::<4>::new();
        assert!(b.none());
        b.set(3, true);
        b.set(9, true);
        assert_eq!(b.to_u64(), 0b1000);
        b.set(3, false);
        assert!(b.none());
    }

    #[test]
    fn test_debug_msb_first() {
        let b = Bitset::<4>::from(0b0110);
        assert_eq!(format!("{:?}", b), "Bitset<4>(0110)");
    }
}
