//! Four-lane register value.
//!
//! A [`Register`] holds four 32-bit lanes that are interpreted as `f32`,
//! `i32` or bool depending on the opcode. Bools are all-ones for true and
//! zero for false, so they can be used directly as select masks.

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Lanes per register.
pub const LANES: usize = 4;

/// Bit pattern of a true bool lane.
pub const TRUE_BITS: u32 = 0xFFFF_FFFF;

#[derive(Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, align(16))]
pub struct Register(pub [u32; LANES]);

#[inline]
const fn bool_bits(b: bool) -> u32 {
    if b {
        TRUE_BITS
    } else {
        0
    }
}

impl Register {
    pub const ZERO: Self = Self([0; LANES]);

    #[inline]
    pub const fn splat_bits(bits: u32) -> Self {
        Self([bits; LANES])
    }

    #[inline]
    pub fn splat_f32(value: f32) -> Self {
        Self::splat_bits(value.to_bits())
    }

    #[inline]
    pub const fn splat_i32(value: i32) -> Self {
        Self::splat_bits(value as u32)
    }

    #[inline]
    pub const fn splat_bool(value: bool) -> Self {
        Self::splat_bits(bool_bits(value))
    }

    #[inline]
    pub fn from_f32(values: [f32; LANES]) -> Self {
        Self(values.map(f32::to_bits))
    }

    #[inline]
    pub fn from_i32(values: [i32; LANES]) -> Self {
        Self(values.map(|v| v as u32))
    }

    #[inline]
    pub fn from_bool(values: [bool; LANES]) -> Self {
        Self(values.map(bool_bits))
    }

    #[inline]
    pub fn f32s(self) -> [f32; LANES] {
        self.0.map(f32::from_bits)
    }

    #[inline]
    pub fn i32s(self) -> [i32; LANES] {
        self.0.map(|b| b as i32)
    }

    #[inline]
    pub fn bools(self) -> [bool; LANES] {
        self.0.map(|b| b != 0)
    }

    #[inline]
    pub fn map_f32(self, f: impl Fn(f32) -> f32) -> Self {
        Self(self.0.map(|b| f(f32::from_bits(b)).to_bits()))
    }

    #[inline]
    pub fn map_i32(self, f: impl Fn(i32) -> i32) -> Self {
        Self(self.0.map(|b| f(b as i32) as u32))
    }

    #[inline]
    pub fn map_bool(self, f: impl Fn(bool) -> bool) -> Self {
        Self(self.0.map(|b| bool_bits(f(b != 0))))
    }

    /// Float lanes in, int lanes out.
    #[inline]
    pub fn map_f32_to_i32(self, f: impl Fn(f32) -> i32) -> Self {
        Self(self.0.map(|b| f(f32::from_bits(b)) as u32))
    }

    /// Int lanes in, float lanes out.
    #[inline]
    pub fn map_i32_to_f32(self, f: impl Fn(i32) -> f32) -> Self {
        Self(self.0.map(|b| f(b as i32).to_bits()))
    }

    #[inline]
    pub fn zip_f32(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        let mut out = [0u32; LANES];
        for (lane, slot) in out.iter_mut().enumerate() {
            *slot = f(f32::from_bits(self.0[lane]), f32::from_bits(other.0[lane])).to_bits();
        }
        Self(out)
    }

    #[inline]
    pub fn zip_i32(self, other: Self, f: impl Fn(i32, i32) -> i32) -> Self {
        let mut out = [0u32; LANES];
        for (lane, slot) in out.iter_mut().enumerate() {
            *slot = f(self.0[lane] as i32, other.0[lane] as i32) as u32;
        }
        Self(out)
    }

    #[inline]
    pub fn zip_bool(self, other: Self, f: impl Fn(bool, bool) -> bool) -> Self {
        let mut out = [0u32; LANES];
        for (lane, slot) in out.iter_mut().enumerate() {
            *slot = bool_bits(f(self.0[lane] != 0, other.0[lane] != 0));
        }
        Self(out)
    }

    /// Lane-wise float comparison producing a bool mask.
    #[inline]
    pub fn cmp_f32(self, other: Self, f: impl Fn(f32, f32) -> bool) -> Self {
        let mut out = [0u32; LANES];
        for (lane, slot) in out.iter_mut().enumerate() {
            *slot = bool_bits(f(f32::from_bits(self.0[lane]), f32::from_bits(other.0[lane])));
        }
        Self(out)
    }

    /// Lane-wise int comparison producing a bool mask.
    #[inline]
    pub fn cmp_i32(self, other: Self, f: impl Fn(i32, i32) -> bool) -> Self {
        let mut out = [0u32; LANES];
        for (lane, slot) in out.iter_mut().enumerate() {
            *slot = bool_bits(f(self.0[lane] as i32, other.0[lane] as i32));
        }
        Self(out)
    }

    /// Picks `if_true` lanes where `self` is set, else `if_false` lanes.
    #[inline]
    pub fn select(self, if_true: Self, if_false: Self) -> Self {
        let mut out = [0u32; LANES];
        for (lane, slot) in out.iter_mut().enumerate() {
            *slot = if self.0[lane] != 0 {
                if_true.0[lane]
            } else {
                if_false.0[lane]
            };
        }
        Self(out)
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Register([{:#010x}, {:#010x}, {:#010x}, {:#010x}])",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<Register>(), 16);
        assert_eq!(std::mem::align_of::<Register>(), 16);
    }

    #[test]
    fn test_lane_views() {
        let r = Register::from_f32([1.0, -2.0, 0.5, 8.0]);
        assert_eq!(r.f32s(), [1.0, -2.0, 0.5, 8.0]);
        let i = Register::from_i32([-1, 0, 7, i32::MAX]);
        assert_eq!(i.i32s(), [-1, 0, 7, i32::MAX]);
        assert_eq!(Register::splat_bool(true).0, [TRUE_BITS; 4]);
    }

    #[test]
    fn test_zip_and_select() {
        let a = Register::from_f32([1.0, 2.0, 3.0, 4.0]);
        let b = Register::splat_f32(2.5);
        let sum = a.zip_f32(b, |x, y| x + y);
        assert_eq!(sum.f32s(), [3.5, 4.5, 5.5, 6.5]);

        let mask = a.cmp_f32(b, |x, y| x < y);
        assert_eq!(mask.bools(), [true, true, false, false]);
        assert_eq!(mask.select(a, b).f32s(), [1.0, 2.0, 2.5, 2.5]);
    }

    #[test]
    fn test_cast_slice() {
        let regs = [Register::splat_i32(1), Register::splat_i32(2)];
        let words: &[u32] = bytemuck::cast_slice(&regs);
        assert_eq!(words, &[1, 1, 1, 1, 2, 2, 2, 2]);
    }
}
