//! Canonical scalar arithmetic.
//!
//! Every operation the VM can evaluate has exactly one scalar definition
//! here. Constant folding calls these functions on compile-time values and
//! the VM handlers apply them lane by lane, so a folded constant is always
//! bit-identical to what execution would have produced.
//!
//! # Integer rules
//!
//! - Add, subtract, multiply, negate and abs wrap on overflow.
//! - Division by zero yields 0, and so modulo by zero yields the dividend.
//! - Shift counts are masked to `0..32`; right shift is arithmetic.
//!
//! # Float rules
//!
//! - Float to int truncates toward zero and saturates (NaN becomes 0).
//! - Round is ties-to-even.
//! - Min and max return the non-NaN operand when exactly one is NaN.
//!
//! # Composite operations
//!
//! Operations the VM has no opcode for (saturate, frac, modulo, pow, lerp,
//! smoothstep, ...) are lowered to primitive instructions by the compiler.
//! Their definitions here are written as the same sequence of primitives the
//! lowering emits.

use std::f32::consts::PI;

pub const RAD_TO_DEG: f32 = 180.0 / PI;
pub const DEG_TO_RAD: f32 = PI / 180.0;

// === Float primitives ===

#[inline]
pub fn add_f(a: f32, b: f32) -> f32 {
    a + b
}

#[inline]
pub fn sub_f(a: f32, b: f32) -> f32 {
    a - b
}

#[inline]
pub fn mul_f(a: f32, b: f32) -> f32 {
    a * b
}

#[inline]
pub fn div_f(a: f32, b: f32) -> f32 {
    a / b
}

#[inline]
pub fn min_f(a: f32, b: f32) -> f32 {
    a.min(b)
}

#[inline]
pub fn max_f(a: f32, b: f32) -> f32 {
    a.max(b)
}

#[inline]
pub fn abs_f(a: f32) -> f32 {
    a.abs()
}

#[inline]
pub fn sqrt_f(a: f32) -> f32 {
    a.sqrt()
}

#[inline]
pub fn exp_f(a: f32) -> f32 {
    a.exp()
}

#[inline]
pub fn ln_f(a: f32) -> f32 {
    a.ln()
}

#[inline]
pub fn log2_f(a: f32) -> f32 {
    a.log2()
}

#[inline]
pub fn log10_f(a: f32) -> f32 {
    a.log10()
}

#[inline]
pub fn pow2_f(a: f32) -> f32 {
    a.exp2()
}

#[inline]
pub fn sin_f(a: f32) -> f32 {
    a.sin()
}

#[inline]
pub fn cos_f(a: f32) -> f32 {
    a.cos()
}

#[inline]
pub fn tan_f(a: f32) -> f32 {
    a.tan()
}

#[inline]
pub fn asin_f(a: f32) -> f32 {
    a.asin()
}

#[inline]
pub fn acos_f(a: f32) -> f32 {
    a.acos()
}

#[inline]
pub fn atan_f(a: f32) -> f32 {
    a.atan()
}

#[inline]
pub fn round_f(a: f32) -> f32 {
    a.round_ties_even()
}

#[inline]
pub fn floor_f(a: f32) -> f32 {
    a.floor()
}

#[inline]
pub fn ceil_f(a: f32) -> f32 {
    a.ceil()
}

#[inline]
pub fn trunc_f(a: f32) -> f32 {
    a.trunc()
}

// === Int primitives ===

#[inline]
pub fn add_i(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

#[inline]
pub fn sub_i(a: i32, b: i32) -> i32 {
    a.wrapping_sub(b)
}

#[inline]
pub fn mul_i(a: i32, b: i32) -> i32 {
    a.wrapping_mul(b)
}

#[inline]
pub fn div_i(a: i32, b: i32) -> i32 {
    if b == 0 {
        0
    } else {
        a.wrapping_div(b)
    }
}

#[inline]
pub fn min_i(a: i32, b: i32) -> i32 {
    a.min(b)
}

#[inline]
pub fn max_i(a: i32, b: i32) -> i32 {
    a.max(b)
}

#[inline]
pub fn abs_i(a: i32) -> i32 {
    a.wrapping_abs()
}

#[inline]
pub fn shl_i(a: i32, b: i32) -> i32 {
    a.wrapping_shl(b as u32)
}

#[inline]
pub fn shr_i(a: i32, b: i32) -> i32 {
    a.wrapping_shr(b as u32)
}

#[inline]
pub fn and_i(a: i32, b: i32) -> i32 {
    a & b
}

#[inline]
pub fn xor_i(a: i32, b: i32) -> i32 {
    a ^ b
}

#[inline]
pub fn or_i(a: i32, b: i32) -> i32 {
    a | b
}

#[inline]
pub fn not_i(a: i32) -> i32 {
    !a
}

/// Floor of log2 for positive values, 0 otherwise.
#[inline]
pub fn log2_i(a: i32) -> i32 {
    if a > 0 {
        31 - a.leading_zeros() as i32
    } else {
        0
    }
}

// === Bool primitives ===

#[inline]
pub fn not_b(a: bool) -> bool {
    !a
}

#[inline]
pub fn and_b(a: bool, b: bool) -> bool {
    a && b
}

#[inline]
pub fn or_b(a: bool, b: bool) -> bool {
    a || b
}

// === Conversions ===

#[inline]
pub fn i_to_f(a: i32) -> f32 {
    a as f32
}

#[inline]
pub fn f_to_i(a: f32) -> i32 {
    a as i32
}

// === Composites ===

#[inline]
pub fn neg_f(a: f32) -> f32 {
    sub_f(0.0, a)
}

#[inline]
pub fn neg_i(a: i32) -> i32 {
    sub_i(0, a)
}

#[inline]
pub fn saturate_f(a: f32) -> f32 {
    max_f(0.0, min_f(1.0, a))
}

#[inline]
pub fn saturate_i(a: i32) -> i32 {
    max_i(0, min_i(1, a))
}

#[inline]
pub fn frac_f(a: f32) -> f32 {
    sub_f(a, trunc_f(a))
}

#[inline]
pub fn rad_to_deg(a: f32) -> f32 {
    mul_f(a, RAD_TO_DEG)
}

#[inline]
pub fn deg_to_rad(a: f32) -> f32 {
    mul_f(a, DEG_TO_RAD)
}

/// `a - b * trunc(a / b)`.
#[inline]
pub fn mod_f(a: f32, b: f32) -> f32 {
    sub_f(a, mul_f(b, trunc_f(div_f(a, b))))
}

/// `a - b * (a / b)` with integer division.
#[inline]
pub fn mod_i(a: i32, b: i32) -> i32 {
    sub_i(a, mul_i(b, div_i(a, b)))
}

#[inline]
pub fn pow2_i(a: i32) -> i32 {
    shl_i(1, a)
}

/// Logarithm of `value` to `base`.
#[inline]
pub fn log_f(base: f32, value: f32) -> f32 {
    if base == 2.0 {
        log2_f(value)
    } else {
        mul_f(log2_f(value), div_f(1.0, log2_f(base)))
    }
}

#[inline]
pub fn clamp_f(value: f32, low: f32, high: f32) -> f32 {
    max_f(low, min_f(high, value))
}

#[inline]
pub fn clamp_i(value: i32, low: i32, high: i32) -> i32 {
    max_i(low, min_i(high, value))
}

/// `a + s * (b - a)`.
#[inline]
pub fn lerp_f(a: f32, b: f32, s: f32) -> f32 {
    add_f(a, mul_f(s, sub_f(b, a)))
}

/// Normalized position of `x` between the edges, clamped to `[0, 1]`.
#[inline]
pub fn step_param(edge0: f32, edge1: f32, x: f32) -> f32 {
    saturate_f(div_f(sub_f(x, edge0), sub_f(edge1, edge0)))
}

/// `t * t * (3 - 2 * t)`.
#[inline]
pub fn smoothstep_f(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = step_param(edge0, edge1, x);
    mul_f(mul_f(t, t), sub_f(3.0, mul_f(2.0, t)))
}

/// `t * t * t * (t * (t * 6 - 15) + 10)`.
#[inline]
pub fn smootherstep_f(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = step_param(edge0, edge1, x);
    let inner = add_f(mul_f(t, sub_f(mul_f(t, 6.0), 15.0)), 10.0);
    mul_f(mul_f(mul_f(t, t), t), inner)
}

// === Pow ===

/// Multiplication chains for whole exponents 2..=16.
///
/// `values[0]` is the base; step `i` appends `values[a] * values[b]` as
/// `values[i + 1]`. The last value is the result.
const POW_CHAINS: [&[(u8, u8)]; 15] = [
    &[(0, 0)],
    &[(0, 0), (1, 0)],
    &[(0, 0), (1, 1)],
    &[(0, 0), (1, 1), (2, 0)],
    &[(0, 0), (1, 0), (2, 2)],
    &[(0, 0), (1, 0), (2, 2), (3, 0)],
    &[(0, 0), (1, 1), (2, 2)],
    &[(0, 0), (1, 1), (2, 2), (3, 0)],
    &[(0, 0), (1, 1), (2, 0), (3, 3)],
    &[(0, 0), (1, 1), (2, 0), (3, 3), (4, 0)],
    &[(0, 0), (1, 0), (2, 2), (3, 3)],
    &[(0, 0), (1, 0), (2, 2), (3, 3), (4, 0)],
    &[(0, 0), (1, 0), (2, 2), (3, 0), (4, 4)],
    &[(0, 0), (1, 0), (2, 2), (3, 3), (4, 2)],
    &[(0, 0), (1, 1), (2, 2), (3, 3)],
];

/// Multiplication chain for `exponent`, if it lies in 2..=16.
pub fn pow_chain(exponent: i32) -> Option<&'static [(u8, u8)]> {
    if (2..=16).contains(&exponent) {
        Some(POW_CHAINS[(exponent - 2) as usize])
    } else {
        None
    }
}

/// Whole-number float exponent usable with [`pow_chain`].
pub fn whole_exponent(exponent: f32) -> Option<i32> {
    if exponent.fract() == 0.0 && (2.0..=16.0).contains(&exponent) {
        Some(exponent as i32)
    } else {
        None
    }
}

/// Evaluates a multiplication chain with the given multiply.
pub fn eval_chain<T: Copy>(base: T, chain: &[(u8, u8)], mut mul: impl FnMut(T, T) -> T) -> T {
    let mut values = [base; 16];
    for (step, &(a, b)) in chain.iter().enumerate() {
        values[step + 1] = mul(values[a as usize], values[b as usize]);
    }
    values[chain.len()]
}

pub fn pow_f(base: f32, exponent: f32) -> f32 {
    if base == 2.0 {
        return pow2_f(exponent);
    }
    if exponent == 1.0 {
        return base;
    }
    if let Some(chain) = whole_exponent(exponent).and_then(pow_chain) {
        return eval_chain(base, chain, mul_f);
    }
    pow2_f(mul_f(exponent, log2_f(base)))
}

pub fn pow_i(base: i32, exponent: i32) -> i32 {
    if base == 2 {
        return pow2_i(exponent);
    }
    if exponent == 1 {
        return base;
    }
    if let Some(chain) = pow_chain(exponent) {
        return eval_chain(base, chain, mul_i);
    }
    f_to_i(round_f(pow2_f(mul_f(i_to_f(exponent), log2_f(i_to_f(base))))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_division_by_zero() {
        assert_eq!(div_i(7, 0), 0);
        assert_eq!(mod_i(7, 0), 7);
        assert_eq!(div_i(i32::MIN, -1), i32::MIN);
        assert_eq!(div_i(-7, 2), -3);
    }

    #[test]
    fn test_shift_masking() {
        assert_eq!(shl_i(1, 33), 2);
        assert_eq!(shr_i(-8, 1), -4);
        assert_eq!(shl_i(1, 31), i32::MIN);
    }

    #[test]
    fn test_wrapping() {
        assert_eq!(add_i(i32::MAX, 1), i32::MIN);
        assert_eq!(abs_i(i32::MIN), i32::MIN);
        assert_eq!(neg_i(i32::MIN), i32::MIN);
    }

    #[test]
    fn test_float_to_int() {
        assert_eq!(f_to_i(2.9), 2);
        assert_eq!(f_to_i(-2.9), -2);
        assert_eq!(f_to_i(f32::NAN), 0);
        assert_eq!(f_to_i(1.0e20), i32::MAX);
    }

    #[test]
    fn test_round_ties_even() {
        assert_eq!(round_f(0.5), 0.0);
        assert_eq!(round_f(1.5), 2.0);
        assert_eq!(round_f(2.5), 2.0);
        assert_eq!(round_f(-1.5), -2.0);
    }

    #[test]
    fn test_log2_i() {
        assert_eq!(log2_i(1), 0);
        assert_eq!(log2_i(8), 3);
        assert_eq!(log2_i(9), 3);
        assert_eq!(log2_i(0), 0);
        assert_eq!(log2_i(-4), 0);
    }

    #[test]
    fn test_min_max_nan() {
        assert_eq!(min_f(f32::NAN, 1.0), 1.0);
        assert_eq!(max_f(2.0, f32::NAN), 2.0);
    }

    #[test]
    fn test_pow_chains_compute_powers() {
        for exponent in 2..=16 {
            let chain = pow_chain(exponent).unwrap();
            assert_eq!(eval_chain(3i64, chain, |a, b| a * b), 3i64.pow(exponent as u32));
        }
        assert!(pow_chain(1).is_none());
        assert!(pow_chain(17).is_none());
    }

    #[test]
    fn test_pow() {
        assert_eq!(pow_f(3.0, 2.0), 9.0);
        assert_eq!(pow_f(2.0, 10.0), 1024.0);
        assert_eq!(pow_f(5.0, 1.0), 5.0);
        assert!((pow_f(9.0, 0.5) - 3.0).abs() < 1e-5);
        assert_eq!(pow_i(3, 4), 81);
        assert_eq!(pow_i(2, 5), 32);
        assert_eq!(pow_i(4, 0), 1);
    }

    #[test]
    fn test_composites() {
        assert_eq!(saturate_f(1.7), 1.0);
        assert_eq!(saturate_f(-0.2), 0.0);
        assert_eq!(frac_f(2.75), 0.75);
        assert_eq!(frac_f(-2.75), -0.75);
        assert_eq!(mod_f(7.5, 2.0), 1.5);
        assert_eq!(mod_i(-7, 3), -1);
        assert_eq!(lerp_f(2.0, 4.0, 0.25), 2.5);
        assert_eq!(clamp_i(12, 0, 10), 10);
        assert_eq!(log_f(2.0, 8.0), 3.0);
        assert!((log_f(10.0, 1000.0) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_smoothstep() {
        assert_eq!(smoothstep_f(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep_f(0.0, 1.0, 0.5), 0.5);
        assert_eq!(smoothstep_f(0.0, 1.0, 2.0), 1.0);
        assert_eq!(smootherstep_f(0.0, 1.0, 0.5), 0.5);
        assert_eq!(smootherstep_f(0.0, 1.0, 1.0), 1.0);
    }
}
