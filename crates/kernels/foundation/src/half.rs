//! IEEE 754 binary16 conversion for half-float streams.
//!
//! Narrowing rounds to nearest, ties to even. Values below the smallest
//! normal half become half subnormals; out-of-range values become infinity.

/// Converts an `f32` to half-precision bits.
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let exp = (bits >> 23) & 0xFF;
    let mant = bits & 0x7FFFFF;
    if exp == 0xFF {
        return (sign | 0x7C00 | if mant != 0 { 0x200 } else { 0 }) as u16;
    }
    let exp16 = (exp as i32) - 127 + 15;
    if exp16 >= 31 {
        return (sign | 0x7C00) as u16;
    }
    if exp16 <= 0 {
        // 2^-25 and below rounds to zero, even at the tie.
        if exp16 < -10 {
            return sign as u16;
        }
        let full = mant | 0x800000;
        let shift = (14 - exp16) as u32;
        return (sign | round_shift(full, shift)) as u16;
    }
    // A carry out of the mantissa bumps the exponent, up to infinity.
    (sign | (((exp16 as u32) << 10) + round_shift(mant, 13))) as u16
}

/// `value >> shift`, rounded to nearest with ties to even.
fn round_shift(value: u32, shift: u32) -> u32 {
    let kept = value >> shift;
    let rest = value & ((1 << shift) - 1);
    let halfway = 1 << (shift - 1);
    if rest > halfway || (rest == halfway && kept & 1 == 1) {
        kept + 1
    } else {
        kept
    }
}

/// Widens half-precision bits to `f32`. Subnormal halves are normalized.
pub fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = ((bits & 0x8000) as u32) << 16;
    let exp = (bits >> 10) & 0x1F;
    let mant = (bits & 0x03FF) as u32;
    let out = if exp == 0 {
        if mant == 0 {
            sign
        } else {
            let mut e: i32 = -14;
            let mut m = mant;
            while (m & 0x0400) == 0 {
                m <<= 1;
                e -= 1;
            }
            m &= 0x03FF;
            sign | (((e + 127) as u32) << 23) | (m << 13)
        }
    } else if exp == 0x1F {
        sign | 0x7F80_0000 | (mant << 13)
    } else {
        let exp32 = ((exp as i32) - 15 + 127) as u32;
        sign | (exp32 << 23) | (mant << 13)
    };
    f32::from_bits(out)
}
