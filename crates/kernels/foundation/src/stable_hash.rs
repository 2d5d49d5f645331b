//! Stable hashing for structural node identity.
//!
//! The AST deduplication table keys nodes by a 64-bit structural hash. The
//! hash must not depend on process state (no `RandomState`), so that the same
//! expression always produces the same bucket and the same compiled program.
//! These helpers provide FNV-1a 64-bit plus a small incremental hasher.
//!
//! NOTE: FNV-1a is **not** cryptographically secure. Equal hashes are always
//! confirmed with a full structural comparison.

/// 64-bit FNV-1a offset basis.
pub const FNV1A_OFFSET_BASIS_64: u64 = 0xcbf29ce484222325;
/// 64-bit FNV-1a prime.
pub const FNV1A_PRIME_64: u64 = 0x0000_0100_0000_01B3;

/// Mix bytes into an existing FNV-1a 64-bit hash state.
///
/// For each byte: XOR it into the hash, then multiply by the FNV prime.
///
/// # Example
/// ```
/// use lanevm_foundation::stable_hash::{fnv1a64_mix, FNV1A_OFFSET_BASIS_64};
///
/// let hash = fnv1a64_mix(FNV1A_OFFSET_BASIS_64, b"pos");
/// let hash = fnv1a64_mix(hash, b".x");
/// ```
#[inline]
pub const fn fnv1a64_mix(mut hash: u64, bytes: &[u8]) -> u64 {
    let mut i = 0usize;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV1A_PRIME_64);
        i += 1;
    }
    hash
}

/// Hash an arbitrary byte slice with FNV-1a 64-bit.
#[inline]
pub const fn fnv1a64(bytes: &[u8]) -> u64 {
    fnv1a64_mix(FNV1A_OFFSET_BASIS_64, bytes)
}

/// Incremental FNV-1a hasher over typed fields.
///
/// Each write mixes the little-endian bytes of the value, so the result is
/// identical on every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableHasher {
    state: u64,
}

impl Default for StableHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StableHasher {
    /// Creates a hasher seeded with the FNV offset basis.
    #[inline]
    pub const fn new() -> Self {
        Self {
            state: FNV1A_OFFSET_BASIS_64,
        }
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.state = fnv1a64_mix(self.state, &[value]);
        self
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.state = fnv1a64_mix(self.state, &value.to_le_bytes());
        self
    }

    #[inline]
    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.state = fnv1a64_mix(self.state, &value.to_le_bytes());
        self
    }

    /// Mixes a string followed by a terminator, so `("ab", "c")` and
    /// `("a", "bc")` hash differently.
    #[inline]
    pub fn write_str(&mut self, value: &str) -> &mut Self {
        self.state = fnv1a64_mix(self.state, value.as_bytes());
        self.state = fnv1a64_mix(self.state, &[0xff]);
        self
    }

    /// Returns the current hash state.
    #[inline]
    pub const fn finish(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// FNV-1a 64-bit reference values.
    #[test]
    fn fnv1a64_reference_values() {
        assert_eq!(fnv1a64(b""), FNV1A_OFFSET_BASIS_64);

        let a_hash = fnv1a64(b"a");
        let expected_a = (FNV1A_OFFSET_BASIS_64 ^ 0x61).wrapping_mul(FNV1A_PRIME_64);
        assert_eq!(a_hash, expected_a);

        assert_eq!(fnv1a64(b"hello"), 11831194018420276491);
    }

    #[test]
    fn fnv1a64_mix_incremental() {
        let full = fnv1a64(b"pos.x");
        let incremental = fnv1a64_mix(fnv1a64_mix(FNV1A_OFFSET_BASIS_64, b"pos"), b".x");
        assert_eq!(full, incremental);
    }

    #[test]
    fn test_hasher_is_deterministic() {
        let mut a = StableHasher::new();
        a.write_u8(3).write_u32(7).write_str("pos");
        let mut b = StableHasher::new();
        b.write_u8(3).write_u32(7).write_str("pos");
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_hasher_separates_string_boundaries() {
        let mut a = StableHasher::new();
        a.write_str("ab").write_str("c");
        let mut b = StableHasher::new();
        b.write_str("a").write_str("bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_hasher_field_order_matters() {
        let mut a = StableHasher::new();
        a.write_u64(1).write_u64(2);
        let mut b = StableHasher::new();
        b.write_u64(2).write_u64(1);
        assert_ne!(a.finish(), b.finish());
    }
}
