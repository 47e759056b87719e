//! # Stable 64-bit byte-string hashing.
//!
//! FNV-1a over byte slices. Every canonical topic key and every [`KeyMap`]
//! probe sequence derives from this function, so it must stay stable across
//! platforms and releases — do not swap it for `std`'s randomized hasher.
//!
//! [`KeyMap`]: crate::KeyMap

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashes a byte string with FNV-1a (64-bit).
///
/// Deterministic across processes and platforms.
#[inline]
#[must_use]
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::fnv1a64;

    #[test]
    fn published_vectors() {
        // Reference values from the FNV specification.
        assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn deterministic_and_distinct() {
        assert_eq!(fnv1a64(b"A.B.C"), fnv1a64(b"A.B.C"));
        assert_ne!(fnv1a64(b"A.B.C"), fnv1a64(b"A.B.D"));
        assert_ne!(fnv1a64(b"A.B"), fnv1a64(b"AB"));
    }
}
