//! Canonical byte encoding shared by every hash and MAC in the system.
//!
//! Integers are serialized as their minimal unsigned big-endian
//! representation, strings as UTF-8, each prefixed by a 4-byte big-endian
//! length. Tuples are the concatenation of their components in declared
//! order. Prover and verifier both derive Fiat-Shamir challenges from the
//! same encoding, so the format must never change between releases.

use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};

/// Minimal unsigned big-endian bytes of `n`. Zero encodes as the empty
/// string.
pub fn uint_bytes(n: &BigUint) -> Vec<u8> {
    if n.is_zero() {
        Vec::new()
    } else {
        n.to_bytes_be()
    }
}

/// Accumulator for the canonical encoding.
#[derive(Default)]
pub struct Canonical {
    buf: Vec<u8>,
}

impl Canonical {
    pub fn new() -> Self {
        Canonical { buf: Vec::new() }
    }

    fn field(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn uint(self, n: &BigUint) -> Self {
        let bytes = uint_bytes(n);
        self.field(&bytes)
    }

    pub fn u64(self, n: u64) -> Self {
        let be = n.to_be_bytes();
        let first = be.iter().position(|&b| b != 0).unwrap_or(be.len());
        let minimal = be[first..].to_vec();
        self.field(&minimal)
    }

    pub fn byte(self, b: u8) -> Self {
        self.u64(b as u64)
    }

    pub fn text(self, s: &str) -> Self {
        self.field(s.as_bytes())
    }

    pub fn bytes(self, b: &[u8]) -> Self {
        self.field(b)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// SHA-256 of the accumulated encoding.
    pub fn digest(self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.buf);
        hasher.finalize().into()
    }

    /// Fiat-Shamir challenge: the digest interpreted as a big-endian
    /// integer, reduced modulo `q`.
    pub fn challenge(self, q: &BigUint) -> BigUint {
        BigUint::from_bytes_be(&self.digest()) % q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn uint_encoding_is_minimal() {
        assert!(uint_bytes(&BigUint::zero()).is_empty());
        assert_eq!(uint_bytes(&BigUint::from(1u32)), vec![1]);
        assert_eq!(uint_bytes(&BigUint::from(0x1234u32)), vec![0x12, 0x34]);
    }

    #[test]
    fn fields_are_length_prefixed() {
        let bytes = Canonical::new().text("ab").u64(0x0102).finish();
        assert_eq!(
            bytes,
            vec![0, 0, 0, 2, b'a', b'b', 0, 0, 0, 2, 0x01, 0x02]
        );
    }

    #[test]
    fn zero_u64_encodes_as_empty_field() {
        assert_eq!(Canonical::new().u64(0).finish(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn challenge_is_below_modulus() {
        let q = BigUint::from(97u32);
        let c = Canonical::new().text("transcript").challenge(&q);
        assert!(c < q);
    }

    #[test]
    fn encoding_is_injective_across_field_boundaries() {
        // ("ab", "c") and ("a", "bc") must not collide
        let one = Canonical::new().text("ab").text("c").finish();
        let two = Canonical::new().text("a").text("bc").finish();
        assert_ne!(one, two);
    }
}
