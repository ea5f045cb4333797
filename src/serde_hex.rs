// We define in our crate:
use crate::Error;
use ed25519_dalek::PublicKey;
use num_bigint::BigUint;
use std::borrow::Cow;

pub use hex_buffer_serde::Hex;

// a single-purpose type for use in `#[serde(with)]`
pub enum BigUintHex {}

impl Hex<BigUint> for BigUintHex {
    type Error = Error;

    fn create_bytes(value: &BigUint) -> Cow<[u8]> {
        value.to_bytes_be().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<BigUint, Error> {
        Ok(BigUint::from_bytes_be(bytes))
    }
}

// a single-purpose type for use in `#[serde(with)]`
pub enum DigestHex {}

impl Hex<[u8; 32]> for DigestHex {
    type Error = Error;

    fn create_bytes(value: &[u8; 32]) -> Cow<[u8]> {
        value.as_ref().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<[u8; 32], Error> {
        if bytes.len() != 32 {
            return Err(Error::DigestBadLen);
        }

        let mut digest = [0u8; 32];
        digest.copy_from_slice(bytes);
        Ok(digest)
    }
}

// a single-purpose type for use in `#[serde(with)]`
pub enum EdPublicKeyHex {}

impl Hex<PublicKey> for EdPublicKeyHex {
    type Error = Error;

    fn create_bytes(public_key: &PublicKey) -> Cow<[u8]> {
        public_key.as_ref().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<PublicKey, Error> {
        Ok(PublicKey::from_bytes(bytes)?)
    }
}
