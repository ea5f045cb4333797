//! Exponential ElGamal over a safe-prime group.
//!
//! Ballots are encrypted as `(g^beta, u^beta * g^m)`, so the componentwise
//! product of ciphertexts encrypts the sum of the plaintexts and the final
//! tally is recovered with a bounded discrete-log search.

use crate::arith;
use crate::serde_hex::{BigUintHex, Hex};
use crate::Error;

use log::debug;
use num_bigint::BigUint;

/// Public group parameters `(p, q, g)` plus the election public key
/// `u = g^alpha mod p`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ElectionParameters {
    #[serde(with = "BigUintHex")]
    pub p: BigUint,
    #[serde(with = "BigUintHex")]
    pub q: BigUint,
    #[serde(with = "BigUintHex")]
    pub g: BigUint,
    #[serde(with = "BigUintHex")]
    pub u: BigUint,
}

/// The decryption exponent `alpha`, held only by the Authority.
///
/// Deliberately not serializable: the exponent never leaves the process
/// that generated it.
pub struct PrivateExponent {
    alpha: BigUint,
}

/// An ElGamal ciphertext `(v, e) = (g^beta, u^beta * g^m)`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Ciphertext {
    #[serde(with = "BigUintHex")]
    pub v: BigUint,
    #[serde(with = "BigUintHex")]
    pub e: BigUint,
}

/// Generate fresh group parameters and a decryption exponent.
pub fn keygen(bits: u64) -> Result<(ElectionParameters, PrivateExponent), Error> {
    let (p, q) = arith::gen_safe_prime(bits)?;
    let g = arith::find_generator(&p, &q)?;
    let alpha = arith::random_scalar(&q);
    let u = g.modpow(&alpha, &p);
    debug!("election keypair generated ({} bit modulus)", bits);

    Ok((
        ElectionParameters { p, q, g, u },
        PrivateExponent { alpha },
    ))
}

impl ElectionParameters {
    /// Encrypt a small non-negative plaintext (a ballot bit, in practice).
    /// Returns the ciphertext together with the randomizer actually used,
    /// which the ballot proof needs as its witness.
    pub fn encrypt(&self, m: u64, beta: Option<BigUint>) -> (Ciphertext, BigUint) {
        let beta = beta.unwrap_or_else(|| arith::random_scalar(&self.q));
        let v = self.g.modpow(&beta, &self.p);
        let u_beta = self.u.modpow(&beta, &self.p);
        let g_m = self.g.modpow(&BigUint::from(m), &self.p);
        let e = (u_beta * g_m) % &self.p;

        (Ciphertext { v, e }, beta)
    }

    /// Re-encrypt: `(v * g^r, e * u^r)`. The plaintext is unchanged and the
    /// output is unlinkable to the input without `r`.
    pub fn rerandomize(&self, ciphertext: &Ciphertext, r: Option<BigUint>) -> (Ciphertext, BigUint) {
        let r = r.unwrap_or_else(|| arith::random_scalar(&self.q));
        let v = (&ciphertext.v * self.g.modpow(&r, &self.p)) % &self.p;
        let e = (&ciphertext.e * self.u.modpow(&r, &self.p)) % &self.p;

        (Ciphertext { v, e }, r)
    }

    /// Componentwise product of a batch of ciphertexts. Decrypting the
    /// result yields the sum of the plaintexts, provided the sum stays
    /// within the caller's discrete-log bound.
    pub fn homomorphic_sum(&self, ciphertexts: &[Ciphertext]) -> Result<Ciphertext, Error> {
        if ciphertexts.is_empty() {
            return Err(Error::ParameterError(
                "homomorphic sum of an empty batch".to_string(),
            ));
        }

        let mut v = BigUint::from(1u32);
        let mut e = BigUint::from(1u32);
        for ciphertext in ciphertexts {
            v = (v * &ciphertext.v) % &self.p;
            e = (e * &ciphertext.e) % &self.p;
        }

        Ok(Ciphertext { v, e })
    }
}

impl PrivateExponent {
    /// Decrypt a ciphertext: recover `g^m = e * (v^alpha)^-1` and search
    /// the exponent up to `max_m`.
    pub fn decrypt(
        &self,
        params: &ElectionParameters,
        ciphertext: &Ciphertext,
        max_m: u64,
    ) -> Result<u64, Error> {
        let v_alpha = ciphertext.v.modpow(&self.alpha, &params.p);
        let v_alpha_inv = arith::mod_inverse(&v_alpha, &params.p)?;
        let g_m = (&ciphertext.e * v_alpha_inv) % &params.p;

        arith::discrete_log_bounded(&g_m, &params.g, &params.p, max_m)
    }
}
