//! Disjunctive Chaum-Pedersen proof that a ciphertext encrypts 0 or 1,
//! made non-interactive with the Fiat-Shamir transform.
//!
//! The prover runs the honest sigma-protocol for the branch matching the
//! real ballot bit and simulates the other branch backwards from a freely
//! chosen challenge/response pair. The hash of the full transcript pins the
//! two branch challenges to `c0 + c1 = H(...) mod q`, so at most one branch
//! can be simulated.

use crate::arith;
use crate::elgamal::{Ciphertext, ElectionParameters};
use crate::encoding::Canonical;
use crate::serde_hex::{BigUintHex, Hex};
use crate::Error;

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;

/// Transcript of the disjunctive proof. `a*`/`b*` are the branch
/// commitments, `c*`/`r*` the branch challenges and responses. Branch 0
/// asserts "the ciphertext encrypts 0", branch 1 "encrypts 1".
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct BallotProof {
    #[serde(with = "BigUintHex")]
    pub a0: BigUint,
    #[serde(with = "BigUintHex")]
    pub a1: BigUint,
    #[serde(with = "BigUintHex")]
    pub b0: BigUint,
    #[serde(with = "BigUintHex")]
    pub b1: BigUint,
    #[serde(with = "BigUintHex")]
    pub c0: BigUint,
    #[serde(with = "BigUintHex")]
    pub c1: BigUint,
    #[serde(with = "BigUintHex")]
    pub r0: BigUint,
    #[serde(with = "BigUintHex")]
    pub r1: BigUint,
}

/// Global Fiat-Shamir challenge over the group parameters, the ciphertext
/// and all four commitments.
fn global_challenge(
    params: &ElectionParameters,
    ciphertext: &Ciphertext,
    a0: &BigUint,
    a1: &BigUint,
    b0: &BigUint,
    b1: &BigUint,
) -> BigUint {
    Canonical::new()
        .uint(&params.p)
        .uint(&params.q)
        .uint(&params.g)
        .uint(&params.u)
        .uint(&ciphertext.v)
        .uint(&ciphertext.e)
        .uint(a0)
        .uint(a1)
        .uint(b0)
        .uint(b1)
        .challenge(&params.q)
}

/// `e / g^j mod p`: the value that equals `u^beta` when the ciphertext
/// encrypts `j`.
fn shifted_e(params: &ElectionParameters, ciphertext: &Ciphertext, j: u8) -> Result<BigUint, Error> {
    if j == 0 {
        return Ok(ciphertext.e.clone());
    }
    let g_inv = arith::mod_inverse(&params.g, &params.p)?;
    Ok((&ciphertext.e * g_inv) % &params.p)
}

/// Prove that `ciphertext` encrypts the bit `vote`, with `beta` the
/// encryption randomizer as witness. The proof is bound to this exact
/// ciphertext: altering `v` or `e` invalidates it.
pub fn prove(
    params: &ElectionParameters,
    vote: bool,
    ciphertext: &Ciphertext,
    beta: &BigUint,
) -> Result<BallotProof, Error> {
    let mut rng = OsRng;
    let p = &params.p;
    let q = &params.q;

    // Honest commitments for the real branch
    let w = arith::random_scalar(q);
    let a_real = params.g.modpow(&w, p);
    let b_real = params.u.modpow(&w, p);

    // Simulate the other branch backwards: pick its challenge and response,
    // then solve the verification equations for the commitments.
    let sim: u8 = if vote { 0 } else { 1 };
    let c_sim = rng.gen_biguint_below(q);
    let r_sim = rng.gen_biguint_below(q);

    let v_c_inv = arith::mod_inverse(&ciphertext.v.modpow(&c_sim, p), p)?;
    let a_sim = (params.g.modpow(&r_sim, p) * v_c_inv) % p;

    let e_sim = shifted_e(params, ciphertext, sim)?;
    let e_c_inv = arith::mod_inverse(&e_sim.modpow(&c_sim, p), p)?;
    let b_sim = (params.u.modpow(&r_sim, p) * e_c_inv) % p;

    let (a0, a1, b0, b1) = if vote {
        (a_sim, a_real, b_sim, b_real)
    } else {
        (a_real, a_sim, b_real, b_sim)
    };

    // Fiat-Shamir: the real branch absorbs whatever challenge is left over
    let c = global_challenge(params, ciphertext, &a0, &a1, &b0, &b1);
    let c_real = ((&c + q) - &c_sim) % q;
    let r_real = (&w + &c_real * beta) % q;

    let (c0, c1, r0, r1) = if vote {
        (c_sim, c_real, r_sim, r_real)
    } else {
        (c_real, c_sim, r_real, r_sim)
    };

    Ok(BallotProof {
        a0,
        a1,
        b0,
        b1,
        c0,
        c1,
        r0,
        r1,
    })
}

/// Verify a 0-or-1 ballot proof against its ciphertext.
pub fn verify(
    params: &ElectionParameters,
    ciphertext: &Ciphertext,
    proof: &BallotProof,
) -> Result<(), Error> {
    let p = &params.p;
    let q = &params.q;

    // The branch challenges must split the recomputed global challenge
    let c = global_challenge(
        params, ciphertext, &proof.a0, &proof.a1, &proof.b0, &proof.b1,
    );
    if (&proof.c0 + &proof.c1) % q != c {
        return Err(Error::InvalidProof);
    }

    let branches = [
        (0u8, &proof.a0, &proof.b0, &proof.c0, &proof.r0),
        (1u8, &proof.a1, &proof.b1, &proof.c1, &proof.r1),
    ];

    for &(j, a, b, c_j, r_j) in &branches {
        // g^r = A * v^c
        let lhs = params.g.modpow(r_j, p);
        let rhs = (a * ciphertext.v.modpow(c_j, p)) % p;
        if lhs != rhs {
            return Err(Error::InvalidProof);
        }

        // u^r = B * (e / g^j)^c
        let e_j = shifted_e(params, ciphertext, j)?;
        let lhs = params.u.modpow(r_j, p);
        let rhs = (b * e_j.modpow(c_j, p)) % p;
        if lhs != rhs {
            return Err(Error::InvalidProof);
        }
    }

    Ok(())
}
