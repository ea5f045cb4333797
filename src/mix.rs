//! Re-encryption mixnet: permute a batch of ballot ciphertexts and
//! re-encrypt every element so that no observer of the input and output
//! batches can link a ballot to its voter.
//!
//! The accompanying proof shows that the homomorphic aggregate of the
//! output batch is a re-encryption of the aggregate of the input batch:
//! the mixer reveals the aggregate randomizer `R = sum(r_i) mod q` and a
//! Schnorr proof of knowledge of it. This preserves the plaintext sum,
//! which is what the additive tally consumes. It is not a per-ballot
//! shuffle proof; a stronger proof system can replace `MixProof` without
//! changing the mixing interface.

use crate::arith;
use crate::elgamal::{Ciphertext, ElectionParameters};
use crate::encoding::Canonical;
use crate::serde_hex::{BigUintHex, DigestHex, Hex};
use crate::Error;

use log::debug;
use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;

/// Proof of correct aggregate re-encryption.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct MixProof {
    /// Aggregate re-encryption randomizer `R = sum(r_i) mod q`.
    #[serde(with = "BigUintHex")]
    pub aggregate_r: BigUint,
    /// Schnorr commitment `t = g^w`.
    #[serde(with = "BigUintHex")]
    pub commitment: BigUint,
    /// Schnorr response `s = w + c * R mod q`.
    #[serde(with = "BigUintHex")]
    pub response: BigUint,
}

/// Public record of one mix operation, as published to observers.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MixRecord {
    #[serde(with = "DigestHex")]
    pub input_digest: [u8; 32],
    pub output_batch: Vec<Ciphertext>,
    pub proof: MixProof,
}

/// Canonical digest of a ciphertext batch.
pub fn batch_digest(batch: &[Ciphertext]) -> [u8; 32] {
    let mut canonical = Canonical::new().u64(batch.len() as u64);
    for ciphertext in batch {
        canonical = canonical.uint(&ciphertext.v).uint(&ciphertext.e);
    }
    canonical.digest()
}

fn schnorr_challenge(
    params: &ElectionParameters,
    input_digest: &[u8; 32],
    output_digest: &[u8; 32],
    g_r: &BigUint,
    u_r: &BigUint,
    commitment: &BigUint,
) -> BigUint {
    Canonical::new()
        .uint(&params.p)
        .uint(&params.q)
        .uint(&params.g)
        .uint(&params.u)
        .bytes(input_digest)
        .bytes(output_digest)
        .uint(g_r)
        .uint(u_r)
        .uint(commitment)
        .challenge(&params.q)
}

/// Permute and re-encrypt a batch of ciphertexts.
///
/// The permutation and the per-ballot randomizers are used once here and
/// discarded; only the aggregate randomizer leaves this function, inside
/// the proof.
pub fn mix(
    params: &ElectionParameters,
    inputs: &[Ciphertext],
) -> Result<(Vec<Ciphertext>, MixProof), Error> {
    if inputs.is_empty() {
        return Err(Error::ParameterError("mix of an empty batch".to_string()));
    }

    let mut rng = OsRng;
    debug!("mixing {} ballots", inputs.len());

    let mut order: Vec<usize> = (0..inputs.len()).collect();
    order.shuffle(&mut rng);

    let mut outputs = Vec::with_capacity(inputs.len());
    let mut aggregate_r = BigUint::zero();
    for index in order {
        let (reencrypted, r) = params.rerandomize(&inputs[index], None);
        aggregate_r = (aggregate_r + r) % &params.q;
        outputs.push(reencrypted);
    }

    // Schnorr proof of knowledge of the aggregate randomizer
    let input_digest = batch_digest(inputs);
    let output_digest = batch_digest(&outputs);
    let g_r = params.g.modpow(&aggregate_r, &params.p);
    let u_r = params.u.modpow(&aggregate_r, &params.p);

    let w = arith::random_scalar(&params.q);
    let commitment = params.g.modpow(&w, &params.p);
    let challenge = schnorr_challenge(
        params,
        &input_digest,
        &output_digest,
        &g_r,
        &u_r,
        &commitment,
    );
    let response = (w + &challenge * &aggregate_r) % &params.q;

    let proof = MixProof {
        aggregate_r,
        commitment,
        response,
    };

    Ok((outputs, proof))
}

/// Verify that `outputs` is an aggregate re-encryption of `inputs`.
pub fn verify_mix(
    params: &ElectionParameters,
    inputs: &[Ciphertext],
    outputs: &[Ciphertext],
    proof: &MixProof,
) -> Result<(), Error> {
    if inputs.is_empty() || inputs.len() != outputs.len() {
        return Err(Error::MixProofInvalid);
    }

    let input_aggregate = params.homomorphic_sum(inputs)?;
    let output_aggregate = params.homomorphic_sum(outputs)?;

    // The output aggregate must be the input aggregate shifted by the
    // revealed randomizer: (v * g^R, e * u^R)
    let g_r = params.g.modpow(&proof.aggregate_r, &params.p);
    let u_r = params.u.modpow(&proof.aggregate_r, &params.p);

    if output_aggregate.v != (&input_aggregate.v * &g_r) % &params.p {
        return Err(Error::MixProofInvalid);
    }
    if output_aggregate.e != (&input_aggregate.e * &u_r) % &params.p {
        return Err(Error::MixProofInvalid);
    }

    // Schnorr equation: g^s = t * (g^R)^c
    let challenge = schnorr_challenge(
        params,
        &batch_digest(inputs),
        &batch_digest(outputs),
        &g_r,
        &u_r,
        &proof.commitment,
    );
    let lhs = params.g.modpow(&proof.response, &params.p);
    let rhs = (&proof.commitment * g_r.modpow(&challenge, &params.p)) % &params.p;
    if lhs != rhs {
        return Err(Error::MixProofInvalid);
    }

    Ok(())
}

impl MixRecord {
    pub fn new(inputs: &[Ciphertext], outputs: Vec<Ciphertext>, proof: MixProof) -> Self {
        MixRecord {
            input_digest: batch_digest(inputs),
            output_batch: outputs,
            proof,
        }
    }
}
