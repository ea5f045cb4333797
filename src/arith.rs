//! Big-integer modular arithmetic: safe-prime generation, subgroup
//! generator search, modular inverses, uniform scalar sampling and the
//! bounded discrete-log search used for tally recovery.

use crate::Error;

use log::debug;
use num_bigint::{BigInt, BigUint, RandBigInt, ToBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;

/// Miller-Rabin rounds for primality testing.
const MILLER_RABIN_ROUNDS: usize = 25;

/// Bounded retries for the subgroup generator search.
const GENERATOR_SEARCH_LIMIT: usize = 512;

/// Generate a safe prime `p = 2q + 1` where `q` is also prime.
/// `p` has exactly `bits` bits.
pub fn gen_safe_prime(bits: u64) -> Result<(BigUint, BigUint), Error> {
    if bits < 16 {
        return Err(Error::ParameterError(format!(
            "modulus of {} bits is too small",
            bits
        )));
    }

    let mut rng = OsRng;
    let low = BigUint::one() << (bits as usize - 2);
    let high = BigUint::one() << (bits as usize - 1);

    debug!("generating {}-bit safe prime", bits);
    loop {
        // q in [2^(bits-2), 2^(bits-1)) so that p = 2q + 1 has `bits` bits
        let q = rng.gen_biguint_range(&low, &high) | BigUint::one();
        if !is_probable_prime(&q, MILLER_RABIN_ROUNDS) {
            continue;
        }

        let p: BigUint = (&q << 1usize) + BigUint::one();
        if is_probable_prime(&p, MILLER_RABIN_ROUNDS) {
            debug!("safe prime found");
            return Ok((p, q));
        }
    }
}

/// Miller-Rabin primality test with `k` random witnesses.
pub fn is_probable_prime(n: &BigUint, k: usize) -> bool {
    let two = BigUint::from(2u32);
    let three = BigUint::from(3u32);

    if n < &two {
        return false;
    }
    if n == &two || n == &three {
        return true;
    }
    if n.is_even() {
        return false;
    }

    let mut rng = OsRng;
    let n_minus_1 = n - BigUint::one();
    let (s, d) = factor_powers_of_two(&n_minus_1);

    'witness: for _ in 0..k {
        let a = rng.gen_biguint_range(&two, &n_minus_1);
        let mut x = a.modpow(&d, n);

        if x.is_one() || x == n_minus_1 {
            continue;
        }

        for _ in 0..s - 1 {
            x = x.modpow(&two, n);
            if x == n_minus_1 {
                continue 'witness;
            }
        }

        return false;
    }

    true
}

/// Factor out powers of 2: n = 2^s * d with d odd.
fn factor_powers_of_two(n: &BigUint) -> (u64, BigUint) {
    let mut s = 0;
    let mut d = n.clone();

    while d.is_even() {
        d >>= 1usize;
        s += 1;
    }

    (s, d)
}

/// Find a generator of the order-`q` subgroup of Z*_p by squaring random
/// group elements. Squaring lands in the quadratic residues, which for a
/// safe prime is exactly the subgroup of order `q`.
pub fn find_generator(p: &BigUint, q: &BigUint) -> Result<BigUint, Error> {
    let mut rng = OsRng;
    let two = BigUint::from(2u32);
    let upper = p - &two;

    for _ in 0..GENERATOR_SEARCH_LIMIT {
        let h = rng.gen_biguint_range(&two, &upper);
        let g = h.modpow(&two, p);
        if !g.is_one() && g.modpow(q, p).is_one() {
            return Ok(g);
        }
    }

    Err(Error::ParameterError(
        "subgroup generator search exhausted".to_string(),
    ))
}

/// Multiplicative inverse of `a` modulo `m` via the extended Euclidean
/// algorithm.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint, Error> {
    let a = a.to_bigint().expect("BigUint always converts");
    let m_int = m.to_bigint().expect("BigUint always converts");
    let (gcd, x, _) = extended_gcd(&(&a % &m_int), &m_int);

    if !gcd.is_one() {
        return Err(Error::ParameterError(format!(
            "no modular inverse of {} mod {}",
            a, m
        )));
    }

    let inv = ((x % &m_int) + &m_int) % &m_int;
    Ok(inv.to_biguint().expect("reduced value is non-negative"))
}

/// Extended Euclidean algorithm over signed integers.
fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    if a.is_zero() {
        return (b.clone(), BigInt::zero(), BigInt::one());
    }

    let (gcd, x1, y1) = extended_gcd(&(b % a), a);
    let x = y1 - (b / a) * &x1;
    (gcd, x, x1)
}

/// Uniform scalar in `[1, q-1]` from the OS CSPRNG.
pub fn random_scalar(q: &BigUint) -> BigUint {
    let mut rng = OsRng;
    rng.gen_biguint_range(&BigUint::one(), q)
}

/// Exhaustive discrete-log search: the unique `k <= max_n` with
/// `g^k = target (mod p)`. The search space is bounded by the number of
/// voters, so a linear scan is enough.
pub fn discrete_log_bounded(
    target: &BigUint,
    g: &BigUint,
    p: &BigUint,
    max_n: u64,
) -> Result<u64, Error> {
    let mut current = BigUint::one();
    for k in 0..=max_n {
        if &current == target {
            return Ok(k);
        }
        current = (&current * g) % p;
    }

    Err(Error::TallyOutOfRange(max_n))
}
