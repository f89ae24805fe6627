//! Modular arithmetic helpers over `BigUint`.
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use tracing::error;

use crate::sdk::api::{BallotError, BallotResult};

/// Check if `x` is a member of the integers modulo `Z_n`
pub fn member_of_mod(x: &BigUint, n: &BigUint) -> bool {
    x < n
}

/// Check if `x` is a member of the multiplicative group `Z*_p` for prime `p`
pub fn member_of_mul_group(x: &BigUint, p: &BigUint) -> bool {
    !x.is_zero() && x < p
}

/// Check if `x` lies in the order-`q` subgroup of `Z*_p`
pub fn member_of_subgroup(x: &BigUint, p: &BigUint, q: &BigUint) -> bool {
    member_of_mul_group(x, p) && x.modpow(q, p).is_one()
}

/// Inverse in `Z*_p`, `p` prime and `x` a member of `Z*_p`
pub fn inverse_mod_prime(x: &BigUint, p: &BigUint) -> BigUint {
    x.modpow(&(p - BigUint::from(2u32)), p)
}

/// Uniform in `[1, n)`
pub fn random_nonzero_below(rng: &mut (impl CryptoRng + RngCore), n: &BigUint) -> BigUint {
    rng.gen_biguint_range(&BigUint::one(), n)
}

/// Uniform in `[0, n)`
pub fn random_below(rng: &mut (impl CryptoRng + RngCore), n: &BigUint) -> BigUint {
    rng.gen_biguint_below(n)
}

/// `g^m mod p` for a signed exponent
pub fn signed_pow(g: &BigUint, m: i64, p: &BigUint) -> BigUint {
    let power = g.modpow(&BigUint::from(m.unsigned_abs()), p);
    if m < 0 {
        inverse_mod_prime(&power, p)
    } else {
        power
    }
}

/// Safe prime `p = 2q + 1` of exactly `bits` bits; returns `(p, q)`.
pub fn safe_prime(
    bits: usize,
    rng: &mut (impl CryptoRng + RngCore),
) -> BallotResult<(BigUint, BigUint)> {
    let p = glass_pumpkin::safe_prime::from_rng(bits, rng).map_err(|err| {
        error!("safe prime of {} bits: {:?}", bits, err);
        BallotError::Config(format!("no safe prime of {} bits", bits))
    })?;
    let q = (&p - BigUint::one()) >> 1;
    Ok((p, q))
}
