//! Threshold ElGamal with messages in the exponent.
//!
//! The decryption key `s` is split additively into `x_1 + ... + x_N = s mod q`.
//! Each ballot box holds one `x_i`; decryption strips every `C^{x_i}` from the
//! message component in turn, so `s` is never reconstructed anywhere.
use std::fmt;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::{
    arith::{
        inverse_mod_prime, member_of_mod, member_of_subgroup, random_below,
        random_nonzero_below, safe_prime, signed_pow,
    },
    hash,
};
use crate::{
    constants::{MAX_SECURITY_BITS, MIN_SECURITY_BITS},
    sdk::api::{serialize, BallotError, BallotResult},
};

/// Safe prime `p = 2q + 1` and a generator `g` of the order-`q` subgroup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupParameters {
    p: BigUint,
    q: BigUint,
    g: BigUint,
}

/// The undivided decryption key. Consumed by [ShareDealer].
pub struct MasterSecret(BigUint);

impl GroupParameters {
    pub fn generate(
        security_bits: usize,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> BallotResult<(Self, MasterSecret)> {
        if !(MIN_SECURITY_BITS..=MAX_SECURITY_BITS).contains(&security_bits) {
            error!(
                "security_bits {} not in [{},{}]",
                security_bits, MIN_SECURITY_BITS, MAX_SECURITY_BITS
            );
            return Err(BallotError::Config(format!(
                "security_bits {} out of range",
                security_bits
            )));
        }

        let (p, q) = safe_prime(security_bits, rng)?;

        // squares of Z*_p are exactly the order-q subgroup
        let g = loop {
            let r = random_nonzero_below(rng, &p);
            let g = r.modpow(&BigUint::from(2u32), &p);
            if !g.is_one() {
                break g;
            }
        };

        let master = random_nonzero_below(rng, &q);
        Ok((Self { p, q, g }, MasterSecret(master)))
    }

    /// Checks the structural relations only; primality of `p` and `q` is assumed.
    pub fn from_parts(p: BigUint, q: BigUint, g: BigUint) -> BallotResult<Self> {
        if p != &q * BigUint::from(2u32) + BigUint::one() {
            warn!("group modulus is not 2q+1");
            return Err(BallotError::Domain("modulus is not 2q+1"));
        }
        if g.is_one() || !member_of_subgroup(&g, &p, &q) {
            warn!("generator outside the order-q subgroup");
            return Err(BallotError::Domain("generator outside the subgroup"));
        }
        Ok(Self { p, q, g })
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }
    pub fn q(&self) -> &BigUint {
        &self.q
    }
    pub fn g(&self) -> &BigUint {
        &self.g
    }

    pub fn is_element(&self, x: &BigUint) -> bool {
        member_of_subgroup(x, &self.p, &self.q)
    }

    pub(crate) fn check_element(&self, x: &BigUint, what: &'static str) -> BallotResult<()> {
        if self.is_element(x) {
            Ok(())
        } else {
            warn!("{} outside the group", what);
            Err(BallotError::Domain(what))
        }
    }

    /// `g^x mod p`
    pub fn pow_g(&self, x: &BigUint) -> BigUint {
        self.g.modpow(x, &self.p)
    }
}

/// `h_i = g^{x_i}`, one ballot box's contribution to the public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialPublicKey(BigUint);

impl PartialPublicKey {
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

/// A ballot box's secret exponent `x_i` with its public piece.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyShare {
    group: GroupParameters,
    secret: BigUint,
    public: PartialPublicKey,
}

// keep the exponent out of logs
impl fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyShare")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl KeyShare {
    pub fn from_secret(group: GroupParameters, secret: BigUint) -> BallotResult<Self> {
        if !member_of_mod(&secret, group.q()) {
            warn!("share exponent outside Z_q");
            return Err(BallotError::Domain("share exponent outside Z_q"));
        }
        let public = PartialPublicKey(group.pow_g(&secret));
        Ok(Self {
            group,
            secret,
            public,
        })
    }

    /// Validate a share received over the wire.
    pub fn validate(&self) -> BallotResult<()> {
        let group = GroupParameters::from_parts(
            self.group.p.clone(),
            self.group.q.clone(),
            self.group.g.clone(),
        )?;
        let rebuilt = Self::from_secret(group, self.secret.clone())?;
        if rebuilt.public != self.public {
            warn!("share public piece does not match its exponent");
            return Err(BallotError::Domain("share public piece mismatch"));
        }
        Ok(())
    }

    pub fn group(&self) -> &GroupParameters {
        &self.group
    }

    pub fn public(&self) -> &PartialPublicKey {
        &self.public
    }

    /// Strip this share's factor `C^{x_i}` from the message component.
    /// Applying every share once, in any order, leaves `(C, g^m)`.
    pub fn partial_decrypt(&self, ciphertext: &Ciphertext) -> BallotResult<Ciphertext> {
        ciphertext.check(&self.group)?;
        let p = self.group.p();
        let factor = ciphertext.c.modpow(&self.secret, p);
        Ok(Ciphertext {
            c: ciphertext.c.clone(),
            c2: &ciphertext.c2 * inverse_mod_prime(&factor, p) % p,
        })
    }

    /// Apply the last partial decryption, then search `[-bound, bound]` for the exponent.
    pub fn decrypt_in_exponent(&self, ciphertext: &Ciphertext, bound: u64) -> BallotResult<i64> {
        let reduced = self.partial_decrypt(ciphertext)?;
        resolve_exponent(&self.group, &reduced.c2, bound)
    }
}

/// Find `m` with `g^m = value`, `|m| <= bound`.
pub fn resolve_exponent(
    group: &GroupParameters,
    value: &BigUint,
    bound: u64,
) -> BallotResult<i64> {
    let p = group.p();
    let g_inv = inverse_mod_prime(group.g(), p);
    let mut positive = BigUint::one();
    let mut negative = BigUint::one();
    for m in 0..=bound {
        if &positive == value {
            return Ok(m as i64);
        }
        if &negative == value {
            return Ok(-(m as i64));
        }
        positive = positive * group.g() % p;
        negative = negative * &g_inv % p;
    }
    warn!("plaintext outside search bound {}", bound);
    Err(BallotError::Domain("plaintext outside search bound"))
}

/// Splits a [MasterSecret] into `share_count` additive shares, one per call.
pub struct ShareDealer {
    group: GroupParameters,
    master: BigUint,
    share_count: usize,
    issued: usize,
    running_sum: BigUint,
}

impl ShareDealer {
    pub fn new(group: GroupParameters, master: MasterSecret, share_count: usize) -> Self {
        Self {
            group,
            master: master.0,
            share_count,
            issued: 0,
            running_sum: BigUint::zero(),
        }
    }

    pub fn group(&self) -> &GroupParameters {
        &self.group
    }

    /// The last call returns the remainder so that all exponents sum to the master secret.
    pub fn derive_share(
        &mut self,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> BallotResult<KeyShare> {
        if self.issued >= self.share_count {
            error!("all {} shares already derived", self.share_count);
            return Err(BallotError::Protocol("all shares already derived".into()));
        }
        let q = self.group.q();
        let secret = if self.issued + 1 == self.share_count {
            (&self.master + q - &self.running_sum) % q
        } else {
            random_below(rng, q)
        };
        self.running_sum = (&self.running_sum + &secret) % q;
        self.issued += 1;
        KeyShare::from_secret(self.group.clone(), secret)
    }

    /// `g^s` for the undivided secret
    pub fn public_key(&self) -> AggregatePublicKey {
        AggregatePublicKey {
            h: self.group.pow_g(&self.master),
            group: self.group.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatePublicKey {
    group: GroupParameters,
    h: BigUint,
}

/// `h = h_1 * ... * h_N mod p`
pub fn aggregate_partial_public_keys(
    group: &GroupParameters,
    parts: &[PartialPublicKey],
) -> BallotResult<AggregatePublicKey> {
    if parts.is_empty() {
        error!("no partial public keys to aggregate");
        return Err(BallotError::Aggregation("no partial public keys"));
    }
    let mut h = BigUint::one();
    for (i, part) in parts.iter().enumerate() {
        if !group.is_element(&part.0) {
            error!("partial public key {} outside the group", i);
            return Err(BallotError::Aggregation("partial public key outside the group"));
        }
        h = h * &part.0 % group.p();
    }
    Ok(AggregatePublicKey {
        group: group.clone(),
        h,
    })
}

impl AggregatePublicKey {
    pub fn group(&self) -> &GroupParameters {
        &self.group
    }

    pub fn h(&self) -> &BigUint {
        &self.h
    }

    /// `(g^r, h^r * g^m)` for `m` in `{-1, 0, 1}`
    pub fn encrypt_in_exponent(
        &self,
        m: i64,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> BallotResult<Ciphertext> {
        if !(-1..=1).contains(&m) {
            warn!("plaintext {} not in {{-1, 0, 1}}", m);
            return Err(BallotError::Domain("plaintext not in {-1, 0, 1}"));
        }
        let p = self.group.p();
        let r = random_nonzero_below(rng, self.group.q());
        Ok(Ciphertext {
            c: self.group.pow_g(&r),
            c2: self.h.modpow(&r, p) * signed_pow(self.group.g(), m, p) % p,
        })
    }

    pub fn check_ciphertext(&self, ciphertext: &Ciphertext) -> BallotResult<()> {
        ciphertext.check(&self.group)
    }

    /// Encrypts `m1 + m2` when `a` encrypts `m1` and `b` encrypts `m2`.
    pub fn homomorphic_combine(&self, a: &Ciphertext, b: &Ciphertext) -> BallotResult<Ciphertext> {
        a.check(&self.group)?;
        b.check(&self.group)?;
        let p = self.group.p();
        Ok(Ciphertext {
            c: &a.c * &b.c % p,
            c2: &a.c2 * &b.c2 % p,
        })
    }
}

/// ElGamal pair `(C, C2)`; equality is component-wise and load-bearing
/// because ciphertexts key every ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ciphertext {
    c: BigUint,
    c2: BigUint,
}

impl Ciphertext {
    pub fn new(c: BigUint, c2: BigUint) -> Self {
        Self { c, c2 }
    }
    pub fn c(&self) -> &BigUint {
        &self.c
    }
    pub fn c2(&self) -> &BigUint {
        &self.c2
    }

    fn check(&self, group: &GroupParameters) -> BallotResult<()> {
        group.check_element(&self.c, "ciphertext component C")?;
        group.check_element(&self.c2, "ciphertext component C2")
    }

    /// Bytes covered by the voter's signature
    pub fn canonical_bytes(&self) -> BallotResult<Vec<u8>> {
        serialize(self)
    }

    pub fn fingerprint(&self) -> String {
        match self.canonical_bytes() {
            Ok(bytes) => hash::fingerprint(&bytes),
            Err(_) => "<unencodable>".to_owned(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tracing_test::traced_test;

    pub(crate) const TEST_BITS: usize = 128;

    pub(crate) fn test_setup(
        share_count: usize,
        seed: u64,
    ) -> (AggregatePublicKey, Vec<KeyShare>, ChaCha20Rng) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let (group, master) = GroupParameters::generate(TEST_BITS, &mut rng).unwrap();
        let mut dealer = ShareDealer::new(group.clone(), master, share_count);
        let shares: Vec<KeyShare> = (0..share_count)
            .map(|_| dealer.derive_share(&mut rng).unwrap())
            .collect();
        let parts: Vec<PartialPublicKey> = shares.iter().map(|s| s.public().clone()).collect();
        let pk = aggregate_partial_public_keys(&group, &parts).unwrap();
        (pk, shares, rng)
    }

    fn chain_decrypt(shares: &[&KeyShare], ciphertext: &Ciphertext, bound: u64) -> i64 {
        let (last, rest) = shares.split_last().unwrap();
        let reduced = rest.iter().fold(ciphertext.clone(), |ct, share| {
            share.partial_decrypt(&ct).unwrap()
        });
        last.decrypt_in_exponent(&reduced, bound).unwrap()
    }

    #[test]
    #[traced_test]
    fn aggregate_matches_undivided_key() {
        for share_count in [1, 2, 3, 5] {
            let mut rng = ChaCha20Rng::seed_from_u64(share_count as u64);
            let (group, master) = GroupParameters::generate(TEST_BITS, &mut rng).unwrap();
            let mut dealer = ShareDealer::new(group.clone(), master, share_count);
            let parts: Vec<PartialPublicKey> = (0..share_count)
                .map(|_| dealer.derive_share(&mut rng).unwrap().public().clone())
                .collect();
            let aggregated = aggregate_partial_public_keys(&group, &parts).unwrap();
            assert_eq!(aggregated, dealer.public_key());

            // one call too many
            assert!(dealer.derive_share(&mut rng).is_err());
        }
    }

    #[test]
    #[traced_test]
    fn combined_tally_decrypts_in_any_share_order() {
        let (pk, shares, mut rng) = test_setup(3, 7);
        let orders: [[usize; 3]; 3] = [[0, 1, 2], [2, 1, 0], [1, 2, 0]];
        for m1 in -1..=1 {
            for m2 in -1..=1 {
                let a = pk.encrypt_in_exponent(m1, &mut rng).unwrap();
                let b = pk.encrypt_in_exponent(m2, &mut rng).unwrap();
                let combined = pk.homomorphic_combine(&a, &b).unwrap();
                for order in orders.iter() {
                    let ordered: Vec<&KeyShare> = order.iter().map(|&i| &shares[i]).collect();
                    assert_eq!(chain_decrypt(&ordered, &combined, 2), m1 + m2);
                }
            }
        }
    }

    #[test]
    fn combine_is_commutative_and_associative() {
        let (pk, _, mut rng) = test_setup(2, 11);
        let cts: Vec<Ciphertext> = [1, -1, 1]
            .iter()
            .map(|&m| pk.encrypt_in_exponent(m, &mut rng).unwrap())
            .collect();
        let ab = pk.homomorphic_combine(&cts[0], &cts[1]).unwrap();
        let ba = pk.homomorphic_combine(&cts[1], &cts[0]).unwrap();
        assert_eq!(ab, ba);
        let left = pk.homomorphic_combine(&ab, &cts[2]).unwrap();
        let right = pk
            .homomorphic_combine(&cts[0], &pk.homomorphic_combine(&cts[1], &cts[2]).unwrap())
            .unwrap();
        assert_eq!(left, right);
    }

    #[test]
    #[traced_test]
    fn domain_errors() {
        let (pk, shares, mut rng) = test_setup(2, 3);
        assert!(matches!(
            pk.encrypt_in_exponent(2, &mut rng),
            Err(BallotError::Domain(_))
        ));

        let good = pk.encrypt_in_exponent(1, &mut rng).unwrap();
        let zero = Ciphertext::new(BigUint::zero(), good.c2().clone());
        let too_big = Ciphertext::new(good.c().clone(), pk.group().p().clone());
        assert!(matches!(pk.homomorphic_combine(&good, &zero), Err(BallotError::Domain(_))));
        assert!(matches!(
            shares[0].partial_decrypt(&too_big),
            Err(BallotError::Domain(_))
        ));

        assert!(matches!(
            aggregate_partial_public_keys(pk.group(), &[]),
            Err(BallotError::Aggregation(_))
        ));
        let outside = PartialPublicKey(pk.group().p().clone());
        assert!(matches!(
            aggregate_partial_public_keys(pk.group(), &[shares[0].public().clone(), outside]),
            Err(BallotError::Aggregation(_))
        ));
    }

    #[test]
    fn search_bound_is_enforced() {
        let (pk, shares, mut rng) = test_setup(2, 5);
        let a = pk.encrypt_in_exponent(1, &mut rng).unwrap();
        let b = pk.encrypt_in_exponent(1, &mut rng).unwrap();
        let two = pk.homomorphic_combine(&a, &b).unwrap();
        let reduced = shares[0].partial_decrypt(&two).unwrap();
        assert!(shares[1].decrypt_in_exponent(&reduced, 1).is_err());
        assert_eq!(shares[1].decrypt_in_exponent(&reduced, 2).unwrap(), 2);
    }

    #[test]
    fn received_share_validation() {
        let (_, shares, _) = test_setup(2, 13);
        assert!(shares[0].validate().is_ok());

        let mut forged = shares[0].clone();
        forged.public = shares[1].public().clone();
        assert!(matches!(forged.validate(), Err(BallotError::Domain(_))));
        assert!(!format!("{:?}", shares[0]).contains("secret"));
    }
}
