use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
    arith::{member_of_mod, random_nonzero_below},
    constants::SCHNORR_CHALLENGE_TAG,
    elgamal::GroupParameters,
    hash,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationKey {
    group: GroupParameters,
    y: BigUint,
}

impl VerificationKey {
    pub fn group(&self) -> &GroupParameters {
        &self.group
    }
}

/// Per-voter signing key, fresh for every ballot.
pub struct SchnorrSigner {
    key: VerificationKey,
    x: BigUint,
}

/// `(a, e, z)` together with the key it verifies under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    a: BigUint,
    e: BigUint,
    z: BigUint,
    verification_key: VerificationKey,
}

impl Signature {
    pub fn verification_key(&self) -> &VerificationKey {
        &self.verification_key
    }
}

impl SchnorrSigner {
    pub fn new(group: GroupParameters, rng: &mut (impl CryptoRng + RngCore)) -> Self {
        let x = random_nonzero_below(rng, group.q());
        let y = group.pow_g(&x);
        Self {
            key: VerificationKey { group, y },
            x,
        }
    }

    pub fn verification_key(&self) -> &VerificationKey {
        &self.key
    }

    pub fn sign(&self, message: &[u8], rng: &mut (impl CryptoRng + RngCore)) -> Signature {
        let group = &self.key.group;
        let k = random_nonzero_below(rng, group.q());
        let a = group.pow_g(&k);
        let e = challenge(&self.key, &a, message);
        let z = (k + &e * &self.x) % group.q();
        Signature {
            a,
            e,
            z,
            verification_key: self.key.clone(),
        }
    }
}

// e = H(p, g, y, a, message) mod q
fn challenge(key: &VerificationKey, a: &BigUint, message: &[u8]) -> BigUint {
    let output = hash::digest(
        SCHNORR_CHALLENGE_TAG,
        &[
            &key.group.p().to_bytes_be(),
            &key.group.g().to_bytes_be(),
            &key.y.to_bytes_be(),
            &a.to_bytes_be(),
            message,
        ],
    );
    BigUint::from_bytes_be(output.as_ref()) % key.group.q()
}

/// Malformed signatures verify as `false`.
pub fn verify(signature: &Signature, message: &[u8]) -> bool {
    let key = &signature.verification_key;

    // rebuild the group so that a hostile modulus is caught before any modpow
    let group = match GroupParameters::from_parts(
        key.group.p().clone(),
        key.group.q().clone(),
        key.group.g().clone(),
    ) {
        Ok(group) => group,
        Err(_) => return false,
    };
    if !group.is_element(&key.y) || !group.is_element(&signature.a) {
        warn!("signature component outside the group");
        return false;
    }
    if !member_of_mod(&signature.e, group.q()) || !member_of_mod(&signature.z, group.q()) {
        warn!("signature scalar outside Z_q");
        return false;
    }
    if challenge(key, &signature.a, message) != signature.e {
        return false;
    }
    let lhs = group.pow_g(&signature.z);
    let rhs = &signature.a * key.y.modpow(&signature.e, group.p()) % group.p();
    lhs == rhs
}

#[cfg(test)]
pub(crate) mod malicious {
    use super::*;
    use num_traits::One;

    pub fn corrupt_signature(signature: &Signature) -> Signature {
        let signature = signature.clone();
        Signature {
            z: (&signature.z + BigUint::one()) % signature.verification_key.group.q(),
            ..signature
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{malicious::corrupt_signature, *};
    use crate::crypto_tools::elgamal::tests::TEST_BITS;
    use num_traits::{One, Zero};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tracing_test::traced_test;

    fn signer(seed: u64) -> (SchnorrSigner, ChaCha20Rng) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let (group, _) = GroupParameters::generate(TEST_BITS, &mut rng).unwrap();
        (SchnorrSigner::new(group, &mut rng), rng)
    }

    #[test]
    #[traced_test]
    fn basic_correctness() {
        let (signer, mut rng) = signer(21);
        let message = b"encrypted ballot".to_vec();

        // test: valid signature
        let signature = signer.sign(&message, &mut rng);
        assert!(verify(&signature, &message));

        // test: bad signature
        assert!(!verify(&corrupt_signature(&signature), &message));

        // test: every single-byte change to the message
        for i in 0..message.len() {
            let mut altered = message.clone();
            altered[i] ^= 0x01;
            assert!(!verify(&signature, &altered));
        }

        // test: someone else's key
        let (other, _) = self::signer(22);
        let swapped = Signature {
            verification_key: other.verification_key().clone(),
            ..signature.clone()
        };
        assert!(!verify(&swapped, &message));
    }

    #[test]
    #[traced_test]
    fn malformed_components_do_not_panic() {
        let (signer, mut rng) = signer(23);
        let message = b"m";
        let signature = signer.sign(message, &mut rng);
        let q = signature.verification_key.group.q().clone();
        let p = signature.verification_key.group.p().clone();

        let cases = vec![
            Signature {
                a: BigUint::zero(),
                ..signature.clone()
            },
            Signature {
                a: p.clone(),
                ..signature.clone()
            },
            Signature {
                e: &signature.e + &q,
                ..signature.clone()
            },
            Signature {
                z: q.clone(),
                ..signature.clone()
            },
            Signature {
                verification_key: VerificationKey {
                    group: signature.verification_key.group.clone(),
                    y: BigUint::one(),
                },
                ..signature.clone()
            },
        ];
        for case in cases.iter() {
            assert!(!verify(case, message));
        }
    }
}
