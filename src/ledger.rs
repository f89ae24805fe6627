use std::collections::{hash_map, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    crypto_tools::{
        elgamal::{AggregatePublicKey, Ciphertext},
        schnorr::Signature,
    },
    sdk::api::{BallotError, BallotResult},
    vote::{CastVote, SignedVote},
};

/// A ballot box's accepted votes, keyed by ciphertext.
///
/// Every entry passed signature verification when it was inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger(HashMap<Ciphertext, Signature>);

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, ciphertext: &Ciphertext) -> bool {
        self.0.contains_key(ciphertext)
    }

    pub fn iter(&self) -> hash_map::Iter<'_, Ciphertext, Signature> {
        self.0.iter()
    }

    pub fn insert(&mut self, vote: CastVote) -> BallotResult<()> {
        if !vote.verify() {
            return Err(BallotError::SignatureInvalid);
        }
        if self.contains(vote.ciphertext()) {
            warn!("ciphertext {} already present", vote.ciphertext().fingerprint());
            return Err(BallotError::DuplicateCiphertext);
        }
        let (ciphertext, signature) = vote.into_parts();
        self.0.insert(ciphertext, signature);
        Ok(())
    }

    pub fn remove(&mut self, ciphertext: &Ciphertext) -> BallotResult<()> {
        match self.0.remove(ciphertext) {
            Some(_) => Ok(()),
            None => {
                warn!("ciphertext {} not in ledger", ciphertext.fingerprint());
                Err(BallotError::VoteNotFound)
            }
        }
    }

    /// Swap `old` for `new`. Either both happen or the ledger is untouched.
    pub fn replace(&mut self, old: &Ciphertext, new: CastVote) -> BallotResult<()> {
        if !new.verify() {
            return Err(BallotError::SignatureInvalid);
        }
        if !self.contains(old) {
            warn!("ciphertext {} to replace not in ledger", old.fingerprint());
            return Err(BallotError::VoteNotFound);
        }
        if self.contains(new.ciphertext()) {
            warn!("ciphertext {} already present", new.ciphertext().fingerprint());
            return Err(BallotError::DuplicateCiphertext);
        }
        self.0.remove(old);
        let (ciphertext, signature) = new.into_parts();
        self.0.insert(ciphertext, signature);
        Ok(())
    }

    /// Apply `next` on top of the voter's live vote `previous`.
    pub fn apply(&mut self, previous: Option<&CastVote>, next: &SignedVote) -> BallotResult<()> {
        match (previous, next) {
            (None, SignedVote::Cancel) => {
                warn!("cancellation without a live vote");
                Err(BallotError::NoPriorVote)
            }
            (None, SignedVote::Cast(vote)) => {
                self.insert(vote.clone())?;
                info!("vote {} added", vote.ciphertext().fingerprint());
                Ok(())
            }
            (Some(old), SignedVote::Cancel) => {
                self.remove(old.ciphertext())?;
                info!("vote {} cancelled", old.ciphertext().fingerprint());
                Ok(())
            }
            (Some(old), SignedVote::Cast(vote)) => {
                self.replace(old.ciphertext(), vote.clone())?;
                info!(
                    "vote {} replaced by {}",
                    old.ciphertext().fingerprint(),
                    vote.ciphertext().fingerprint()
                );
                Ok(())
            }
        }
    }

    /// Homomorphic product of every key, `None` for an empty ledger.
    pub fn local_total(&self, pk: &AggregatePublicKey) -> BallotResult<Option<Ciphertext>> {
        let mut keys = self.0.keys();
        let first = match keys.next() {
            Some(first) => first.clone(),
            None => return Ok(None),
        };
        keys.try_fold(first, |total, ciphertext| {
            pk.homomorphic_combine(&total, ciphertext)
        })
        .map(Some)
    }

    /// Move every entry of `other` into `self`; returns keys already present,
    /// which keep their first signature.
    pub fn merge(&mut self, other: Ledger) -> Vec<Ciphertext> {
        let mut collisions = Vec::new();
        for (ciphertext, signature) in other.0 {
            match self.0.entry(ciphertext) {
                hash_map::Entry::Occupied(entry) => collisions.push(entry.key().clone()),
                hash_map::Entry::Vacant(entry) => {
                    entry.insert(signature);
                }
            }
        }
        collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_tools::{elgamal::tests::test_setup, schnorr::SchnorrSigner};
    use rand_chacha::ChaCha20Rng;
    use tracing_test::traced_test;

    fn cast(pk: &AggregatePublicKey, m: i64, rng: &mut ChaCha20Rng) -> CastVote {
        let signer = SchnorrSigner::new(pk.group().clone(), rng);
        let ciphertext = pk.encrypt_in_exponent(m, rng).unwrap();
        CastVote::sign(ciphertext, &signer, rng).unwrap()
    }

    #[test]
    #[traced_test]
    fn replacement_leaves_only_the_new_vote() {
        let (pk, _, mut rng) = test_setup(2, 41);
        let mut ledger = Ledger::new();
        let old = cast(&pk, 0, &mut rng);
        let new = cast(&pk, -1, &mut rng);

        ledger.apply(None, &SignedVote::Cast(old.clone())).unwrap();
        ledger
            .apply(Some(&old), &SignedVote::Cast(new.clone()))
            .unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(new.ciphertext()));
        assert!(!ledger.contains(old.ciphertext()));

        // the same replacement again finds nothing to replace
        assert_eq!(
            ledger.apply(Some(&old), &SignedVote::Cast(new.clone())),
            Err(BallotError::VoteNotFound)
        );

        ledger.apply(Some(&new), &SignedVote::Cancel).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(
            ledger.apply(Some(&new), &SignedVote::Cancel),
            Err(BallotError::VoteNotFound)
        );
    }

    #[test]
    #[traced_test]
    fn rejections_leave_ledger_untouched() {
        let (pk, _, mut rng) = test_setup(2, 42);
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.apply(None, &SignedVote::Cancel),
            Err(BallotError::NoPriorVote)
        );

        let first = cast(&pk, 1, &mut rng);
        ledger.insert(first.clone()).unwrap();
        assert_eq!(
            ledger.insert(first.clone()),
            Err(BallotError::DuplicateCiphertext)
        );

        // replacing with a ciphertext that is already present keeps the old entry
        let second = cast(&pk, 1, &mut rng);
        ledger.insert(second.clone()).unwrap();
        assert_eq!(
            ledger.replace(first.ciphertext(), second.clone()),
            Err(BallotError::DuplicateCiphertext)
        );
        assert!(ledger.contains(first.ciphertext()));

        let third = cast(&pk, 1, &mut rng);
        let forged = CastVote::new(third.ciphertext().clone(), first.signature().clone());
        assert_eq!(ledger.insert(forged), Err(BallotError::SignatureInvalid));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn local_total_and_merge() {
        let (pk, shares, mut rng) = test_setup(2, 43);
        let mut ledger = Ledger::new();
        assert_eq!(ledger.local_total(&pk).unwrap(), None);

        for m in [1, 1, -1, 1] {
            ledger.insert(cast(&pk, m, &mut rng)).unwrap();
        }
        let total = ledger.local_total(&pk).unwrap().unwrap();
        let reduced = shares[1].partial_decrypt(&total).unwrap();
        assert_eq!(shares[0].decrypt_in_exponent(&reduced, 4).unwrap(), 2);

        let mut other = Ledger::new();
        other.insert(cast(&pk, 0, &mut rng)).unwrap();
        let mut merged = ledger.clone();
        assert!(merged.merge(other.clone()).is_empty());
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.merge(other).len(), 1);
    }
}
