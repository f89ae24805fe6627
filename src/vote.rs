//! Signed payloads exchanged during setup and voting.
use std::convert::TryFrom;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    crypto_tools::{
        elgamal::{Ciphertext, KeyShare},
        schnorr::{self, SchnorrSigner, Signature},
    },
    sdk::api::{serialize, BallotError, BallotResult},
};

/// Plaintext of a single ballot, encrypted in the exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChoice {
    Against,
    Abstain,
    InFavour,
}

impl VoteChoice {
    pub fn exponent(self) -> i64 {
        match self {
            VoteChoice::Against => -1,
            VoteChoice::Abstain => 0,
            VoteChoice::InFavour => 1,
        }
    }
}

impl TryFrom<i64> for VoteChoice {
    type Error = BallotError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(VoteChoice::Against),
            0 => Ok(VoteChoice::Abstain),
            1 => Ok(VoteChoice::InFavour),
            _ => Err(BallotError::Domain("vote choice not in {-1, 0, 1}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedShare {
    share: KeyShare,
    signature: Signature,
}

impl SignedShare {
    pub fn sign(
        share: KeyShare,
        signer: &SchnorrSigner,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> BallotResult<Self> {
        let signature = signer.sign(&serialize(&share)?, rng);
        Ok(Self { share, signature })
    }

    pub fn verify(&self) -> bool {
        match serialize(&self.share) {
            Ok(bytes) => schnorr::verify(&self.signature, &bytes),
            Err(_) => false,
        }
    }

    pub fn share(&self) -> &KeyShare {
        &self.share
    }

    pub fn into_share(self) -> KeyShare {
        self.share
    }

    #[cfg(test)]
    pub(crate) fn with_share(self, share: KeyShare) -> Self {
        Self { share, ..self }
    }
}

/// An encrypted ballot and the signature over its canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    ciphertext: Ciphertext,
    signature: Signature,
}

impl CastVote {
    /// No verification happens here; see [CastVote::verify].
    pub fn new(ciphertext: Ciphertext, signature: Signature) -> Self {
        Self {
            ciphertext,
            signature,
        }
    }

    pub fn sign(
        ciphertext: Ciphertext,
        signer: &SchnorrSigner,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> BallotResult<Self> {
        let signature = signer.sign(&ciphertext.canonical_bytes()?, rng);
        Ok(Self {
            ciphertext,
            signature,
        })
    }

    pub fn verify(&self) -> bool {
        let valid = match self.ciphertext.canonical_bytes() {
            Ok(bytes) => schnorr::verify(&self.signature, &bytes),
            Err(_) => false,
        };
        if !valid {
            warn!(
                "vote signature invalid for ciphertext {}",
                self.ciphertext.fingerprint()
            );
        }
        valid
    }

    pub fn ciphertext(&self) -> &Ciphertext {
        &self.ciphertext
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn into_parts(self) -> (Ciphertext, Signature) {
        (self.ciphertext, self.signature)
    }
}

/// `Cancel` withdraws the voter's live vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignedVote {
    Cast(CastVote),
    Cancel,
}

impl SignedVote {
    /// Cancellations carry no signature and always pass.
    pub fn verify(&self) -> bool {
        match self {
            SignedVote::Cast(vote) => vote.verify(),
            SignedVote::Cancel => true,
        }
    }

    pub fn as_cast(&self) -> Option<&CastVote> {
        match self {
            SignedVote::Cast(vote) => Some(vote),
            SignedVote::Cancel => None,
        }
    }
}
