//! Voter credentials held by the voting session.
use std::{collections::HashMap, fmt};

use rand::{seq::SliceRandom, CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::{
    constants::{
        IDENTIFIER_CHARS_PER_CLASS, IDENTIFIER_LENGTH, IDENTIFIER_SYMBOLS, SALT_LENGTH,
    },
    crypto_tools::hash::{self, Output},
    sdk::api::{BallotError, BallotResult},
    vote::CastVote,
};

/// Identifier and password presented by a voter.
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct Credential {
    identifier: String,
    password: String,
}

impl Credential {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct VoterRecord {
    identifier: String,
    password_hash: Output,
    salt: [u8; SALT_LENGTH],
    live_vote: Option<CastVote>,
}

impl VoterRecord {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `None` means the voter has no live vote.
    pub fn live_vote(&self) -> Option<&CastVote> {
        self.live_vote.as_ref()
    }

    fn matches(&self, password: &str) -> bool {
        hash::password_hash(&self.salt, password.as_bytes()) == self.password_hash
    }
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    records: HashMap<String, VoterRecord>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.records.contains_key(identifier)
    }

    /// Draw identifiers until one is not in the store.
    pub fn fresh_identifier(&self, rng: &mut (impl CryptoRng + RngCore)) -> String {
        loop {
            let identifier = generate_identifier(rng);
            if !self.contains(&identifier) {
                return identifier;
            }
        }
    }

    /// Store a salted hash of the password under the credential's identifier.
    pub fn register(
        &mut self,
        credential: &Credential,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> BallotResult<()> {
        if credential.password.is_empty() {
            warn!("empty password for {}", credential.identifier);
            return Err(BallotError::AuthenticationFailed);
        }
        if self.contains(&credential.identifier) {
            warn!("identifier {} already registered", credential.identifier);
            return Err(BallotError::AlreadyIssued);
        }
        let mut salt = [0u8; SALT_LENGTH];
        rng.fill_bytes(&mut salt);
        let record = VoterRecord {
            identifier: credential.identifier.clone(),
            password_hash: hash::password_hash(&salt, credential.password.as_bytes()),
            salt,
            live_vote: None,
        };
        self.records.insert(credential.identifier.clone(), record);
        info!("registered {}", credential.identifier);
        Ok(())
    }

    pub fn authenticate(&self, credential: &Credential) -> BallotResult<&VoterRecord> {
        match self.records.get(&credential.identifier) {
            Some(record) if record.matches(&credential.password) => Ok(record),
            _ => {
                warn!("authentication failed for {}", credential.identifier);
                Err(BallotError::AuthenticationFailed)
            }
        }
    }

    pub fn set_live_vote(
        &mut self,
        identifier: &str,
        live_vote: Option<CastVote>,
    ) -> BallotResult<()> {
        let record = self.records.get_mut(identifier).ok_or_else(|| {
            warn!("no record for {}", identifier);
            BallotError::AuthenticationFailed
        })?;
        record.live_vote = live_vote;
        Ok(())
    }
}

/// Ten characters with at least two each of lowercase, uppercase, digits and symbols.
pub fn generate_identifier(rng: &mut (impl CryptoRng + RngCore)) -> String {
    const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const DIGITS: &[u8] = b"0123456789";
    let classes: [&[u8]; 4] = [LOWER, UPPER, DIGITS, IDENTIFIER_SYMBOLS];

    let mut chars: Vec<u8> = Vec::with_capacity(IDENTIFIER_LENGTH);
    for class in classes.iter() {
        for _ in 0..IDENTIFIER_CHARS_PER_CLASS {
            chars.push(class[rng.gen_range(0..class.len())]);
        }
    }
    while chars.len() < IDENTIFIER_LENGTH {
        let class = classes[rng.gen_range(0..classes.len())];
        chars.push(class[rng.gen_range(0..class.len())]);
    }
    chars.shuffle(rng);
    chars.into_iter().map(char::from).collect()
}
