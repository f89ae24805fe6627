use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::constants::{FINGERPRINT_TAG, PARTITION_TAG, PASSWORD_HASH_TAG};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output([u8; 32]);

impl AsRef<[u8]> for Output {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Domain-separated SHA-256 over length-prefixed parts
pub fn digest(tag: u8, parts: &[&[u8]]) -> Output {
    let hasher = parts.iter().fold(
        Sha256::new().chain_update(tag.to_be_bytes()),
        |hasher, part| {
            hasher
                .chain_update((part.len() as u64).to_be_bytes())
                .chain_update(part)
        },
    );
    Output(hasher.finalize().into())
}

pub fn password_hash(salt: &[u8], password: &[u8]) -> Output {
    digest(PASSWORD_HASH_TAG, &[salt, password])
}

/// Stable for the lifetime of an election: depends only on `identifier` and `count`.
pub fn partition_index(identifier: &str, count: usize) -> usize {
    let output = digest(PARTITION_TAG, &[identifier.as_bytes()]);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&output.0[..8]);
    (u64::from_be_bytes(prefix) % count as u64) as usize
}

/// Short hex label for log lines and the published bulletin
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(&digest(FINGERPRINT_TAG, &[bytes]).0[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_are_unambiguous() {
        assert_ne!(digest(0, &[b"ab", b"c"]), digest(0, &[b"a", b"bc"]));
        assert_ne!(digest(0, &[b"abc"]), digest(1, &[b"abc"]));
    }

    #[test]
    fn partition_is_stable_and_in_range() {
        for id in ["aB3$xY9!qq", "Zz11@@aaBB", ""] {
            let first = partition_index(id, 3);
            assert!(first < 3);
            for _ in 0..10 {
                assert_eq!(partition_index(id, 3), first);
            }
        }
    }

    #[test]
    fn fingerprint_is_short_hex() {
        let label = fingerprint(b"ciphertext");
        assert_eq!(label.len(), 16);
        assert!(label.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
