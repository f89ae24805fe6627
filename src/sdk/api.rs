//! API for threshold-ballot users
use thiserror::Error;

use crate::sdk::channel::Role;

pub type BallotResult<T> = Result<T, BallotError>;
pub type BytesVec = Vec<u8>;

/// Every way a protocol step can fail.
///
/// Per-request variants (signature, ledger and credential failures) are reported to
/// the immediate caller as a negative ack and never stop the serving loop.
/// [BallotError::Aggregation] and [BallotError::SetupAborted] are fatal to the election.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BallotError {
    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("operand outside the group: {0}")]
    Domain(&'static str),

    #[error("ciphertext already present in the ledger")]
    DuplicateCiphertext,

    #[error("cancellation requested but there is no live vote")]
    NoPriorVote,

    #[error("vote to replace is not in the ledger")]
    VoteNotFound,

    #[error("credential identifier does not match the issued identifier")]
    CredentialMismatch,

    #[error("credential already issued")]
    AlreadyIssued,

    #[error("voter not eligible")]
    NotEligible,

    #[error("invalid credential")]
    AuthenticationFailed,

    #[error("public key aggregation failed: {0}")]
    Aggregation(&'static str),

    #[error("setup aborted: {0}")]
    SetupAborted(String),

    #[error("connection rejected: expected {expected:?}, found {found:?}")]
    ChannelRejected { expected: Role, found: Role },

    #[error("channel closed")]
    ChannelClosed,

    #[error("deadline expired")]
    Timeout,

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("serialization failure: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Expose the (de)serialization functions
/// that use the appropriate bincode config options.
pub use super::wire_bytes::{decode, encode, serialize};
