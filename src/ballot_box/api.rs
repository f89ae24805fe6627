use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    collections::{BallotBoxId, TypedUsize},
    ledger::Ledger,
    sdk::{
        api::{BallotError, BallotResult},
        channel::SecureTransport,
    },
    topology::Topology,
};

use super::{setup::AwaitingShare, Node};

/// Decrypted result, known only to the last ballot box in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tally {
    NoVotes,
    Total(i64),
}

/// What a ballot box holds once it has published its ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Done {
    pub index: TypedUsize<BallotBoxId>,
    pub ledger: Ledger,
    /// `Some` only at the last ballot box.
    pub tally: Option<Tally>,
}

/// Initialize a ballot box listening on `transport`.
pub fn new_ballot_box<T: SecureTransport>(
    transport: T,
    topology: Topology,
    index: TypedUsize<BallotBoxId>,
) -> BallotResult<AwaitingShare<T>> {
    if index.as_usize() >= topology.ballot_box_count() {
        error!(
            "ballot box index {} out of bounds {}",
            index,
            topology.ballot_box_count()
        );
        return Err(BallotError::Config(format!(
            "ballot box index {} out of bounds",
            index
        )));
    }
    Ok(AwaitingShare::new(Node::new(transport, topology, index)))
}

/// Drive a ballot box through every phase.
pub fn run_ballot_box<T: SecureTransport>(
    transport: T,
    topology: Topology,
    index: TypedUsize<BallotBoxId>,
) -> BallotResult<Done> {
    new_ballot_box(transport, topology, index)?
        .receive_share()?
        .receive_public_key()?
        .collect_votes()?
        .exchange_totals()?
        .decrypt()?
        .publish()
}
