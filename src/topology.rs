//! Statically known addresses of every role.
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    collections::{BallotBoxId, TypedUsize, VecMap},
    constants::{MAX_BALLOT_BOX_COUNT, MIN_BALLOT_BOX_COUNT},
    crypto_tools::hash,
    sdk::{
        api::{BallotError, BallotResult},
        channel::{Address, Identity, Role},
    },
};

/// Ballot box order drives both vote partitioning and the decryption chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    ballot_boxes: VecMap<BallotBoxId, Address>,
    voting_session: Address,
    bulletin: Address,
    clock: Address,
}

impl Topology {
    pub fn new(
        ballot_boxes: Vec<Address>,
        voting_session: Address,
        bulletin: Address,
        clock: Address,
    ) -> BallotResult<Self> {
        if !(MIN_BALLOT_BOX_COUNT..=MAX_BALLOT_BOX_COUNT).contains(&ballot_boxes.len()) {
            error!(
                "ballot box count {} not in [{},{}]",
                ballot_boxes.len(),
                MIN_BALLOT_BOX_COUNT,
                MAX_BALLOT_BOX_COUNT
            );
            return Err(BallotError::Config(format!(
                "ballot box count {} out of range",
                ballot_boxes.len()
            )));
        }
        Ok(Self {
            ballot_boxes: VecMap::from_vec(ballot_boxes),
            voting_session,
            bulletin,
            clock,
        })
    }

    /// Addresses for a single-process election with `ballot_box_count` boxes.
    pub fn local(ballot_box_count: usize) -> BallotResult<Self> {
        Self::new(
            (0..ballot_box_count)
                .map(|i| Address::new(format!("sbal-{}", i)))
                .collect(),
            Address::new("splat"),
            Address::new("stab"),
            Address::new("timer"),
        )
    }

    pub fn ballot_box_count(&self) -> usize {
        self.ballot_boxes.len()
    }

    pub fn ballot_boxes(&self) -> &VecMap<BallotBoxId, Address> {
        &self.ballot_boxes
    }

    pub fn ballot_box(&self, index: TypedUsize<BallotBoxId>) -> BallotResult<&Address> {
        self.ballot_boxes.get(index)
    }

    pub fn voting_session(&self) -> &Address {
        &self.voting_session
    }

    pub fn bulletin(&self) -> &Address {
        &self.bulletin
    }

    pub fn clock(&self) -> &Address {
        &self.clock
    }

    /// Identity a ballot box presents on the channel.
    pub fn ballot_box_identity(index: TypedUsize<BallotBoxId>) -> Identity {
        Identity::new(Role::BallotBox, format!("ballot-box-{}", index))
    }

    /// Ballot box responsible for every vote of `identifier`.
    pub fn partition(&self, identifier: &str) -> TypedUsize<BallotBoxId> {
        TypedUsize::from_usize(hash::partition_index(identifier, self.ballot_box_count()))
    }

    pub fn last_ballot_box(&self) -> TypedUsize<BallotBoxId> {
        TypedUsize::from_usize(self.ballot_box_count() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_topology() {
        let topology = Topology::local(3).unwrap();
        assert_eq!(topology.ballot_box_count(), 3);
        assert_eq!(topology.last_ballot_box().as_usize(), 2);
        assert_eq!(
            topology.ballot_box(TypedUsize::from_usize(1)).unwrap().as_str(),
            "sbal-1"
        );
        assert!(Topology::local(1).is_err());
    }

    #[test]
    fn partition_is_stable() {
        let topology = Topology::local(5).unwrap();
        let first = topology.partition("aB3$xY9!qq");
        assert!(first.as_usize() < 5);
        for _ in 0..20 {
            assert_eq!(topology.partition("aB3$xY9!qq"), first);
        }
    }
}
