//! A ballot box node: one share of the decryption key and one partition of the votes.
//!
//! Each phase is a distinct type consumed by the transition into the next, so a
//! node cannot exchange totals before it stopped collecting, nor publish before
//! the decryption chain passed through it.
use tracing::warn;

use crate::{
    collections::{BallotBoxId, TypedUsize},
    sdk::{
        api::BallotResult,
        channel::{accept_next_from, Identity, Role, SecureTransport},
    },
    topology::Topology,
};

mod api;
pub use api::*;

mod collect;
mod decrypt;
mod exchange;
mod publish;
mod setup;
pub use collect::Collecting;
pub use decrypt::Decrypting;
pub use exchange::TallyExchange;
pub use publish::Publishing;
pub use setup::{AwaitingKey, AwaitingShare};


/// Context shared by every phase.
struct Node<T: SecureTransport> {
    transport: T,
    topology: Topology,
    index: TypedUsize<BallotBoxId>,
    /// Connections from other ballot boxes accepted before this node was ready for them.
    backlog: Vec<(T::Stream, Identity)>,
}

impl<T: SecureTransport> Node<T> {
    fn new(transport: T, topology: Topology, index: TypedUsize<BallotBoxId>) -> Self {
        Self {
            transport,
            topology,
            index,
            backlog: Vec::new(),
        }
    }

    fn ballot_box_count(&self) -> usize {
        self.topology.ballot_box_count()
    }

    fn is_last(&self) -> bool {
        self.index == self.topology.last_ballot_box()
    }

    /// Oldest backlog entry first, then the transport.
    fn next_from_ballot_box(&mut self) -> BallotResult<(T::Stream, Identity)> {
        if !self.backlog.is_empty() {
            return Ok(self.backlog.remove(0));
        }
        accept_next_from(&self.transport, Role::BallotBox)
    }

    /// Wait for a connection from one specific ballot box. Connections from any
    /// other ballot box are kept in the backlog.
    fn accept_from_ballot_box(
        &mut self,
        peer: TypedUsize<BallotBoxId>,
    ) -> BallotResult<T::Stream> {
        let expected = Topology::ballot_box_identity(peer);
        if let Some(position) = self.backlog.iter().position(|(_, id)| *id == expected) {
            return Ok(self.backlog.remove(position).0);
        }
        loop {
            let (stream, identity) = accept_next_from(&self.transport, Role::BallotBox)?;
            if identity == expected {
                return Ok(stream);
            }
            warn!(
                "ballot box {} waiting for {}, deferring {}",
                self.index, expected, identity
            );
            self.backlog.push((stream, identity));
        }
    }
}
