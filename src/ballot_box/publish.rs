use tracing::info;

use crate::{
    ledger::Ledger,
    sdk::{
        api::BallotResult,
        channel::{FrameStream, SecureTransport},
    },
};

use super::{Done, Node, Tally};

pub struct Publishing<T: SecureTransport> {
    node: Node<T>,
    ledger: Ledger,
    tally: Option<Tally>,
}

impl<T: SecureTransport> Publishing<T> {
    pub(super) fn new(node: Node<T>, ledger: Ledger, tally: Option<Tally>) -> Self {
        Self {
            node,
            ledger,
            tally,
        }
    }

    pub fn tally(&self) -> Option<Tally> {
        self.tally
    }

    /// Hand the ledger to the bulletin and wait for its ack.
    pub fn publish(self) -> BallotResult<Done> {
        let mut stream = self.node.transport.connect(self.node.topology.bulletin())?;
        stream.write_object(&self.ledger)?;
        stream.expect_ack()?;
        info!(
            "ballot box {}: {} ballots published",
            self.node.index,
            self.ledger.len()
        );
        Ok(Done {
            index: self.node.index,
            ledger: self.ledger,
            tally: self.tally,
        })
    }
}
