use tracing::{debug, error, info};

use crate::{
    collections::TypedUsize,
    crypto_tools::elgamal::{Ciphertext, KeyShare},
    ledger::Ledger,
    sdk::{
        api::{BallotError, BallotResult},
        channel::{FrameStream, SecureTransport, ACK, NACK},
    },
};

use super::{publish::Publishing, Node, Tally};

pub struct Decrypting<T: SecureTransport> {
    node: Node<T>,
    share: KeyShare,
    ledger: Ledger,
    final_total: Option<Ciphertext>,
    ballot_count: u64,
}

impl<T: SecureTransport> Decrypting<T> {
    pub(super) fn new(
        node: Node<T>,
        share: KeyShare,
        ledger: Ledger,
        final_total: Option<Ciphertext>,
        ballot_count: u64,
    ) -> Self {
        Self {
            node,
            share,
            ledger,
            final_total,
            ballot_count,
        }
    }

    /// Node 0 starts the chain, each later node strips its factor and forwards,
    /// and the last node resolves the exponent. Only the last node learns the tally.
    pub fn decrypt(mut self) -> BallotResult<Publishing<T>> {
        let index = self.node.index;
        let final_total = match self.final_total.take() {
            Some(final_total) => final_total,
            None => {
                let tally = self.node.is_last().then(|| Tally::NoVotes);
                return Ok(Publishing::new(self.node, self.ledger, tally));
            }
        };

        let incoming = if index.as_usize() == 0 {
            final_total
        } else {
            let predecessor = TypedUsize::from_usize(index.as_usize() - 1);
            let mut stream = self.node.accept_from_ballot_box(predecessor)?;
            let incoming: Ciphertext = stream.read_object()?;
            // partial decryption never touches C
            if incoming.c() != final_total.c() {
                error!(
                    "ballot box {}: chain value from {} does not extend the final ciphertext",
                    index, predecessor
                );
                stream.write_int(NACK)?;
                return Err(BallotError::Protocol(
                    "decryption chain diverged from the final ciphertext".into(),
                ));
            }
            stream.write_int(ACK)?;
            incoming
        };

        if self.node.is_last() {
            let total = self.share.decrypt_in_exponent(&incoming, self.ballot_count)?;
            info!("ballot box {}: tally {}", index, total);
            return Ok(Publishing::new(
                self.node,
                self.ledger,
                Some(Tally::Total(total)),
            ));
        }

        let forwarded = self.share.partial_decrypt(&incoming)?;
        let successor = TypedUsize::from_usize(index.as_usize() + 1);
        let address = self.node.topology.ballot_box(successor)?.clone();
        let mut stream = self.node.transport.connect(&address)?;
        stream.write_object(&forwarded)?;
        stream.expect_ack()?;
        debug!("ballot box {}: partial decryption forwarded to {}", index, successor);

        Ok(Publishing::new(self.node, self.ledger, None))
    }
}
