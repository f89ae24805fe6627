use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    crypto_tools::elgamal::{AggregatePublicKey, Ciphertext, KeyShare},
    ledger::Ledger,
    sdk::{
        api::{BallotError, BallotResult},
        channel::{FrameStream, SecureTransport, ACK, NACK},
    },
    topology::Topology,
};

use super::{decrypt::Decrypting, Node};

/// A node's homomorphic product and how many ballots went into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTally {
    pub total: Option<Ciphertext>,
    pub ballot_count: u64,
}

pub struct TallyExchange<T: SecureTransport> {
    node: Node<T>,
    share: KeyShare,
    pk: AggregatePublicKey,
    ledger: Ledger,
}

impl<T: SecureTransport> TallyExchange<T> {
    pub(super) fn new(
        node: Node<T>,
        share: KeyShare,
        pk: AggregatePublicKey,
        ledger: Ledger,
    ) -> Self {
        Self {
            node,
            share,
            pk,
            ledger,
        }
    }

    /// Round-robin over the node order: on its own turn a node collects every
    /// other node's total, otherwise it sends its own total to whoever's turn it is.
    pub fn exchange_totals(mut self) -> BallotResult<Decrypting<T>> {
        let index = self.node.index;
        let local = LocalTally {
            total: self.ledger.local_total(&self.pk)?,
            ballot_count: self.ledger.len() as u64,
        };

        let mut tallies = vec![local.clone()];
        let turns: Vec<_> = self
            .node
            .topology
            .ballot_boxes()
            .iter()
            .map(|(turn, _)| turn)
            .collect();
        for turn in turns {
            if turn == index {
                tallies.extend(self.receive_totals()?);
            } else {
                let address = self.node.topology.ballot_box(turn)?.clone();
                let mut stream = self.node.transport.connect(&address)?;
                stream.write_object(&local)?;
                stream.expect_ack()?;
                debug!("ballot box {}: local total delivered to {}", index, turn);
            }
        }

        let (final_total, ballot_count) = combine_tallies(&self.pk, tallies)?;

        match &final_total {
            Some(total) => info!(
                "ballot box {}: final ciphertext {} over {} ballots",
                index,
                total.fingerprint(),
                ballot_count
            ),
            None => info!("ballot box {}: no votes cast", index),
        }

        Ok(Decrypting::new(
            self.node,
            self.share,
            self.ledger,
            final_total,
            ballot_count,
        ))
    }

    fn receive_totals(&mut self) -> BallotResult<Vec<LocalTally>> {
        let index = self.node.index;
        let peers: HashSet<_> = self
            .node
            .topology
            .ballot_boxes()
            .iter()
            .map(|(peer, _)| peer)
            .filter(|peer| *peer != index)
            .map(Topology::ballot_box_identity)
            .collect();

        let mut received = HashSet::new();
        let mut tallies = Vec::with_capacity(peers.len());
        let mut deferred = Vec::new();
        while received.len() < peers.len() {
            let (mut stream, peer) = self.node.next_from_ballot_box()?;
            if !peers.contains(&peer) {
                warn!("ballot box {}: unknown ballot box {}", index, peer);
                continue;
            }
            // a second connection from the same peer is the decryption chain
            if received.contains(&peer) {
                deferred.push((stream, peer));
                continue;
            }

            let tally: LocalTally = stream.read_object()?;
            if let Some(total) = &tally.total {
                if let Err(err) = self.pk.check_ciphertext(total) {
                    stream.write_int(NACK)?;
                    return Err(err);
                }
            }
            stream.write_int(ACK)?;
            debug!("ballot box {}: local total received from {}", index, peer);
            received.insert(peer);
            tallies.push(tally);
        }
        self.node.backlog.extend(deferred);
        Ok(tallies)
    }
}

/// Homomorphic product of every total and the number of ballots behind it.
fn combine_tallies(
    pk: &AggregatePublicKey,
    tallies: Vec<LocalTally>,
) -> BallotResult<(Option<Ciphertext>, u64)> {
    let mut ballot_count = 0u64;
    let mut final_total: Option<Ciphertext> = None;
    for tally in tallies {
        ballot_count = ballot_count.checked_add(tally.ballot_count).ok_or_else(|| {
            error!("ballot counts overflow");
            BallotError::Protocol("ballot counts overflow".into())
        })?;
        final_total = match (final_total, tally.total) {
            (None, total) => total,
            (Some(acc), None) => Some(acc),
            (Some(acc), Some(total)) => Some(pk.homomorphic_combine(&acc, &total)?),
        };
    }
    Ok((final_total, ballot_count))
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::crypto_tools::elgamal::tests::test_setup;

    #[test]
    #[traced_test]
    fn totals_combine_with_their_counts() {
        let (pk, shares, mut rng) = test_setup(2, 91);
        let a = pk.encrypt_in_exponent(1, &mut rng).unwrap();
        let b = pk.encrypt_in_exponent(1, &mut rng).unwrap();
        let tallies = vec![
            LocalTally {
                total: Some(a),
                ballot_count: 1,
            },
            LocalTally {
                total: None,
                ballot_count: 0,
            },
            LocalTally {
                total: Some(b),
                ballot_count: 1,
            },
        ];
        let (total, count) = combine_tallies(&pk, tallies).unwrap();
        assert_eq!(count, 2);
        let reduced = shares[0].partial_decrypt(&total.unwrap()).unwrap();
        assert_eq!(shares[1].decrypt_in_exponent(&reduced, count).unwrap(), 2);

        let empty = vec![LocalTally {
            total: None,
            ballot_count: 0,
        }];
        assert_eq!(combine_tallies(&pk, empty).unwrap(), (None, 0));
    }

    #[test]
    #[traced_test]
    fn oversized_ballot_counts_are_refused() {
        let (pk, _, _) = test_setup(2, 92);
        let tallies = vec![
            LocalTally {
                total: None,
                ballot_count: u64::MAX,
            },
            LocalTally {
                total: None,
                ballot_count: 1,
            },
        ];
        assert!(matches!(
            combine_tallies(&pk, tallies),
            Err(BallotError::Protocol(_))
        ));
    }
}
