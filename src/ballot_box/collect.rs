use tracing::{debug, info, warn};

use crate::{
    crypto_tools::elgamal::{AggregatePublicKey, KeyShare},
    ledger::Ledger,
    sdk::{
        api::{BallotError, BallotResult},
        channel::{FollowUp, FrameStream, Request, Role, SecureTransport, ACK},
    },
    vote::SignedVote,
};

use super::{exchange::TallyExchange, Node};

pub struct Collecting<T: SecureTransport> {
    node: Node<T>,
    share: KeyShare,
    pk: AggregatePublicKey,
    ledger: Ledger,
}

impl<T: SecureTransport> Collecting<T> {
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

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Serve vote requests until the clock says stop. A failed request is
    /// answered negatively and never ends the loop.
    pub fn collect_votes(mut self) -> BallotResult<TallyExchange<T>> {
        let index = self.node.index;
        loop {
            let (mut stream, peer) = match self.node.transport.accept_any() {
                Ok(accepted) => accepted,
                Err(BallotError::Timeout) => continue,
                Err(err) => return Err(err),
            };

            // peers that already stopped collecting may reach us first
            if peer.role() == Role::BallotBox {
                debug!("ballot box {}: early connection from {}", index, peer);
                self.node.backlog.push((stream, peer));
                continue;
            }

            match (stream.read_request(), peer.role()) {
                (Ok(Request::Vote), Role::VotingSession) => {
                    if let Err(err) = self.serve_vote(&mut stream) {
                        warn!("ballot box {}: vote request failed: {}", index, err);
                    }
                }
                (Ok(Request::Stop), Role::Clock) => {
                    if let Err(err) = stream.write_int(ACK) {
                        warn!("ballot box {}: could not ack stop: {}", index, err);
                    }
                    info!(
                        "ballot box {}: voting closed with {} ballots",
                        index,
                        self.ledger.len()
                    );
                    break;
                }
                (Ok(request), _) => {
                    warn!("ballot box {}: {} may not send {:?}", index, peer, request)
                }
                (Err(err), _) => warn!("ballot box {}: ignoring {}: {}", index, peer, err),
            }
        }
        Ok(TallyExchange::new(self.node, self.share, self.pk, self.ledger))
    }

    fn serve_vote(&mut self, stream: &mut T::Stream) -> BallotResult<()> {
        stream.write_int(ACK)?;

        let next: SignedVote = stream.read_object()?;
        let well_formed = match next.as_cast() {
            Some(vote) => vote.verify() && self.pk.check_ciphertext(vote.ciphertext()).is_ok(),
            None => true,
        };
        stream.write_bool(well_formed)?;
        if !well_formed {
            return Err(BallotError::SignatureInvalid);
        }

        let follow_up = stream.read_utf()?;
        let result = match FollowUp::from_tag(&follow_up) {
            Some(FollowUp::OneMessage) => self.ledger.apply(None, &next),
            Some(FollowUp::TwoMessages) => {
                let previous: SignedVote = stream.read_object()?;
                stream.write_bool(true)?;
                match previous.as_cast() {
                    Some(previous) => self.ledger.apply(Some(previous), &next),
                    None => Err(BallotError::Protocol(
                        "previous vote is a cancellation".into(),
                    )),
                }
            }
            None => Err(BallotError::Protocol(format!(
                "unknown follow-up tag {:?}",
                follow_up
            ))),
        };
        stream.write_bool(result.is_ok())?;
        result
    }
}
