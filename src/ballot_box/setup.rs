use tracing::{error, info};

use crate::{
    crypto_tools::elgamal::{AggregatePublicKey, KeyShare},
    ledger::Ledger,
    sdk::{
        api::{BallotError, BallotResult},
        channel::{accept_next_from, FrameStream, Role, SecureTransport, ACK, NACK},
    },
    vote::SignedShare,
};

use super::{collect::Collecting, Node};

pub struct AwaitingShare<T: SecureTransport> {
    node: Node<T>,
}

pub struct AwaitingKey<T: SecureTransport> {
    node: Node<T>,
    share: KeyShare,
}

impl<T: SecureTransport> AwaitingShare<T> {
    pub(super) fn new(node: Node<T>) -> Self {
        Self { node }
    }

    /// Verify the signed share, report `h_i` and wait for the authority's verdict.
    pub fn receive_share(self) -> BallotResult<AwaitingKey<T>> {
        let index = self.node.index;
        let (mut stream, _) = accept_next_from(&self.node.transport, Role::KeyAuthority)?;
        let signed: SignedShare = stream.read_object()?;

        if !signed.verify() {
            error!("ballot box {}: share signature invalid", index);
            stream.write_bool(false)?;
            return Err(BallotError::SignatureInvalid);
        }
        if let Err(err) = signed.share().validate() {
            error!("ballot box {}: malformed share", index);
            stream.write_bool(false)?;
            return Err(err);
        }
        stream.write_bool(true)?;

        let share = signed.into_share();
        stream.write_object(share.public())?;
        if !stream.read_bool()? {
            error!("ballot box {}: authority rejected partial public key", index);
            return Err(BallotError::SetupAborted(format!(
                "partial public key of ballot box {} rejected",
                index
            )));
        }
        info!("ballot box {}: share accepted", index);

        Ok(AwaitingKey {
            node: self.node,
            share,
        })
    }
}

impl<T: SecureTransport> AwaitingKey<T> {
    pub fn share(&self) -> &KeyShare {
        &self.share
    }

    pub fn receive_public_key(self) -> BallotResult<Collecting<T>> {
        let index = self.node.index;
        let (mut stream, _) = accept_next_from(&self.node.transport, Role::KeyAuthority)?;
        let pk: AggregatePublicKey = stream.read_object()?;
        if pk.group() != self.share.group() {
            error!("ballot box {}: public key over a foreign group", index);
            stream.write_int(NACK)?;
            return Err(BallotError::SetupAborted(format!(
                "ballot box {} received a public key over a foreign group",
                index
            )));
        }
        stream.write_int(ACK)?;
        info!("ballot box {}: public key received", index);

        Ok(Collecting::new(self.node, self.share, pk, Ledger::new()))
    }
}
