//! Tally bulletin: merges the ledger of every ballot box into one published view.
use std::collections::HashSet;

use tracing::{info, warn};

use crate::{
    crypto_tools::hash,
    ledger::Ledger,
    sdk::{
        api::{serialize, BallotResult},
        channel::{accept_next_from, FrameStream, Identity, Role, SecureTransport, ACK, NACK},
    },
    topology::Topology,
};

pub struct TallyBulletin<T: SecureTransport> {
    transport: T,
    topology: Topology,
}

impl<T: SecureTransport> TallyBulletin<T> {
    pub fn new(transport: T, topology: Topology) -> Self {
        Self {
            transport,
            topology,
        }
    }

    /// Accept one ledger from each ballot box, then publish the merged view.
    pub fn run(self) -> BallotResult<Ledger> {
        let mut pending: HashSet<Identity> = self
            .topology
            .ballot_boxes()
            .iter()
            .map(|(index, _)| Topology::ballot_box_identity(index))
            .collect();
        let mut merged = Ledger::new();
        while !pending.is_empty() {
            let (mut stream, peer) = accept_next_from(&self.transport, Role::BallotBox)?;
            if !pending.remove(&peer) {
                warn!("bulletin: {} already published or unknown", peer);
                let _ = stream.write_int(NACK);
                continue;
            }
            let ledger: Ledger = stream.read_object()?;
            let received = ledger.len();
            for collision in merged.merge(ledger) {
                warn!(
                    "bulletin: ciphertext {} from {} already published",
                    collision.fingerprint(),
                    peer
                );
            }
            stream.write_int(ACK)?;
            info!("bulletin: {} ballots from {}", received, peer);
        }

        info!("bulletin: {} ballots published", merged.len());
        for (ciphertext, signature) in merged.iter() {
            let key_bytes = serialize(signature.verification_key())?;
            info!(
                "bulletin: {} signed by {}",
                ciphertext.fingerprint(),
                hash::fingerprint(&key_bytes)
            );
        }
        Ok(merged)
    }
}
