//! Voter-facing server: registration, authentication, signature checks and
//! routing of each vote to the ballot box that owns the voter's partition.
use std::sync::{Mutex, MutexGuard};

use rand::{CryptoRng, RngCore};
use tracing::{error, info, warn};

use crate::{
    credentials::{Credential, CredentialStore},
    crypto_tools::elgamal::AggregatePublicKey,
    registry::{Eligibility, EligibilityRegistry},
    sdk::{
        api::{BallotError, BallotResult},
        channel::{
            accept_next_from, FollowUp, FrameStream, Identity, Request, Role, SecureTransport,
            ACK,
        },
    },
    topology::Topology,
    vote::{CastVote, SignedVote},
};

/// Everything the session owns once voting has closed.
#[derive(Debug)]
pub struct ClosedSession<R> {
    pub credentials: CredentialStore,
    pub registry: R,
}

struct SessionState<R> {
    credentials: CredentialStore,
    registry: R,
}

enum Control {
    Continue,
    Stop,
}

pub struct VotingSession<T: SecureTransport, R: EligibilityRegistry> {
    transport: T,
    topology: Topology,
    /// Held for the whole flow of one connection.
    admission: Mutex<SessionState<R>>,
}

impl<T: SecureTransport, R: EligibilityRegistry> VotingSession<T, R> {
    pub fn new(transport: T, topology: Topology, registry: R) -> Self {
        Self {
            transport,
            topology,
            admission: Mutex::new(SessionState {
                credentials: CredentialStore::new(),
                registry,
            }),
        }
    }

    /// Wait for the public key, then serve voters until the clock says stop.
    pub fn run(self, rng: &mut (impl CryptoRng + RngCore)) -> BallotResult<ClosedSession<R>> {
        let (mut stream, _) = accept_next_from(&self.transport, Role::KeyAuthority)?;
        let pk: AggregatePublicKey = stream.read_object()?;
        stream.write_int(ACK)?;
        info!("voting session: public key received, accepting voters");

        loop {
            let (mut stream, peer) = match self.transport.accept_any() {
                Ok(accepted) => accepted,
                Err(BallotError::Timeout) => continue,
                Err(err) => return Err(err),
            };
            if let Control::Stop = self.serve(&mut stream, &peer, &pk, rng)? {
                break;
            }
        }

        let state = self.admission.into_inner().map_err(|_| {
            error!("voting session: admission lock poisoned");
            BallotError::Protocol("admission lock poisoned".into())
        })?;
        info!(
            "voting session: closed with {} registered voters",
            state.credentials.len()
        );
        Ok(ClosedSession {
            credentials: state.credentials,
            registry: state.registry,
        })
    }

    fn admit(&self) -> BallotResult<MutexGuard<'_, SessionState<R>>> {
        self.admission.lock().map_err(|_| {
            error!("voting session: admission lock poisoned");
            BallotError::Protocol("admission lock poisoned".into())
        })
    }

    /// Per-request failures are logged here and never stop the session.
    fn serve(
        &self,
        stream: &mut T::Stream,
        peer: &Identity,
        pk: &AggregatePublicKey,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> BallotResult<Control> {
        let mut state = self.admit()?;
        let result = match (stream.read_request(), peer.role()) {
            (Ok(Request::Register), Role::Voter) => self.register(&mut state, stream, peer, rng),
            (Ok(Request::Vote), Role::Voter) => self.vote(&mut state, stream, pk),
            (Ok(Request::Stop), Role::Clock) => {
                if let Err(err) = stream.write_int(ACK) {
                    warn!("voting session: could not ack stop: {}", err);
                }
                info!("voting session: stop received");
                return Ok(Control::Stop);
            }
            (Ok(request), _) => {
                warn!("voting session: {} may not send {:?}", peer, request);
                Ok(())
            }
            (Err(err), _) => Err(err),
        };
        if let Err(err) = result {
            warn!("voting session: request from {} failed: {}", peer, err);
        }
        Ok(Control::Continue)
    }

    fn register(
        &self,
        state: &mut SessionState<R>,
        stream: &mut T::Stream,
        peer: &Identity,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> BallotResult<()> {
        match state.registry.lookup(peer) {
            Eligibility::Eligible => stream.write_bool(true)?,
            Eligibility::NotFound => {
                stream.write_bool(false)?;
                return Err(BallotError::NotEligible);
            }
            Eligibility::AlreadyIssued => {
                stream.write_bool(false)?;
                return Err(BallotError::AlreadyIssued);
            }
        }

        let identifier = state.credentials.fresh_identifier(rng);
        stream.write_utf(&identifier)?;
        stream.expect_ack()?;

        let credential: Credential = stream.read_object()?;
        if credential.identifier() != identifier {
            stream.write_bool(false)?;
            return Err(BallotError::CredentialMismatch);
        }
        stream.write_bool(true)?;

        let stored = state.credentials.register(&credential, rng);
        stream.write_bool(stored.is_ok())?;
        stored?;
        state.registry.mark_issued(peer)
    }

    fn vote(
        &self,
        state: &mut SessionState<R>,
        stream: &mut T::Stream,
        pk: &AggregatePublicKey,
    ) -> BallotResult<()> {
        let credential: Credential = stream.read_object()?;
        let previous = state
            .credentials
            .authenticate(&credential)
            .map(|record| record.live_vote().cloned());
        stream.write_bool(previous.is_ok())?;
        let previous = previous?;

        stream.write_object(pk)?;
        stream.expect_ack()?;

        let next: SignedVote = stream.read_object()?;
        let checked = match (&next, &previous) {
            (SignedVote::Cast(vote), _) if !vote.verify() => Err(BallotError::SignatureInvalid),
            (SignedVote::Cancel, None) => Err(BallotError::NoPriorVote),
            _ => Ok(()),
        };
        if let Err(err) = checked {
            stream.write_bool(false)?;
            return Err(err);
        }

        let result = self
            .forward(credential.identifier(), previous.as_ref(), &next)
            .and_then(|()| {
                state
                    .credentials
                    .set_live_vote(credential.identifier(), next.as_cast().cloned())
            });
        stream.write_bool(result.is_ok())?;
        result
    }

    /// Send `(previous, next)` to the ballot box owning `identifier`.
    fn forward(
        &self,
        identifier: &str,
        previous: Option<&CastVote>,
        next: &SignedVote,
    ) -> BallotResult<()> {
        let index = self.topology.partition(identifier);
        let mut stream = self.transport.connect(self.topology.ballot_box(index)?)?;
        stream.write_request(Request::Vote)?;
        stream.expect_ack()?;

        stream.write_object(next)?;
        if !stream.read_bool()? {
            warn!("voting session: ballot box {} rejected the signature", index);
            return Err(BallotError::SignatureInvalid);
        }
        match previous {
            Some(previous) => {
                stream.write_utf(FollowUp::TwoMessages.tag())?;
                stream.write_object(&SignedVote::Cast(previous.clone()))?;
                if !stream.read_bool()? {
                    warn!(
                        "voting session: ballot box {} refused the previous vote",
                        index
                    );
                    return Err(BallotError::Protocol(format!(
                        "ballot box {} refused the previous vote",
                        index
                    )));
                }
            }
            None => stream.write_utf(FollowUp::OneMessage.tag())?,
        }
        if !stream.read_bool()? {
            warn!("voting session: ballot box {} rejected the vote", index);
            return Err(BallotError::Protocol(format!(
                "ballot box {} rejected the vote",
                index
            )));
        }
        info!("voting session: vote routed to ballot box {}", index);
        Ok(())
    }
}
