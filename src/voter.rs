//! Voter client for the voting session.
use rand_chacha::ChaCha20Rng;
use tracing::{info, warn};

use crate::{
    credentials::Credential,
    crypto_tools::{elgamal::AggregatePublicKey, schnorr::SchnorrSigner},
    sdk::{
        api::{BallotError, BallotResult},
        channel::{Address, FrameStream, Identity, Request, SecureTransport, ACK},
    },
    vote::{CastVote, SignedVote, VoteChoice},
};

pub struct Voter<T: SecureTransport> {
    transport: T,
    session: Address,
    rng: ChaCha20Rng,
}

impl<T: SecureTransport> Voter<T> {
    pub fn new(transport: T, session: Address, rng: ChaCha20Rng) -> Self {
        Self {
            transport,
            session,
            rng,
        }
    }

    pub fn identity(&self) -> &Identity {
        self.transport.identity()
    }

    pub fn register(&mut self, password: &str) -> BallotResult<Credential> {
        self.register_claiming(password, None)
    }

    /// Register, answering with `claimed` instead of the identifier just issued
    /// when one is given.
    pub fn register_claiming(
        &mut self,
        password: &str,
        claimed: Option<&str>,
    ) -> BallotResult<Credential> {
        if password.is_empty() {
            warn!("{}: empty password", self.identity());
            return Err(BallotError::AuthenticationFailed);
        }
        let mut stream = self.transport.connect(&self.session)?;
        stream.write_request(Request::Register)?;
        if !stream.read_bool()? {
            warn!("{}: registration refused", self.identity());
            return Err(BallotError::NotEligible);
        }
        let issued = stream.read_utf()?;
        stream.write_int(ACK)?;

        let credential = Credential::new(claimed.unwrap_or(&issued), password);
        stream.write_object(&credential)?;
        if !stream.read_bool()? {
            warn!("{}: identifier check failed", self.identity());
            return Err(BallotError::CredentialMismatch);
        }
        if !stream.read_bool()? {
            warn!("{}: credential not stored", self.identity());
            return Err(BallotError::Protocol("credential not stored".into()));
        }
        info!("{}: registered as {}", self.identity(), issued);
        Ok(credential)
    }

    /// `None` cancels the live vote.
    pub fn vote(
        &mut self,
        credential: &Credential,
        choice: Option<VoteChoice>,
    ) -> BallotResult<()> {
        self.submit_vote(credential, |pk, rng| match choice {
            Some(choice) => {
                let signer = SchnorrSigner::new(pk.group().clone(), rng);
                let ciphertext = pk.encrypt_in_exponent(choice.exponent(), rng)?;
                Ok(SignedVote::Cast(CastVote::sign(ciphertext, &signer, rng)?))
            }
            None => Ok(SignedVote::Cancel),
        })
    }

    /// Authenticate, fetch the public key and submit whatever `build` makes of it.
    pub fn submit_vote<F>(&mut self, credential: &Credential, build: F) -> BallotResult<()>
    where
        F: FnOnce(&AggregatePublicKey, &mut ChaCha20Rng) -> BallotResult<SignedVote>,
    {
        let mut stream = self.transport.connect(&self.session)?;
        stream.write_request(Request::Vote)?;
        stream.write_object(credential)?;
        if !stream.read_bool()? {
            warn!("{}: credential check failed", self.identity());
            return Err(BallotError::AuthenticationFailed);
        }
        let pk: AggregatePublicKey = stream.read_object()?;
        stream.write_int(ACK)?;

        let vote = build(&pk, &mut self.rng)?;
        stream.write_object(&vote)?;
        if stream.read_bool()? {
            info!("{}: vote accepted", self.identity());
            return Ok(());
        }
        warn!("{}: vote rejected", self.identity());
        Err(match vote {
            SignedVote::Cancel => BallotError::NoPriorVote,
            SignedVote::Cast(_) => BallotError::SignatureInvalid,
        })
    }
}
