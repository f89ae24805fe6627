//! Key generation authority: deals one share per ballot box, aggregates the
//! public key, broadcasts it and starts the election clock.
use rand::{CryptoRng, RngCore};
use tracing::{error, info};

use crate::{
    crypto_tools::{
        elgamal::{
            aggregate_partial_public_keys, AggregatePublicKey, GroupParameters, PartialPublicKey,
            ShareDealer,
        },
        schnorr::SchnorrSigner,
    },
    sdk::{
        api::{BallotError, BallotResult},
        channel::{Address, FrameStream, SecureTransport, ACK},
    },
    topology::Topology,
    vote::SignedShare,
};

pub struct KeyAuthority<T: SecureTransport> {
    transport: T,
    topology: Topology,
    security_bits: usize,
}

impl<T: SecureTransport> KeyAuthority<T> {
    pub fn new(transport: T, topology: Topology, security_bits: usize) -> Self {
        Self {
            transport,
            topology,
            security_bits,
        }
    }

    /// Single linear setup with no retries. Any failure returns before the clock
    /// is started; errors other than aggregation failures surface as
    /// [BallotError::SetupAborted].
    pub fn run(self, rng: &mut (impl CryptoRng + RngCore)) -> BallotResult<AggregatePublicKey> {
        self.setup(rng).map_err(|err| match err {
            BallotError::SetupAborted(_) | BallotError::Aggregation(_) => err,
            other => {
                error!("setup aborted: {}", other);
                BallotError::SetupAborted(other.to_string())
            }
        })
    }

    fn setup(&self, rng: &mut (impl CryptoRng + RngCore)) -> BallotResult<AggregatePublicKey> {
        let (group, master) = GroupParameters::generate(self.security_bits, rng)?;
        info!("group of {} bits generated", group.p().bits());
        let signer = SchnorrSigner::new(group.clone(), rng);
        let mut dealer = ShareDealer::new(
            group.clone(),
            master,
            self.topology.ballot_box_count(),
        );

        let mut parts = Vec::with_capacity(self.topology.ballot_box_count());
        for (index, address) in self.topology.ballot_boxes() {
            let share = dealer.derive_share(rng)?;
            let expected = share.public().clone();
            let signed = SignedShare::sign(share, &signer, rng)?;

            let mut stream = self.transport.connect(address)?;
            stream.write_object(&signed)?;
            if !stream.read_bool()? {
                error!("ballot box {} rejected its share", index);
                return Err(BallotError::SetupAborted(format!(
                    "ballot box {} rejected its share",
                    index
                )));
            }
            let reported: PartialPublicKey = stream.read_object()?;
            if reported != expected {
                error!("ballot box {} reported a mismatched partial public key", index);
                stream.write_bool(false)?;
                return Err(BallotError::SetupAborted(format!(
                    "ballot box {} reported a mismatched partial public key",
                    index
                )));
            }
            stream.write_bool(true)?;
            info!("ballot box {} holds its share", index);
            parts.push(reported);
        }

        let pk = aggregate_partial_public_keys(&group, &parts)?;

        let recipients = self
            .topology
            .ballot_boxes()
            .iter()
            .map(|(_, address)| address)
            .chain(std::iter::once(self.topology.voting_session()));
        for address in recipients {
            self.send_public_key(address, &pk)?;
        }
        info!("public key broadcast");

        let mut stream = self.transport.connect(self.topology.clock())?;
        stream.write_int(ACK)?;
        stream.expect_ack()?;
        info!("election clock started");

        Ok(pk)
    }

    fn send_public_key(&self, address: &Address, pk: &AggregatePublicKey) -> BallotResult<()> {
        let mut stream = self.transport.connect(address)?;
        stream.write_object(pk)?;
        match stream.read_int()? {
            ACK => Ok(()),
            other => {
                error!("{} answered the public key with {}", address, other);
                Err(BallotError::SetupAborted(format!(
                    "{} refused the public key",
                    address
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use num_bigint::BigUint;
    use num_traits::One;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        collections::TypedUsize,
        config::ChannelConfig,
        crypto_tools::elgamal::{tests::TEST_BITS, KeyShare},
        sdk::{
            channel::{Identity, Role},
            memory::{MemoryEndpoint, MemoryNetwork, MemoryStream},
        },
    };

    /// Ballot box 0 answers its share with `answer`; nothing else is running
    /// apart from an idle clock.
    fn setup_against<F>(
        answer: F,
    ) -> (BallotResult<AggregatePublicKey>, MemoryEndpoint, MemoryNetwork)
    where
        F: FnOnce(&mut MemoryStream, SignedShare) + Send + 'static,
    {
        let network = MemoryNetwork::new(ChannelConfig::default());
        let topology = Topology::local(2).unwrap();
        let index = TypedUsize::from_usize(0);
        let ballot_box = network
            .bind(
                topology.ballot_box(index).unwrap().clone(),
                Topology::ballot_box_identity(index),
            )
            .unwrap();
        let clock = network
            .bind(topology.clock().clone(), Identity::new(Role::Clock, "timer"))
            .unwrap();

        let stub = thread::spawn(move || {
            let (mut stream, _) = ballot_box.accept_from(Role::KeyAuthority).unwrap();
            let signed: SignedShare = stream.read_object().unwrap();
            answer(&mut stream, signed);
        });

        let authority = KeyAuthority::new(
            network.client(Identity::new(Role::KeyAuthority, "sgen")),
            topology,
            TEST_BITS,
        );
        let result = authority.run(&mut ChaCha20Rng::seed_from_u64(71));
        stub.join().unwrap();
        (result, clock, network)
    }

    fn assert_clock_never_started(clock: MemoryEndpoint, network: MemoryNetwork) {
        // queued connections would still be delivered after shutdown
        network.shutdown();
        assert!(matches!(
            clock.accept_any(),
            Err(BallotError::ChannelClosed)
        ));
    }

    #[test]
    #[traced_test]
    fn refused_share_aborts_setup() {
        let (result, clock, network) = setup_against(|stream, _| {
            stream.write_bool(false).unwrap();
        });
        assert!(matches!(result, Err(BallotError::SetupAborted(_))));
        assert_clock_never_started(clock, network);
    }

    #[test]
    #[traced_test]
    fn mismatched_partial_key_aborts_setup() {
        let (result, clock, network) = setup_against(|stream, signed| {
            let share = signed.into_share();
            let wrong = KeyShare::from_secret(share.group().clone(), BigUint::one()).unwrap();
            assert_ne!(wrong.public(), share.public());
            stream.write_bool(true).unwrap();
            stream.write_object(wrong.public()).unwrap();
            assert!(!stream.read_bool().unwrap());
        });
        assert!(matches!(result, Err(BallotError::SetupAborted(_))));
        assert_clock_never_started(clock, network);
    }
}
