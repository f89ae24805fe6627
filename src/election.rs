//! Runs every role of an election on its own thread over one [MemoryNetwork].
use std::{
    sync::{mpsc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{error, info};

use crate::{
    ballot_box::{run_ballot_box, Done, Tally},
    bulletin::TallyBulletin,
    clock::{ElectionClock, WindowEnd},
    collections::{BallotBoxId, VecMap},
    config::ElectionConfig,
    key_authority::KeyAuthority,
    ledger::Ledger,
    registry::InMemoryRegistry,
    sdk::{
        api::{BallotError, BallotResult},
        channel::{Identity, Role},
        memory::{MemoryEndpoint, MemoryNetwork},
    },
    topology::Topology,
    voter::Voter,
    voting_session::{ClosedSession, VotingSession},
};

#[derive(Debug)]
pub struct ElectionReport {
    pub tally: Tally,
    pub bulletin: Ledger,
    pub ballot_boxes: VecMap<BallotBoxId, Done>,
    pub session: ClosedSession<InMemoryRegistry>,
}

/// Hands out voter clients while the window is open.
pub struct PollingStation {
    network: MemoryNetwork,
    topology: Topology,
    rng: Mutex<ChaCha20Rng>,
}

impl PollingStation {
    /// A voter presenting `code` as its channel identity.
    pub fn voter(&self, code: &str) -> Voter<MemoryEndpoint> {
        let seed: [u8; 32] = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen();
        Voter::new(
            self.network.client(Identity::new(Role::Voter, code)),
            self.topology.voting_session().clone(),
            ChaCha20Rng::from_seed(seed),
        )
    }
}

pub struct LocalElection {
    config: ElectionConfig,
    registry: InMemoryRegistry,
    rng: ChaCha20Rng,
}

impl LocalElection {
    pub fn new(config: ElectionConfig, registry: InMemoryRegistry) -> BallotResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            rng: ChaCha20Rng::from_entropy(),
        })
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            ..self
        }
    }

    /// Set up the election, let `voting` drive voters while the window is open,
    /// then close the window and collect the tally.
    pub fn run<F>(mut self, voting: F) -> BallotResult<ElectionReport>
    where
        F: FnOnce(&PollingStation),
    {
        let network = MemoryNetwork::new(self.config.channel);
        let topology = Topology::local(self.config.ballot_box_count)?;
        let (finished, outcomes) = mpsc::channel();

        let mut boxes = Vec::with_capacity(topology.ballot_box_count());
        for (index, address) in topology.ballot_boxes() {
            let endpoint =
                network.bind(address.clone(), Topology::ballot_box_identity(index))?;
            let topology = topology.clone();
            boxes.push(spawn(format!("sbal-{}", index), &finished, move || {
                run_ballot_box(endpoint, topology, index)
            })?);
        }

        let endpoint = network.bind(
            topology.voting_session().clone(),
            Identity::new(Role::VotingSession, "splat"),
        )?;
        let session = VotingSession::new(endpoint, topology.clone(), self.registry);
        let mut session_rng = ChaCha20Rng::from_seed(self.rng.gen());
        let session = spawn("splat".into(), &finished, move || session.run(&mut session_rng))?;

        let endpoint = network.bind(
            topology.bulletin().clone(),
            Identity::new(Role::Bulletin, "stab"),
        )?;
        let bulletin = TallyBulletin::new(endpoint, topology.clone());
        let bulletin = spawn("stab".into(), &finished, move || bulletin.run())?;

        let (close_window, window) = mpsc::channel();
        let window = match self.config.voting_window {
            Some(duration) => WindowEnd::After(duration),
            None => WindowEnd::OnSignal(window),
        };
        let endpoint = network.bind(
            topology.clock().clone(),
            Identity::new(Role::Clock, "timer"),
        )?;
        let clock = ElectionClock::new(endpoint, topology.clone(), window);
        let clock = spawn("timer".into(), &finished, move || clock.run())?;

        let authority = KeyAuthority::new(
            network.client(Identity::new(Role::KeyAuthority, "sgen")),
            topology.clone(),
            self.config.security_bits,
        );
        drop(finished);
        if let Err(err) = authority.run(&mut self.rng) {
            error!("election not started: {}", err);
            network.shutdown();
            let _ = join(clock);
            let _ = join(session);
            let _ = join(bulletin);
            for handle in boxes {
                let _ = join(handle);
            }
            return Err(err);
        }

        let station = PollingStation {
            network: network.clone(),
            topology: topology.clone(),
            rng: Mutex::new(ChaCha20Rng::from_seed(self.rng.gen())),
        };
        voting(&station);
        let _ = close_window.send(());

        // one failed role would leave its peers blocked in accept
        for succeeded in outcomes {
            if !succeeded {
                network.shutdown();
            }
        }

        join(clock)?;
        let session = join(session)?;
        let ballot_boxes = boxes
            .into_iter()
            .map(join)
            .collect::<BallotResult<Vec<Done>>>()?;
        let bulletin = join(bulletin)?;

        let tally = ballot_boxes
            .last()
            .and_then(|done| done.tally)
            .ok_or_else(|| {
                error!("last ballot box finished without a tally");
                BallotError::Protocol("no tally".into())
            })?;
        info!("election over: {:?}", tally);

        Ok(ElectionReport {
            tally,
            bulletin,
            ballot_boxes: VecMap::from_vec(ballot_boxes),
            session,
        })
    }
}

/// Each role reports success or failure on `finished` when it returns.
fn spawn<T, F>(
    name: String,
    finished: &mpsc::Sender<bool>,
    f: F,
) -> BallotResult<JoinHandle<BallotResult<T>>>
where
    T: Send + 'static,
    F: FnOnce() -> BallotResult<T> + Send + 'static,
{
    let finished = finished.clone();
    let role = move || {
        let result = f();
        let _ = finished.send(result.is_ok());
        result
    };
    thread::Builder::new().name(name).spawn(role).map_err(|err| {
        error!("could not spawn thread: {}", err);
        BallotError::Config(format!("could not spawn thread: {}", err))
    })
}

fn join<T>(handle: JoinHandle<BallotResult<T>>) -> BallotResult<T> {
    handle.join().map_err(|_| {
        error!("role thread panicked");
        BallotError::Protocol("role thread panicked".into())
    })?
}
