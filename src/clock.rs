//! Election clock: opens the voting window on the authority's signal and closes
//! it by stopping the voting session, then every ballot box in topology order.
use std::{sync::mpsc::Receiver, thread, time::Duration};

use tracing::{info, warn};

use crate::{
    sdk::{
        api::{BallotError, BallotResult},
        channel::{accept_next_from, Address, FrameStream, Request, Role, SecureTransport, ACK},
    },
    topology::Topology,
};

pub enum WindowEnd {
    /// Close a fixed time after the start signal.
    After(Duration),
    /// Close when a message arrives or the sender is dropped.
    OnSignal(Receiver<()>),
}

pub struct ElectionClock<T: SecureTransport> {
    transport: T,
    topology: Topology,
    window: WindowEnd,
}

impl<T: SecureTransport> ElectionClock<T> {
    pub fn new(transport: T, topology: Topology, window: WindowEnd) -> Self {
        Self {
            transport,
            topology,
            window,
        }
    }

    pub fn run(self) -> BallotResult<()> {
        let (mut stream, _) = accept_next_from(&self.transport, Role::KeyAuthority)?;
        match stream.read_int()? {
            ACK => stream.write_int(ACK)?,
            other => {
                return Err(BallotError::Protocol(format!(
                    "unexpected start signal {}",
                    other
                )))
            }
        }
        info!("clock: voting window open");

        match self.window {
            WindowEnd::After(window) => thread::sleep(window),
            WindowEnd::OnSignal(ref signal) => {
                // a dropped sender closes the window too
                let _ = signal.recv();
            }
        }
        info!("clock: voting window closed");

        let targets = std::iter::once(self.topology.voting_session())
            .chain(self.topology.ballot_boxes().iter().map(|(_, address)| address));
        let mut first_failure = None;
        for address in targets {
            if let Err(err) = self.stop(address) {
                warn!("clock: could not stop {}: {}", address, err);
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn stop(&self, address: &Address) -> BallotResult<()> {
        let mut stream = self.transport.connect(address)?;
        stream.write_request(Request::Stop)?;
        stream.expect_ack()?;
        info!("clock: stopped {}", address);
        Ok(())
    }
}
