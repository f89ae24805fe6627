//! In-process [SecureTransport]: every endpoint registers on a shared
//! [MemoryNetwork] and every stream is a pair of `mpsc` channels.
//! Identities are assigned at bind time and cannot be forged by the peer.
use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    time::Duration,
};

use tracing::{debug, error};

use super::{
    api::{BallotError, BallotResult},
    channel::{Address, Frame, FrameStream, Identity, SecureTransport},
};
use crate::config::ChannelConfig;

struct Incoming {
    peer: Identity,
    stream: MemoryStream,
}

type Listeners = HashMap<Address, Sender<Incoming>>;

#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<Mutex<Listeners>>,
    config: ChannelConfig,
}

impl MemoryNetwork {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            listeners: Arc::default(),
            config,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Listen on `address`. Fails if another endpoint already listens there.
    pub fn bind(&self, address: Address, identity: Identity) -> BallotResult<MemoryEndpoint> {
        let (sender, receiver) = mpsc::channel();
        let mut listeners = self.lock()?;
        if listeners.contains_key(&address) {
            error!("address {} already bound", address);
            return Err(BallotError::Config(format!("address {} in use", address)));
        }
        listeners.insert(address.clone(), sender);
        debug!("{} listening on {}", identity, address);
        Ok(MemoryEndpoint {
            identity,
            network: self.clone(),
            bound: Some((address, receiver)),
        })
    }

    /// Endpoint that can only dial out, as used by voters.
    pub fn client(&self, identity: Identity) -> MemoryEndpoint {
        MemoryEndpoint {
            identity,
            network: self.clone(),
            bound: None,
        }
    }

    /// Unbind every address. Endpoints blocked in `accept_any` fail with
    /// [BallotError::ChannelClosed].
    pub fn shutdown(&self) {
        if let Ok(mut listeners) = self.listeners.lock() {
            debug!("shutting down {} listeners", listeners.len());
            listeners.clear();
        }
    }

    fn lock(&self) -> BallotResult<std::sync::MutexGuard<'_, Listeners>> {
        self.listeners.lock().map_err(|_| {
            error!("listener registry poisoned");
            BallotError::ChannelClosed
        })
    }
}

pub struct MemoryEndpoint {
    identity: Identity,
    network: MemoryNetwork,
    bound: Option<(Address, Receiver<Incoming>)>,
}

impl SecureTransport for MemoryEndpoint {
    type Stream = MemoryStream;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn connect(&self, address: &Address) -> BallotResult<MemoryStream> {
        let listener = self.network.lock()?.get(address).cloned().ok_or_else(|| {
            debug!("{}: nothing listening on {}", self.identity, address);
            BallotError::ChannelClosed
        })?;
        let (local, remote) = MemoryStream::pair(self.network.config.io_deadline);
        listener
            .send(Incoming {
                peer: self.identity.clone(),
                stream: remote,
            })
            .map_err(|_| {
                debug!("{}: listener at {} is gone", self.identity, address);
                BallotError::ChannelClosed
            })?;
        Ok(local)
    }

    fn accept_any(&self) -> BallotResult<(MemoryStream, Identity)> {
        let (address, incoming) = self.bound.as_ref().ok_or_else(|| {
            error!("{} is not listening", self.identity);
            BallotError::Protocol("endpoint is not listening".into())
        })?;
        let next = match self.network.config.accept_deadline {
            Some(deadline) => incoming.recv_timeout(deadline).map_err(|err| match err {
                RecvTimeoutError::Timeout => BallotError::Timeout,
                RecvTimeoutError::Disconnected => BallotError::ChannelClosed,
            })?,
            None => incoming.recv().map_err(|_| BallotError::ChannelClosed)?,
        };
        debug!("{} on {} accepted {}", self.identity, address, next.peer);
        Ok((next.stream, next.peer))
    }
}

impl Drop for MemoryEndpoint {
    fn drop(&mut self) {
        if let Some((address, _)) = &self.bound {
            if let Ok(mut listeners) = self.network.listeners.lock() {
                listeners.remove(address);
            }
        }
    }
}

pub struct MemoryStream {
    sender: Sender<Frame>,
    receiver: Receiver<Frame>,
    io_deadline: Duration,
}

impl MemoryStream {
    fn pair(io_deadline: Duration) -> (Self, Self) {
        let (a_sender, b_receiver) = mpsc::channel();
        let (b_sender, a_receiver) = mpsc::channel();
        (
            Self {
                sender: a_sender,
                receiver: a_receiver,
                io_deadline,
            },
            Self {
                sender: b_sender,
                receiver: b_receiver,
                io_deadline,
            },
        )
    }
}

impl FrameStream for MemoryStream {
    fn send_frame(&mut self, frame: Frame) -> BallotResult<()> {
        self.sender
            .send(frame)
            .map_err(|_| BallotError::ChannelClosed)
    }

    fn recv_frame(&mut self) -> BallotResult<Frame> {
        self.receiver
            .recv_timeout(self.io_deadline)
            .map_err(|err| match err {
                RecvTimeoutError::Timeout => BallotError::Timeout,
                RecvTimeoutError::Disconnected => BallotError::ChannelClosed,
            })
    }
}
