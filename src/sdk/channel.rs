//! The secure channel contract every role talks through.
//!
//! A production deployment plugs in a mutually authenticated transport; the crate
//! ships [super::memory] for tests and the local driver. Messages are framed as a
//! request tag, then serialized values, each answered by a bool or integer ack.
use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use super::{
    api::{BallotError, BallotResult, BytesVec},
    wire_bytes,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    KeyAuthority,
    BallotBox,
    VotingSession,
    Bulletin,
    Clock,
    Voter,
}

/// Verified peer identity, as extracted from the peer's certificate.
/// For voters `name` carries the code looked up in the eligibility registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    role: Role,
    name: String,
}

impl Identity {
    pub fn new(role: Role, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
        }
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.role, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One framed value on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    Utf(String),
    Bool(bool),
    Int(i32),
    Object(BytesVec),
}

impl Frame {
    fn kind(&self) -> &'static str {
        match self {
            Frame::Utf(_) => "utf",
            Frame::Bool(_) => "bool",
            Frame::Int(_) => "int",
            Frame::Object(_) => "object",
        }
    }
}

/// Request tag opening a connection to a serving role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Vote,
    Stop,
    Register,
}

impl Request {
    pub fn tag(&self) -> &'static str {
        match self {
            Request::Vote => "voting",
            Request::Stop => "stop",
            Request::Register => "registration",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "voting" => Some(Request::Vote),
            "stop" => Some(Request::Stop),
            "registration" => Some(Request::Register),
            _ => None,
        }
    }
}

/// Announces whether the previous live vote follows the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    OneMessage,
    TwoMessages,
}

impl FollowUp {
    pub fn tag(&self) -> &'static str {
        match self {
            FollowUp::OneMessage => "one message",
            FollowUp::TwoMessages => "two messages",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "one message" => Some(FollowUp::OneMessage),
            "two messages" => Some(FollowUp::TwoMessages),
            _ => None,
        }
    }
}

pub const ACK: i32 = 1;
pub const NACK: i32 = 0;

fn unexpected(expected: &'static str, found: &Frame) -> BallotError {
    warn!("expected {} frame, found {}", expected, found.kind());
    BallotError::Protocol(format!("expected {} frame, found {}", expected, found.kind()))
}

/// A connected, authenticated, bidirectional stream of frames.
pub trait FrameStream: Send {
    fn send_frame(&mut self, frame: Frame) -> BallotResult<()>;
    fn recv_frame(&mut self) -> BallotResult<Frame>;

    fn write_utf(&mut self, value: &str) -> BallotResult<()> {
        self.send_frame(Frame::Utf(value.to_owned()))
    }
    fn read_utf(&mut self) -> BallotResult<String> {
        match self.recv_frame()? {
            Frame::Utf(value) => Ok(value),
            other => Err(unexpected("utf", &other)),
        }
    }

    fn write_bool(&mut self, value: bool) -> BallotResult<()> {
        self.send_frame(Frame::Bool(value))
    }
    fn read_bool(&mut self) -> BallotResult<bool> {
        match self.recv_frame()? {
            Frame::Bool(value) => Ok(value),
            other => Err(unexpected("bool", &other)),
        }
    }

    fn write_int(&mut self, value: i32) -> BallotResult<()> {
        self.send_frame(Frame::Int(value))
    }
    fn read_int(&mut self) -> BallotResult<i32> {
        match self.recv_frame()? {
            Frame::Int(value) => Ok(value),
            other => Err(unexpected("int", &other)),
        }
    }

    fn write_object<T: Serialize>(&mut self, value: &T) -> BallotResult<()> {
        self.send_frame(Frame::Object(wire_bytes::encode(value)?))
    }
    fn read_object<T: DeserializeOwned>(&mut self) -> BallotResult<T> {
        match self.recv_frame()? {
            Frame::Object(bytes) => wire_bytes::decode(&bytes),
            other => Err(unexpected("object", &other)),
        }
    }

    fn write_request(&mut self, request: Request) -> BallotResult<()> {
        self.write_utf(request.tag())
    }
    /// Unknown tags surface as [BallotError::Protocol]; callers log and ignore them.
    fn read_request(&mut self) -> BallotResult<Request> {
        let tag = self.read_utf()?;
        Request::from_tag(&tag).ok_or_else(|| {
            warn!("unknown request tag {:?}", tag);
            BallotError::Protocol(format!("unknown request tag {:?}", tag))
        })
    }

    /// Read an integer ack and fail unless it is [ACK].
    fn expect_ack(&mut self) -> BallotResult<()> {
        match self.read_int()? {
            ACK => Ok(()),
            other => Err(BallotError::Protocol(format!("negative ack {}", other))),
        }
    }
}

/// `connect`/`accept` contract of a mutually authenticated transport endpoint.
pub trait SecureTransport: Send {
    type Stream: FrameStream;

    fn identity(&self) -> &Identity;
    fn connect(&self, address: &Address) -> BallotResult<Self::Stream>;
    fn accept_any(&self) -> BallotResult<(Self::Stream, Identity)>;

    /// The rejected stream is dropped before any data is exchanged.
    fn accept_from(&self, expected: Role) -> BallotResult<(Self::Stream, Identity)> {
        let (stream, peer) = self.accept_any()?;
        if peer.role() != expected {
            warn!("{}: rejected connection from {}", self.identity(), peer);
            return Err(BallotError::ChannelRejected {
                expected,
                found: peer.role(),
            });
        }
        Ok((stream, peer))
    }
}

/// Barrier phases wait for the expected role and refuse everyone else.
pub fn accept_next_from<T: SecureTransport>(
    transport: &T,
    expected: Role,
) -> BallotResult<(T::Stream, Identity)> {
    loop {
        match transport.accept_from(expected) {
            Err(BallotError::ChannelRejected { .. }) => continue,
            result => return result,
        }
    }
}
