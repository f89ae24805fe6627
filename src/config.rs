use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    constants::{
        DEFAULT_SECURITY_BITS, MAX_BALLOT_BOX_COUNT, MAX_SECURITY_BITS, MIN_BALLOT_BOX_COUNT,
        MIN_SECURITY_BITS,
    },
    sdk::api::{BallotError, BallotResult},
};

/// Deadlines applied by a transport to its blocking calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Maximum wait for the next frame on an open stream.
    pub io_deadline: Duration,
    /// Maximum wait for an incoming connection. `None` blocks until one arrives.
    pub accept_deadline: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            io_deadline: Duration::from_secs(30),
            accept_deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Bit length of the safe prime modulus.
    pub security_bits: usize,
    pub ballot_box_count: usize,
    pub channel: ChannelConfig,
    /// `None` keeps the window open until the clock is triggered explicitly.
    pub voting_window: Option<Duration>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            security_bits: DEFAULT_SECURITY_BITS,
            ballot_box_count: 3,
            channel: ChannelConfig::default(),
            voting_window: None,
        }
    }
}

impl ElectionConfig {
    pub fn validate(&self) -> BallotResult<()> {
        if !(MIN_SECURITY_BITS..=MAX_SECURITY_BITS).contains(&self.security_bits) {
            error!(
                "security_bits {} not in [{},{}]",
                self.security_bits, MIN_SECURITY_BITS, MAX_SECURITY_BITS
            );
            return Err(BallotError::Config(format!(
                "security_bits {} out of range",
                self.security_bits
            )));
        }
        if !(MIN_BALLOT_BOX_COUNT..=MAX_BALLOT_BOX_COUNT).contains(&self.ballot_box_count) {
            error!(
                "ballot_box_count {} not in [{},{}]",
                self.ballot_box_count, MIN_BALLOT_BOX_COUNT, MAX_BALLOT_BOX_COUNT
            );
            return Err(BallotError::Config(format!(
                "ballot_box_count {} out of range",
                self.ballot_box_count
            )));
        }
        if self.channel.io_deadline.is_zero() {
            error!("io_deadline must be positive");
            return Err(BallotError::Config("io_deadline must be positive".into()));
        }
        Ok(())
    }
}
