//! Eligibility lookups consulted at registration time.
use std::collections::HashMap;

use tracing::{info, warn};

use crate::sdk::{
    api::{BallotError, BallotResult},
    channel::Identity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    NotFound,
    Eligible,
    AlreadyIssued,
}

/// Lookup-and-mark service keyed by the peer identity presented on the channel.
pub trait EligibilityRegistry: Send {
    fn lookup(&self, identity: &Identity) -> Eligibility;
    fn mark_issued(&mut self, identity: &Identity) -> BallotResult<()>;
}

/// Voter codes eligible in the demo election.
pub const DEMO_VOTER_CODES: [&str; 4] = ["EMDM00V001", "ACXX99V002", "ADGX99V003", "SGXX99V004"];

/// Voter codes mapped to whether a credential was already issued.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    issued: HashMap<String, bool>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            issued: codes.into_iter().map(|code| (code.into(), false)).collect(),
        }
    }

    pub fn demo() -> Self {
        Self::with_codes(DEMO_VOTER_CODES)
    }

    pub fn add(&mut self, code: impl Into<String>) {
        self.issued.entry(code.into()).or_insert(false);
    }
}

impl EligibilityRegistry for InMemoryRegistry {
    fn lookup(&self, identity: &Identity) -> Eligibility {
        match self.issued.get(identity.name()) {
            None => Eligibility::NotFound,
            Some(false) => Eligibility::Eligible,
            Some(true) => Eligibility::AlreadyIssued,
        }
    }

    fn mark_issued(&mut self, identity: &Identity) -> BallotResult<()> {
        match self.issued.get_mut(identity.name()) {
            Some(issued) if !*issued => {
                *issued = true;
                info!("credential issued to {}", identity.name());
                Ok(())
            }
            Some(_) => {
                warn!("credential for {} already issued", identity.name());
                Err(BallotError::AlreadyIssued)
            }
            None => {
                warn!("{} not in registry", identity.name());
                Err(BallotError::NotEligible)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::channel::Role;

    #[test]
    fn issue_once() {
        let mut registry = InMemoryRegistry::with_codes(["EMDM00V001"]);
        let voter = Identity::new(Role::Voter, "EMDM00V001");
        let stranger = Identity::new(Role::Voter, "XXXX00V999");

        assert_eq!(registry.lookup(&voter), Eligibility::Eligible);
        assert_eq!(registry.lookup(&stranger), Eligibility::NotFound);
        registry.mark_issued(&voter).unwrap();
        assert_eq!(registry.lookup(&voter), Eligibility::AlreadyIssued);
        assert_eq!(registry.mark_issued(&voter), Err(BallotError::AlreadyIssued));
        assert_eq!(registry.mark_issued(&stranger), Err(BallotError::NotEligible));

        registry.add("XXXX00V999");
        assert_eq!(registry.lookup(&stranger), Eligibility::Eligible);
    }
}
