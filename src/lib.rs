pub mod ballot_box;
pub mod bulletin;
pub mod clock;
pub mod collections;
pub mod config;
mod constants;
pub mod credentials;
pub mod crypto_tools;
pub mod election;
pub mod key_authority;
pub mod ledger;
pub mod registry;
pub mod sdk;
pub mod topology;
pub mod vote;
pub mod voter;
pub mod voting_session;
