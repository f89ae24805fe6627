use clap::Parser;
use threshold_ballot::{
    ballot_box::Tally,
    config::ElectionConfig,
    election::{LocalElection, PollingStation},
    registry::{InMemoryRegistry, DEMO_VOTER_CODES},
    sdk::api::BallotResult,
    vote::VoteChoice::{Abstain, Against, InFavour},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI that runs a complete local election with a scripted set of voters
#[derive(Parser, Debug)]
#[clap(name = "ballot-demo")]
#[clap(about = "Run a threshold ElGamal election with every role on its own thread")]
#[clap(version, long_about = None)]
struct Cli {
    /// Number of ballot boxes sharing the decryption key
    #[clap(short = 'n', long = "ballot-boxes", default_value_t = 3)]
    ballot_boxes: usize,
    /// Bit length of the safe prime modulus
    #[clap(short = 'b', long = "security-bits", default_value_t = 512)]
    security_bits: usize,
    /// Seed for a reproducible run
    #[clap(short = 's', long = "seed")]
    seed: Option<u64>,
}

pub fn main() -> BallotResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ElectionConfig {
        security_bits: cli.security_bits,
        ballot_box_count: cli.ballot_boxes,
        ..Default::default()
    };
    let mut election = LocalElection::new(config, InMemoryRegistry::demo())?;
    if let Some(seed) = cli.seed {
        election = election.with_seed(seed);
    }

    let report = election.run(scripted_voters)?;
    match report.tally {
        Tally::NoVotes => println!("no votes cast"),
        Tally::Total(total) => println!("tally: {}", total),
    }
    println!("published ballots: {}", report.bulletin.len());
    Ok(())
}

/// Vote changes, a stolen identifier, a cancellation, an ineligible voter and
/// a repeated registration. Every rejection is logged and the script goes on.
fn scripted_voters(station: &PollingStation) {
    let [first, second, third, fourth] = DEMO_VOTER_CODES;

    let mut voter1 = station.voter(first);
    let credential1 = match voter1.register("pwdv1") {
        Ok(credential) => credential,
        Err(err) => {
            warn!("voter 1 could not register: {}", err);
            return;
        }
    };
    report("voter 1 votes -1", voter1.vote(&credential1, Some(Against)));
    report("voter 1 changes to 1", voter1.vote(&credential1, Some(InFavour)));

    let mut voter2 = station.voter(second);
    report(
        "voter 2 claims voter 1's identifier",
        voter2
            .register_claiming("pwdv2", Some(credential1.identifier()))
            .map(|_| ()),
    );
    if let Ok(credential2) = voter2.register("pwdv2") {
        report("voter 2 votes 1", voter2.vote(&credential2, Some(InFavour)));
    }

    let mut voter3 = station.voter(third);
    if let Ok(credential3) = voter3.register("pwdv3") {
        report("voter 3 votes 0", voter3.vote(&credential3, Some(Abstain)));
        report("voter 3 cancels", voter3.vote(&credential3, None));
        report("voter 3 votes -1", voter3.vote(&credential3, Some(Against)));
    }

    let mut voter4 = station.voter(fourth);
    if let Ok(credential4) = voter4.register("pwdv4") {
        report("voter 4 cancels without a vote", voter4.vote(&credential4, None));
    }

    let mut voter5 = station.voter("XXXX00V005");
    report("voter 5 registers", voter5.register("pwdv5").map(|_| ()));

    report("voter 1 registers again", voter1.register("pwdv1").map(|_| ()));
}

fn report(step: &str, result: BallotResult<()>) {
    match result {
        Ok(()) => info!("{}: ok", step),
        Err(err) => warn!("{}: {}", step, err),
    }
}
