//! Whole elections with every role on its own thread.
use std::time::Duration;

use threshold_ballot::{
    ballot_box::Tally,
    config::ElectionConfig,
    credentials::Credential,
    crypto_tools::schnorr::SchnorrSigner,
    election::{ElectionReport, LocalElection, PollingStation},
    registry::{InMemoryRegistry, DEMO_VOTER_CODES},
    sdk::api::BallotError,
    vote::{
        CastVote, SignedVote,
        VoteChoice::{Abstain, Against, InFavour},
    },
};

const SECURITY_BITS: usize = 128;

fn election<F>(ballot_box_count: usize, seed: u64, voting: F) -> ElectionReport
where
    F: FnOnce(&PollingStation),
{
    let config = ElectionConfig {
        security_bits: SECURITY_BITS,
        ballot_box_count,
        ..Default::default()
    };
    LocalElection::new(config, InMemoryRegistry::demo())
        .expect("config rejected")
        .with_seed(seed)
        .run(voting)
        .expect("election failed")
}

fn assert_live_vote_published(report: &ElectionReport, credential: &Credential) {
    let record = report
        .session
        .credentials
        .authenticate(credential)
        .expect("credential not stored");
    let vote = record.live_vote().expect("no live vote");
    assert!(report.bulletin.contains(vote.ciphertext()));
}

#[test]
fn single_vote() {
    let mut credential = None;
    let report = election(3, 1, |station| {
        let mut voter = station.voter(DEMO_VOTER_CODES[0]);
        let issued = voter.register("pwdv1").unwrap();
        voter.vote(&issued, Some(InFavour)).unwrap();
        credential = Some(issued);
    });
    assert_eq!(report.tally, Tally::Total(1));
    assert_eq!(report.bulletin.len(), 1);
    assert_live_vote_published(&report, &credential.unwrap());
}

#[test]
fn changed_vote_replaces_the_first() {
    let mut credential = None;
    let report = election(3, 2, |station| {
        let mut voter = station.voter(DEMO_VOTER_CODES[1]);
        let issued = voter.register("pwdv2").unwrap();
        voter.vote(&issued, Some(Abstain)).unwrap();
        voter.vote(&issued, Some(Against)).unwrap();
        credential = Some(issued);
    });
    assert_eq!(report.tally, Tally::Total(-1));
    assert_eq!(report.bulletin.len(), 1);
    assert_live_vote_published(&report, &credential.unwrap());
}

#[test]
fn cancellation_without_a_vote_is_refused() {
    let report = election(2, 3, |station| {
        let mut voter = station.voter(DEMO_VOTER_CODES[2]);
        let credential = voter.register("pwdv3").unwrap();
        assert!(matches!(
            voter.vote(&credential, None),
            Err(BallotError::NoPriorVote)
        ));

        let mut other = station.voter(DEMO_VOTER_CODES[3]);
        let credential = other.register("pwdv4").unwrap();
        other.vote(&credential, Some(Against)).unwrap();
    });
    assert_eq!(report.tally, Tally::Total(-1));
    assert_eq!(report.bulletin.len(), 1);
}

#[test]
fn cancelled_vote_leaves_no_votes() {
    let report = election(2, 4, |station| {
        let mut voter = station.voter(DEMO_VOTER_CODES[0]);
        let credential = voter.register("pwdv1").unwrap();
        voter.vote(&credential, Some(InFavour)).unwrap();
        voter.vote(&credential, None).unwrap();
    });
    assert_eq!(report.tally, Tally::NoVotes);
    assert!(report.bulletin.is_empty());
}

#[test]
fn forged_signature_is_rejected() {
    let report = election(3, 5, |station| {
        let mut voter = station.voter(DEMO_VOTER_CODES[0]);
        let credential = voter.register("pwdv1").unwrap();

        let forged = voter.submit_vote(&credential, |pk, rng| {
            let signer = SchnorrSigner::new(pk.group().clone(), rng);
            let signed = CastVote::sign(pk.encrypt_in_exponent(1, rng)?, &signer, rng)?;
            let swapped = pk.encrypt_in_exponent(-1, rng)?;
            Ok(SignedVote::Cast(CastVote::new(
                swapped,
                signed.signature().clone(),
            )))
        });
        assert!(matches!(forged, Err(BallotError::SignatureInvalid)));

        voter.vote(&credential, Some(InFavour)).unwrap();
    });
    assert_eq!(report.tally, Tally::Total(1));
    assert_eq!(report.bulletin.len(), 1);
}

#[test]
fn registration_rules() {
    let report = election(2, 6, |station| {
        let mut outsider = station.voter("XXXX00V005");
        assert!(matches!(
            outsider.register("pwdv5"),
            Err(BallotError::NotEligible)
        ));

        let mut first = station.voter(DEMO_VOTER_CODES[0]);
        let credential = first.register("pwdv1").unwrap();
        assert!(matches!(
            first.register("pwdv1"),
            Err(BallotError::NotEligible)
        ));

        // a stolen identifier fails, the voter can still register honestly
        let mut second = station.voter(DEMO_VOTER_CODES[1]);
        assert!(matches!(
            second.register_claiming("pwdv2", Some(credential.identifier())),
            Err(BallotError::CredentialMismatch)
        ));
        second.register("pwdv2").unwrap();

        let mut third = station.voter(DEMO_VOTER_CODES[2]);
        assert!(matches!(
            third.register(""),
            Err(BallotError::AuthenticationFailed)
        ));

        // wrong password
        let impostor = Credential::new(credential.identifier(), "pwdv2");
        assert!(matches!(
            first.vote(&impostor, Some(InFavour)),
            Err(BallotError::AuthenticationFailed)
        ));
    });
    assert_eq!(report.tally, Tally::NoVotes);
    assert_eq!(report.session.credentials.len(), 2);
}

#[test]
fn scripted_demo() {
    let report = election(3, 7, |station| {
        let [first, second, third, fourth] = DEMO_VOTER_CODES;

        let mut voter1 = station.voter(first);
        let credential1 = voter1.register("pwdv1").unwrap();
        voter1.vote(&credential1, Some(Against)).unwrap();
        voter1.vote(&credential1, Some(InFavour)).unwrap();

        let mut voter2 = station.voter(second);
        let credential2 = voter2.register("pwdv2").unwrap();
        voter2.vote(&credential2, Some(InFavour)).unwrap();

        let mut voter3 = station.voter(third);
        let credential3 = voter3.register("pwdv3").unwrap();
        voter3.vote(&credential3, Some(Abstain)).unwrap();
        voter3.vote(&credential3, None).unwrap();
        voter3.vote(&credential3, Some(Against)).unwrap();

        let mut voter4 = station.voter(fourth);
        let credential4 = voter4.register("pwdv4").unwrap();
        assert!(voter4.vote(&credential4, None).is_err());
    });
    assert_eq!(report.tally, Tally::Total(1));
    assert_eq!(report.bulletin.len(), 3);
    assert_eq!(report.ballot_boxes.len(), 3);
    let held: usize = report
        .ballot_boxes
        .iter()
        .map(|(_, done)| done.ledger.len())
        .sum();
    assert_eq!(held, 3);
}

#[test]
fn timed_window_closes_by_itself() {
    let config = ElectionConfig {
        security_bits: SECURITY_BITS,
        ballot_box_count: 2,
        voting_window: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let report = LocalElection::new(config, InMemoryRegistry::demo())
        .unwrap()
        .with_seed(8)
        .run(|_| {})
        .unwrap();
    assert_eq!(report.tally, Tally::NoVotes);
}

#[test]
fn invalid_config_is_refused() {
    for config in [
        ElectionConfig {
            ballot_box_count: 0,
            ..Default::default()
        },
        ElectionConfig {
            security_bits: 8,
            ..Default::default()
        },
    ] {
        assert!(matches!(
            LocalElection::new(config, InMemoryRegistry::demo()),
            Err(BallotError::Config(_))
        ));
    }
}
