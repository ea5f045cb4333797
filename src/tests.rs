use super::*;

const DEMO_BITS: u64 = 64;

fn register_all(election: &mut Election, voter_ids: &[&str]) -> Vec<VoterToken> {
    voter_ids
        .iter()
        .map(|id| election.register(id).unwrap())
        .collect()
}

fn cast_all(election: &mut Election, tokens: &[VoterToken], choices: &[bool]) {
    for (token, choice) in tokens.iter().zip(choices) {
        let submission =
            CastSubmission::seal(election.params(), *choice, token).unwrap();
        election.cast(&submission).unwrap();
    }
}

#[test]
fn three_voter_referendum() {
    let mut election = Election::setup(DEMO_BITS, 3).unwrap();
    let tokens = register_all(&mut election, &["v1", "v2", "v3"]);

    election.open().unwrap();
    cast_all(&mut election, &tokens, &[true, false, true]);
    election.close().unwrap();

    let outcome = election.tally().unwrap();
    assert_eq!(outcome.yes, 2);
    assert_eq!(outcome.no, 1);
    assert_eq!(election.state(), ElectionState::Tallied);
    election.audit().verify().unwrap();
}

#[test]
fn eight_voter_audit_trail() {
    let voter_ids = ["v1", "v2", "v3", "v4", "v5", "v6", "v7", "v8"];
    let choices = [true, true, false, true, false, false, true, true];

    let mut election = Election::setup(DEMO_BITS, 8).unwrap();
    let tokens = register_all(&mut election, &voter_ids);

    election.open().unwrap();
    cast_all(&mut election, &tokens, &choices);
    election.close().unwrap();

    let outcome = election.tally().unwrap();
    assert_eq!(outcome.yes, 5);
    assert_eq!(outcome.no, 3);

    // 1 SETUP + 8 REGISTER + 8 VOTE + 1 MIX + 1 TALLY
    let audit = election.audit();
    assert_eq!(audit.len(), 19);
    assert_eq!(audit.events_by_kind(EventKind::Setup).len(), 1);
    assert_eq!(audit.events_by_kind(EventKind::Register).len(), 8);
    assert_eq!(audit.events_by_kind(EventKind::Vote).len(), 8);
    assert_eq!(audit.events_by_kind(EventKind::Mix).len(), 1);
    assert_eq!(audit.events_by_kind(EventKind::Tally).len(), 1);
    audit.verify().unwrap();
}

#[test]
fn double_vote_is_rejected() {
    let mut election = Election::setup(DEMO_BITS, 2).unwrap();
    let tokens = register_all(&mut election, &["v1", "v2"]);

    election.open().unwrap();

    let first = CastSubmission::seal(election.params(), true, &tokens[0]).unwrap();
    election.cast(&first).unwrap();

    // same voter, same token, fresh ciphertext
    let second = CastSubmission::seal(election.params(), false, &tokens[0]).unwrap();
    assert!(matches!(
        election.cast(&second),
        Err(Error::TokenAlreadyUsed)
    ));

    let other = CastSubmission::seal(election.params(), false, &tokens[1]).unwrap();
    election.cast(&other).unwrap();
    election.close().unwrap();

    // the double-vote attempt changed nothing
    let outcome = election.tally().unwrap();
    assert_eq!(outcome.yes, 1);
    assert_eq!(outcome.no, 1);
    assert_eq!(election.rejected().len(), 1);
}

#[test]
fn malformed_proof_does_not_consume_the_token() {
    let mut election = Election::setup(DEMO_BITS, 1).unwrap();
    let tokens = register_all(&mut election, &["v1"]);
    election.open().unwrap();

    let mut tampered =
        CastSubmission::seal(election.params(), true, &tokens[0]).unwrap();
    tampered.proof.r0 = (&tampered.proof.r0 + 1u32) % &election.params().q;

    assert!(matches!(
        election.cast(&tampered),
        Err(Error::InvalidProof)
    ));
    assert_eq!(election.statistics().tokens_remaining, 1);

    // no VOTE event entered the chain for the failed attempt
    assert_eq!(election.audit().events_by_kind(EventKind::Vote).len(), 0);

    // the voter retries with an honest ballot and succeeds
    let honest = CastSubmission::seal(election.params(), true, &tokens[0]).unwrap();
    election.cast(&honest).unwrap();
    election.close().unwrap();

    let outcome = election.tally().unwrap();
    assert_eq!(outcome.yes, 1);
    assert_eq!(outcome.no, 0);
}

#[test]
fn tampered_mix_output_is_detected() {
    let (params, _) = keygen(DEMO_BITS).unwrap();
    let ballots: Vec<Ciphertext> = [1u64, 0, 1, 1]
        .iter()
        .map(|b| params.encrypt(*b, None).0)
        .collect();

    let (mut mixed, proof) = mix(&params, &ballots).unwrap();
    verify_mix(&params, &ballots, &mixed, &proof).unwrap();

    // swap one mixed ballot for a fresh encryption of zero
    mixed[2] = params.encrypt(0, None).0;
    assert!(matches!(
        verify_mix(&params, &ballots, &mixed, &proof),
        Err(Error::MixProofInvalid)
    ));
}

#[test]
fn tampered_audit_event_reports_its_index() {
    let mut election = Election::setup(DEMO_BITS, 4).unwrap();
    register_all(&mut election, &["v1", "v2", "v3"]);

    // events: 0 SETUP, 1..=3 REGISTER; corrupt event 3
    election.audit_mut().events[3].payload_digest[0] ^= 1;

    assert!(matches!(
        election.audit().verify(),
        Err(Error::AuditTampered(3))
    ));
    assert!(matches!(
        election.verify_audit(),
        Err(Error::AuditTampered(3))
    ));
}

#[test]
fn casting_requires_an_open_election() {
    let mut election = Election::setup(DEMO_BITS, 1).unwrap();
    let tokens = register_all(&mut election, &["v1"]);

    let submission =
        CastSubmission::seal(election.params(), true, &tokens[0]).unwrap();

    // still in setup
    assert!(matches!(
        election.cast(&submission),
        Err(Error::WrongState { .. })
    ));

    election.open().unwrap();
    election.cast(&submission).unwrap();
    election.close().unwrap();

    // closed: same submission is refused before touching the registry
    let late = CastSubmission::seal(election.params(), true, &tokens[0]).unwrap();
    assert!(matches!(
        election.cast(&late),
        Err(Error::WrongState { .. })
    ));
}

#[test]
fn tallying_requires_a_closed_election() {
    let mut election = Election::setup(DEMO_BITS, 1).unwrap();
    let tokens = register_all(&mut election, &["v1"]);
    election.open().unwrap();

    assert!(matches!(
        election.tally(),
        Err(Error::WrongState { .. })
    ));

    let submission =
        CastSubmission::seal(election.params(), true, &tokens[0]).unwrap();
    election.cast(&submission).unwrap();
    election.close().unwrap();
    election.tally().unwrap();

    // a second tally is refused: the election is already tallied
    assert!(matches!(
        election.tally(),
        Err(Error::WrongState { .. })
    ));
}

#[test]
fn submission_survives_the_wire() {
    let mut election = Election::setup(DEMO_BITS, 1).unwrap();
    let tokens = register_all(&mut election, &["v1"]);
    election.open().unwrap();

    let sealed = CastSubmission::seal(election.params(), true, &tokens[0]).unwrap();
    let received = CastSubmission::unpack(&sealed.pack()).unwrap();
    election.cast(&received).unwrap();

    election.close().unwrap();
    assert_eq!(election.tally().unwrap().yes, 1);
}

#[test]
fn statistics_track_participation() {
    let mut election = Election::setup(DEMO_BITS, 3).unwrap();
    let tokens = register_all(&mut election, &["v1", "v2", "v3"]);
    election.open().unwrap();
    cast_all(&mut election, &tokens[..2], &[true, false]);

    let stats = election.statistics();
    assert_eq!(stats.registered_voters, 3);
    assert_eq!(stats.ballots_accepted, 2);
    assert_eq!(stats.casts_rejected, 0);
    assert_eq!(stats.tokens_remaining, 1);
    assert_eq!(stats.state, ElectionState::Open);
}
