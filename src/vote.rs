//! Ballot casting.
//!
//! The voter-side helper seals a yes/no choice into an ElGamal ciphertext
//! with a 0-or-1 proof; the VotingCenter admits submissions in a fixed
//! order: authenticate the token, verify the proof, and only then consume
//! the token and record the ballot. A submission that fails any check
//! leaves the registry and the audit chain untouched.

use crate::authn::{TokenRegistry, VoterToken};
use crate::audit::{AuditLog, EventKind};
use crate::elgamal::{Ciphertext, ElectionParameters};
use crate::nizk::{self, BallotProof};
use crate::serde_hex::{DigestHex, Hex};
use crate::util::timestamp_millis;
use crate::Error;

use log::debug;
use serde_json::json;
use sha2::{Digest, Sha256};

/// A cast submission as it travels from the voter to the VotingCenter.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CastSubmission {
    pub voter_id: String,
    #[serde(with = "DigestHex")]
    pub token: [u8; 32],
    pub ciphertext: Ciphertext,
    pub proof: BallotProof,
}

impl CastSubmission {
    /// Voter-side helper: encrypt `choice` and attach the ballot proof.
    /// The encryption randomizer is used as the proof witness and then
    /// dropped.
    pub fn seal(
        params: &ElectionParameters,
        choice: bool,
        token: &VoterToken,
    ) -> Result<Self, Error> {
        let (ciphertext, beta) = params.encrypt(choice as u64, None);
        let proof = nizk::prove(params, choice, &ciphertext, &beta)?;

        Ok(CastSubmission {
            voter_id: token.voter_id.clone(),
            token: token.token,
            ciphertext,
            proof,
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        serde_cbor::to_vec(self).expect("veilvote: unable to serialize submission")
    }

    pub fn unpack(packed: &[u8]) -> Result<Self, Error> {
        Ok(serde_cbor::from_slice(packed)?)
    }
}

/// A cast attempt that was turned away. Kept out of the main audit chain.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RejectedCast {
    pub voter_id: String,
    pub reason: String,
    pub timestamp: u64,
}

/// Accepts ballots during the open phase and keeps them in acceptance
/// order for the tally.
pub struct VotingCenter {
    params: ElectionParameters,
    ballots: Vec<Ciphertext>,
    rejected: Vec<RejectedCast>,
}

impl VotingCenter {
    pub fn new(params: ElectionParameters) -> Self {
        VotingCenter {
            params,
            ballots: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Admit a submission. On success all four effects happen together:
    /// the token is consumed, a VOTE event is appended, and the ballot
    /// joins the input batch; the returned value is the audit index.
    ///
    /// Token consumption is ordered after proof verification, so a
    /// submission with a bad proof does not burn the voter's token.
    pub fn cast(
        &mut self,
        registry: &mut TokenRegistry,
        audit: &mut AuditLog,
        submission: &CastSubmission,
    ) -> Result<u64, Error> {
        if let Err(error) = self.admit(registry, submission) {
            debug!("cast by {} rejected: {}", submission.voter_id, error);
            self.rejected.push(RejectedCast {
                voter_id: submission.voter_id.clone(),
                reason: error.to_string(),
                timestamp: timestamp_millis(),
            });
            return Err(error);
        }

        registry.consume(&submission.voter_id)?;

        let index = audit.append(
            EventKind::Vote,
            json!({
                "voter": voter_id_digest(&submission.voter_id),
                "ciphertext": serde_json::to_value(&submission.ciphertext)?,
                "proof": serde_json::to_value(&submission.proof)?,
            }),
        )?;

        self.ballots.push(submission.ciphertext.clone());
        Ok(index)
    }

    fn admit(
        &self,
        registry: &TokenRegistry,
        submission: &CastSubmission,
    ) -> Result<(), Error> {
        registry.authenticate(&submission.voter_id, &submission.token)?;
        nizk::verify(&self.params, &submission.ciphertext, &submission.proof)
    }

    /// Accepted ballots in acceptance order.
    pub fn ballots(&self) -> &[Ciphertext] {
        &self.ballots
    }

    pub fn rejected(&self) -> &[RejectedCast] {
        &self.rejected
    }

    pub fn accepted_count(&self) -> usize {
        self.ballots.len()
    }
}

/// Hex SHA-256 of a voter id; audit payloads never carry raw identities.
pub fn voter_id_digest(voter_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(voter_id.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::keygen;

    struct Fixture {
        params: ElectionParameters,
        registry: TokenRegistry,
        audit: AuditLog,
        center: VotingCenter,
    }

    fn fixture() -> Fixture {
        let (params, _) = keygen(32).unwrap();
        Fixture {
            center: VotingCenter::new(params.clone()),
            registry: TokenRegistry::new(),
            audit: AuditLog::new(),
            params,
        }
    }

    #[test]
    fn valid_submission_is_accepted() {
        let mut fx = fixture();
        let token = fx.registry.issue("alice").unwrap();
        let submission = CastSubmission::seal(&fx.params, true, &token).unwrap();

        let index = fx
            .center
            .cast(&mut fx.registry, &mut fx.audit, &submission)
            .unwrap();

        assert_eq!(index, 0);
        assert_eq!(fx.center.accepted_count(), 1);
        assert_eq!(fx.registry.used_count(), 1);
        assert_eq!(fx.audit.events()[0].kind, EventKind::Vote);
    }

    #[test]
    fn vote_payload_redacts_the_voter_id() {
        let mut fx = fixture();
        let token = fx.registry.issue("alice").unwrap();
        let submission = CastSubmission::seal(&fx.params, false, &token).unwrap();
        fx.center
            .cast(&mut fx.registry, &mut fx.audit, &submission)
            .unwrap();

        let payload = &fx.audit.events()[0].payload;
        assert_eq!(payload["voter"], voter_id_digest("alice"));
        assert!(payload.to_string().find("alice").is_none());
    }

    #[test]
    fn bad_proof_leaves_token_unconsumed() {
        let mut fx = fixture();
        let token = fx.registry.issue("alice").unwrap();
        let mut submission = CastSubmission::seal(&fx.params, true, &token).unwrap();
        submission.proof.r0 = (&submission.proof.r0 + 1u32) % &fx.params.q;

        let result = fx
            .center
            .cast(&mut fx.registry, &mut fx.audit, &submission);
        assert!(matches!(result, Err(Error::InvalidProof)));

        // nothing happened: no ballot, no audit event, token still live
        assert_eq!(fx.center.accepted_count(), 0);
        assert!(fx.audit.is_empty());
        assert_eq!(fx.registry.used_count(), 0);
        assert_eq!(fx.center.rejected().len(), 1);

        // the voter can retry with an honest ballot
        let retry = CastSubmission::seal(&fx.params, true, &token).unwrap();
        fx.center
            .cast(&mut fx.registry, &mut fx.audit, &retry)
            .unwrap();
    }

    #[test]
    fn pack_round_trips() {
        let mut fx = fixture();
        let token = fx.registry.issue("alice").unwrap();
        let submission = CastSubmission::seal(&fx.params, true, &token).unwrap();

        let unpacked = CastSubmission::unpack(&submission.pack()).unwrap();
        assert_eq!(unpacked.voter_id, submission.voter_id);
        assert_eq!(unpacked.ciphertext, submission.ciphertext);
        assert_eq!(unpacked.proof, submission.proof);
    }
}
