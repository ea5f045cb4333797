//! Election orchestration.
//!
//! The Authority owns everything secret: the decryption exponent, the
//! token-issuing secret and the registry. The Election value owns the
//! state machine and the audit chain and drives the VotingCenter and
//! TallyingCenter through the phases. States only move forward:
//! setup -> open -> closed -> tallied.

use crate::audit::{AuditLog, EventKind};
use crate::authn::{TokenRegistry, VoterToken};
use crate::elgamal::{self, Ciphertext, ElectionParameters, PrivateExponent};
use crate::serde_hex::{DigestHex, EdPublicKeyHex, Hex};
use crate::tally::{TallyOutcome, TallyingCenter};
use crate::util::generate_keypair;
use crate::vote::{voter_id_digest, CastSubmission, RejectedCast, VotingCenter};
use crate::Error;

use ed25519_dalek::{ExpandedSecretKey, PublicKey, SecretKey, Signature};
use log::info;
use serde_json::json;
use uuid::Uuid;

/// Demonstration default; production deployments configure their own size.
pub const DEFAULT_MODULUS_BITS: u64 = 128;

#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum ElectionState {
    Setup,
    Open,
    Closed,
    Tallied,
}

impl std::fmt::Display for ElectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ElectionState::Setup => "setup",
            ElectionState::Open => "open",
            ElectionState::Closed => "closed",
            ElectionState::Tallied => "tallied",
        };
        write!(f, "{}", name)
    }
}

/// The public description of an election, published at setup.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ElectionManifest {
    pub election_id: Uuid,
    pub bits: u64,
    #[serde(flatten)]
    pub params: ElectionParameters,
    pub voter_count_cap: u64,
    #[serde(with = "DigestHex")]
    pub genesis_hash: [u8; 32],
    #[serde(with = "EdPublicKeyHex")]
    pub authority_public: PublicKey,
}

/// A manifest signed by the Authority's ed25519 key. Observers pin this
/// key out of band and verify the manifest before trusting anything else.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SignedManifest {
    pub manifest: ElectionManifest,
    pub signature: Signature,
}

impl SignedManifest {
    fn sign(secret: &SecretKey, manifest: ElectionManifest) -> Self {
        let serialized =
            serde_cbor::to_vec(&manifest).expect("veilvote: unable to serialize manifest");

        let expanded: ExpandedSecretKey = secret.into();
        let signature = expanded.sign(&serialized, &manifest.authority_public);

        SignedManifest {
            manifest,
            signature,
        }
    }

    pub fn verify_signature(&self) -> Result<(), Error> {
        let serialized =
            serde_cbor::to_vec(&self.manifest).expect("veilvote: unable to serialize manifest");

        Ok(self
            .manifest
            .authority_public
            .verify_strict(&serialized, &self.signature)?)
    }
}

/// Election Authority: holds the group parameters, the decryption
/// exponent, the signing key and the token registry.
pub struct Authority {
    params: ElectionParameters,
    key: PrivateExponent,
    signing_secret: SecretKey,
    signing_public: PublicKey,
    registry: TokenRegistry,
}

impl Authority {
    pub fn new(bits: u64) -> Result<Self, Error> {
        let (params, key) = elgamal::keygen(bits)?;
        let (signing_secret, signing_public) = generate_keypair();

        Ok(Authority {
            params,
            key,
            signing_secret,
            signing_public,
            registry: TokenRegistry::new(),
        })
    }

    pub fn params(&self) -> &ElectionParameters {
        &self.params
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_public
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut TokenRegistry {
        &mut self.registry
    }

    /// Register a voter and issue their single-use token.
    pub fn register(&mut self, voter_id: &str) -> Result<VoterToken, Error> {
        self.registry.issue(voter_id)
    }

    /// Decrypt an aggregate ciphertext, bounded by the number of cast
    /// ballots. Only ever called on the homomorphic sum.
    pub fn decrypt_sum(&self, c_star: &Ciphertext, max_sum: u64) -> Result<u64, Error> {
        self.key.decrypt(&self.params, c_star, max_sum)
    }

    /// Build and sign the public manifest for this election.
    pub fn signed_manifest(
        &self,
        election_id: Uuid,
        bits: u64,
        voter_count_cap: u64,
        genesis_hash: [u8; 32],
    ) -> SignedManifest {
        let manifest = ElectionManifest {
            election_id,
            bits,
            params: self.params.clone(),
            voter_count_cap,
            genesis_hash,
            authority_public: self.signing_public,
        };

        SignedManifest::sign(&self.signing_secret, manifest)
    }
}

/// Participation counters, derived on demand.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ElectionStatistics {
    pub state: ElectionState,
    pub registered_voters: usize,
    pub ballots_accepted: usize,
    pub casts_rejected: usize,
    pub tokens_remaining: usize,
}

/// A complete election instance: one question, one audit chain, one
/// outcome.
pub struct Election {
    state: ElectionState,
    halted: bool,
    authority: Authority,
    center: VotingCenter,
    audit: AuditLog,
    manifest: SignedManifest,
    voter_count_cap: u64,
}

impl Election {
    /// Set up an election at the demonstration modulus size.
    pub fn setup_default(voter_count_cap: u64) -> Result<Self, Error> {
        Election::setup(DEFAULT_MODULUS_BITS, voter_count_cap)
    }

    /// Generate parameters, sign the manifest and record the SETUP event.
    pub fn setup(bits: u64, voter_count_cap: u64) -> Result<Self, Error> {
        let mut audit = AuditLog::new();
        let authority = Authority::new(bits)?;

        let election_id = Uuid::new_v4();
        let manifest =
            authority.signed_manifest(election_id, bits, voter_count_cap, audit.genesis());
        manifest.verify_signature()?;

        audit.append(
            EventKind::Setup,
            serde_json::to_value(&manifest.manifest)?,
        )?;
        info!("election {} set up ({} bit modulus)", election_id, bits);

        let center = VotingCenter::new(authority.params().clone());
        Ok(Election {
            state: ElectionState::Setup,
            halted: false,
            authority,
            center,
            audit,
            manifest,
            voter_count_cap,
        })
    }

    pub fn state(&self) -> ElectionState {
        self.state
    }

    pub fn manifest(&self) -> &SignedManifest {
        &self.manifest
    }

    pub fn params(&self) -> &ElectionParameters {
        self.authority.params()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn rejected(&self) -> &[RejectedCast] {
        self.center.rejected()
    }

    fn guard(&self) -> Result<(), Error> {
        if self.halted {
            return Err(Error::Halted);
        }
        Ok(())
    }

    fn require_state(&self, expected: ElectionState) -> Result<(), Error> {
        if self.state != expected {
            return Err(Error::WrongState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Open the election for casting.
    pub fn open(&mut self) -> Result<(), Error> {
        self.guard()?;
        self.require_state(ElectionState::Setup)?;
        self.state = ElectionState::Open;
        info!("election open");
        Ok(())
    }

    /// Register a voter. Allowed while the election is being set up and
    /// while it is open, never after closing.
    pub fn register(&mut self, voter_id: &str) -> Result<VoterToken, Error> {
        self.guard()?;
        if self.state != ElectionState::Setup && self.state != ElectionState::Open {
            return Err(Error::WrongState {
                expected: ElectionState::Open,
                actual: self.state,
            });
        }
        if self.authority.registry().voter_count() as u64 >= self.voter_count_cap {
            return Err(Error::ParameterError(format!(
                "voter count cap {} reached",
                self.voter_count_cap
            )));
        }

        let token = self.authority.register(voter_id)?;
        self.audit.append(
            EventKind::Register,
            json!({
                "voter": voter_id_digest(voter_id),
                "issued_at": token.issued_at,
            }),
        )?;

        Ok(token)
    }

    /// Accept one ballot. Returns the audit index of the VOTE event.
    pub fn cast(&mut self, submission: &CastSubmission) -> Result<u64, Error> {
        self.guard()?;
        self.require_state(ElectionState::Open)?;

        let Election {
            authority,
            center,
            audit,
            ..
        } = self;
        center.cast(authority.registry_mut(), audit, submission)
    }

    /// Close the ballot box.
    pub fn close(&mut self) -> Result<(), Error> {
        self.guard()?;
        self.require_state(ElectionState::Open)?;
        self.state = ElectionState::Closed;
        info!(
            "election closed with {} accepted ballots",
            self.center.accepted_count()
        );
        Ok(())
    }

    /// Mix, aggregate and decrypt. A sum outside the ballot count is
    /// fatal: the instance refuses any further mutation.
    pub fn tally(&mut self) -> Result<TallyOutcome, Error> {
        self.guard()?;
        self.require_state(ElectionState::Closed)?;

        let tallying = TallyingCenter::new(self.authority.params().clone());
        match tallying.tally(&self.authority, self.center.ballots(), &mut self.audit) {
            Ok(outcome) => {
                self.state = ElectionState::Tallied;
                Ok(outcome)
            }
            Err(error) => {
                if let Error::TallyOutOfRange(_) = error {
                    self.halted = true;
                }
                Err(error)
            }
        }
    }

    /// Re-check the audit chain. A broken chain halts the instance.
    pub fn verify_audit(&mut self) -> Result<(), Error> {
        if let Err(error) = self.audit.verify() {
            self.halted = true;
            return Err(error);
        }
        Ok(())
    }

    pub fn statistics(&self) -> ElectionStatistics {
        ElectionStatistics {
            state: self.state,
            registered_voters: self.authority.registry().voter_count(),
            ballots_accepted: self.center.accepted_count(),
            casts_rejected: self.center.rejected().len(),
            tokens_remaining: self.authority.registry().remaining_count(),
        }
    }

    #[cfg(test)]
    pub(crate) fn audit_mut(&mut self) -> &mut AuditLog {
        &mut self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_signature_verifies() {
        let authority = Authority::new(32).unwrap();
        let signed =
            authority.signed_manifest(Uuid::new_v4(), 32, 8, [0u8; 32]);
        signed.verify_signature().unwrap();
    }

    #[test]
    fn altered_manifest_fails_verification() {
        let authority = Authority::new(32).unwrap();
        let mut signed =
            authority.signed_manifest(Uuid::new_v4(), 32, 8, [0u8; 32]);
        signed.manifest.voter_count_cap = 1_000_000;
        assert!(signed.verify_signature().is_err());
    }

    #[test]
    fn states_only_move_forward() {
        let mut election = Election::setup(32, 4).unwrap();
        assert_eq!(election.state(), ElectionState::Setup);

        // cannot close or tally before opening
        assert!(matches!(
            election.close(),
            Err(Error::WrongState { .. })
        ));
        assert!(matches!(
            election.tally(),
            Err(Error::WrongState { .. })
        ));

        election.open().unwrap();
        assert!(matches!(election.open(), Err(Error::WrongState { .. })));

        election.close().unwrap();
        assert_eq!(election.state(), ElectionState::Closed);
        assert!(matches!(election.open(), Err(Error::WrongState { .. })));
    }

    #[test]
    fn registration_allowed_in_setup_and_open_only() {
        let mut election = Election::setup(32, 4).unwrap();
        election.register("early").unwrap();

        election.open().unwrap();
        election.register("late").unwrap();

        election.close().unwrap();
        assert!(matches!(
            election.register("too-late"),
            Err(Error::WrongState { .. })
        ));
    }

    #[test]
    fn voter_cap_enforced() {
        let mut election = Election::setup(32, 2).unwrap();
        election.register("a").unwrap();
        election.register("b").unwrap();
        assert!(matches!(
            election.register("c"),
            Err(Error::ParameterError(_))
        ));
    }

    #[test]
    fn tampered_audit_halts_the_instance() {
        let mut election = Election::setup(32, 4).unwrap();
        election.register("a").unwrap();

        election.audit_mut().events[0].payload_digest[0] ^= 1;
        assert!(matches!(
            election.verify_audit(),
            Err(Error::AuditTampered(0))
        ));

        // every mutation is now refused
        assert!(matches!(election.open(), Err(Error::Halted)));
        assert!(matches!(election.register("b"), Err(Error::Halted)));
    }

    #[test]
    fn setup_records_the_manifest() {
        let election = Election::setup(32, 4).unwrap();
        let events = election.audit().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Setup);
        assert_eq!(events[0].payload["bits"], 32);
        // the manifest payload carries the group, never the exponent
        assert!(events[0].payload.get("p").is_some());
        assert!(events[0].payload.get("alpha").is_none());
    }
}
