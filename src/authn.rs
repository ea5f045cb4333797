//! Single-use voter tokens.
//!
//! The Authority issues each registered voter one HMAC-bound token; casting
//! a ballot authenticates and consumes it, which is what prevents double
//! voting. The registry stores only token digests, so a registry dump
//! cannot be replayed as tokens.

use crate::encoding::Canonical;
use crate::serde_hex::{DigestHex, Hex};
use crate::util::timestamp_millis;
use crate::Error;

use hmac::{Hmac, Mac, NewMac};
use indexmap::IndexMap;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// A voter's single-use credential. Handed to the voter at registration
/// and presented back once, with the ballot.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VoterToken {
    pub voter_id: String,
    #[serde(with = "DigestHex")]
    pub token: [u8; 32],
    pub issued_at: u64,
}

struct TokenRecord {
    digest: [u8; 32],
    issued_at: u64,
    used_at: Option<u64>,
}

/// Registry of issued tokens, keyed by voter id in registration order.
/// Owned by the Authority; the issuing secret never leaves it.
pub struct TokenRegistry {
    secret: [u8; 32],
    records: IndexMap<String, TokenRecord>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);

        TokenRegistry {
            secret,
            records: IndexMap::new(),
        }
    }

    /// Issue a fresh token for `voter_id`. Each voter holds exactly one
    /// token for the lifetime of the election.
    pub fn issue(&mut self, voter_id: &str) -> Result<VoterToken, Error> {
        if self.records.contains_key(voter_id) {
            return Err(Error::AlreadyRegistered(voter_id.to_string()));
        }

        let issued_at = timestamp_millis();
        let nonce = Uuid::new_v4();

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("veilvote: HMAC accepts any key length");
        mac.update(
            &Canonical::new()
                .text(voter_id)
                .u64(issued_at)
                .bytes(nonce.as_bytes())
                .finish(),
        );

        let mut token = [0u8; 32];
        token.copy_from_slice(&mac.finalize().into_bytes());

        self.records.insert(
            voter_id.to_string(),
            TokenRecord {
                digest: token_digest(&token),
                issued_at,
                used_at: None,
            },
        );

        Ok(VoterToken {
            voter_id: voter_id.to_string(),
            token,
            issued_at,
        })
    }

    /// Check a presented token without consuming it: the voter must be
    /// registered, the token must match the issued one (compared in
    /// constant time on digests) and must not have been used.
    pub fn authenticate(&self, voter_id: &str, token: &[u8; 32]) -> Result<(), Error> {
        let record = self
            .records
            .get(voter_id)
            .ok_or_else(|| Error::UnknownVoter(voter_id.to_string()))?;

        use subtle::ConstantTimeEq;
        let matches: bool = token_digest(token).ct_eq(&record.digest).into();
        if !matches {
            return Err(Error::BadToken);
        }

        if record.used_at.is_some() {
            return Err(Error::TokenAlreadyUsed);
        }

        Ok(())
    }

    /// Mark the voter's token as used. Idempotence is deliberately
    /// rejected: a second consumption is a double-vote attempt.
    pub fn consume(&mut self, voter_id: &str) -> Result<(), Error> {
        let record = self
            .records
            .get_mut(voter_id)
            .ok_or_else(|| Error::UnknownVoter(voter_id.to_string()))?;

        if record.used_at.is_some() {
            return Err(Error::TokenAlreadyUsed);
        }

        record.used_at = Some(timestamp_millis());
        Ok(())
    }

    /// Authenticate and consume in one step.
    pub fn authenticate_and_consume(
        &mut self,
        voter_id: &str,
        token: &[u8; 32],
    ) -> Result<(), Error> {
        self.authenticate(voter_id, token)?;
        self.consume(voter_id)
    }

    pub fn is_registered(&self, voter_id: &str) -> bool {
        self.records.contains_key(voter_id)
    }

    /// Number of registered voters.
    pub fn voter_count(&self) -> usize {
        self.records.len()
    }

    /// Number of voters whose token has been consumed.
    pub fn used_count(&self) -> usize {
        self.records
            .values()
            .filter(|record| record.used_at.is_some())
            .count()
    }

    pub fn remaining_count(&self) -> usize {
        self.voter_count() - self.used_count()
    }

    /// Issuance timestamp for a registered voter.
    pub fn issued_at(&self, voter_id: &str) -> Option<u64> {
        self.records.get(voter_id).map(|record| record.issued_at)
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        TokenRegistry::new()
    }
}

fn token_digest(token: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token);
    hasher.finalize().into()
}
