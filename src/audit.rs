//! Append-only audit chain.
//!
//! Every electoral event is recorded as a linked-hash entry: each event
//! hashes its index, kind, payload digest, predecessor hash and timestamp,
//! and names the predecessor's hash. Any later modification of a stored
//! event breaks the chain at that index. Payloads carry only public
//! material (ciphertexts, proofs, digests), never plaintexts, randomizers
//! or keys.

use crate::encoding::Canonical;
use crate::serde_hex::{DigestHex, Hex};
use crate::util::timestamp_millis;
use crate::Error;

use log::debug;
use num_enum::TryFromPrimitive;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain tag hashed into the genesis link.
const GENESIS_TAG: &str = "veilvote-audit-genesis-v1";

#[derive(Serialize, Deserialize, TryFromPrimitive, Copy, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum EventKind {
    Setup = 1,
    Register = 2,
    Vote = 3,
    Mix = 4,
    Tally = 5,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Setup => "SETUP",
            EventKind::Register => "REGISTER",
            EventKind::Vote => "VOTE",
            EventKind::Mix => "MIX",
            EventKind::Tally => "TALLY",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One link in the audit chain.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuditEvent {
    pub index: u64,
    pub kind: EventKind,
    pub timestamp: u64,
    pub payload: serde_json::Value,
    #[serde(with = "DigestHex")]
    pub payload_digest: [u8; 32],
    #[serde(with = "DigestHex")]
    pub prev_hash: [u8; 32],
    #[serde(with = "DigestHex")]
    pub hash: [u8; 32],
}

/// Append-only event log with linked-hash integrity.
pub struct AuditLog {
    genesis: [u8; 32],
    pub(crate) events: Vec<AuditEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        AuditLog {
            genesis: Canonical::new().text(GENESIS_TAG).digest(),
            events: Vec::new(),
        }
    }

    pub fn genesis(&self) -> [u8; 32] {
        self.genesis
    }

    /// Append an event and return its index.
    pub fn append(&mut self, kind: EventKind, payload: serde_json::Value) -> Result<u64, Error> {
        let index = self.events.len() as u64;
        let timestamp = timestamp_millis();
        let payload_digest = payload_digest(&payload)?;
        let prev_hash = match self.events.last() {
            Some(event) => event.hash,
            None => self.genesis,
        };
        let hash = event_hash(index, kind, &payload_digest, &prev_hash, timestamp);

        debug!("audit event {} appended: {}", index, kind);
        self.events.push(AuditEvent {
            index,
            kind,
            timestamp,
            payload,
            payload_digest,
            prev_hash,
            hash,
        });

        Ok(index)
    }

    /// Walk the chain from genesis, recomputing every digest and link.
    /// The first mismatch is reported with its index.
    pub fn verify(&self) -> Result<(), Error> {
        let mut expected_prev = self.genesis;

        for (position, event) in self.events.iter().enumerate() {
            let tampered = Err(Error::AuditTampered(position as u64));

            if event.index != position as u64 || event.prev_hash != expected_prev {
                return tampered;
            }
            if payload_digest(&event.payload)? != event.payload_digest {
                return tampered;
            }

            let recomputed = event_hash(
                event.index,
                event.kind,
                &event.payload_digest,
                &event.prev_hash,
                event.timestamp,
            );
            if recomputed != event.hash {
                return tampered;
            }

            expected_prev = event.hash;
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn events_by_kind(&self, kind: EventKind) -> Vec<&AuditEvent> {
        self.events
            .iter()
            .filter(|event| event.kind == kind)
            .collect()
    }

    /// On-disk form: framed records with hex digests, payloads stored
    /// alongside and referenced by digest.
    pub fn export(&self) -> serde_json::Value {
        let records: Vec<serde_json::Value> = self
            .events
            .iter()
            .map(|event| {
                json!({
                    "index": event.index,
                    "kind": event.kind.name(),
                    "timestamp": event.timestamp,
                    "payload_digest_hex": hex::encode(event.payload_digest),
                    "prev_hash_hex": hex::encode(event.prev_hash),
                    "hash_hex": hex::encode(event.hash),
                })
            })
            .collect();

        let payloads: serde_json::Map<String, serde_json::Value> = self
            .events
            .iter()
            .map(|event| {
                (
                    hex::encode(event.payload_digest),
                    event.payload.clone(),
                )
            })
            .collect();

        json!({
            "genesis_hash": hex::encode(self.genesis),
            "total_events": self.events.len(),
            "events": records,
            "payloads": payloads,
        })
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        AuditLog::new()
    }
}

/// Digest of the canonical JSON bytes of a payload. `serde_json` keeps
/// object keys sorted, so the byte form is deterministic.
fn payload_digest(payload: &serde_json::Value) -> Result<[u8; 32], Error> {
    let bytes = serde_json::to_vec(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().into())
}

fn event_hash(
    index: u64,
    kind: EventKind,
    payload_digest: &[u8; 32],
    prev_hash: &[u8; 32],
    timestamp: u64,
) -> [u8; 32] {
    Canonical::new()
        .u64(index)
        .byte(kind as u8)
        .bytes(payload_digest)
        .bytes(prev_hash)
        .u64(timestamp)
        .digest()
}
