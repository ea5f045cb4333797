use crate::ElectionState;

use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("veilvote: parameter generation failed: {0}")]
    ParameterError(String),

    #[error("veilvote: ballot proof failed to verify")]
    InvalidProof,

    #[error("veilvote: mix proof failed to verify")]
    MixProofInvalid,

    #[error("veilvote: unknown voter {0}")]
    UnknownVoter(String),

    #[error("veilvote: voter {0} is already registered")]
    AlreadyRegistered(String),

    #[error("veilvote: token does not match the issued token")]
    BadToken,

    #[error("veilvote: token has already been used")]
    TokenAlreadyUsed,

    #[error("veilvote: operation requires state {expected}, election is {actual}")]
    WrongState {
        expected: ElectionState,
        actual: ElectionState,
    },

    #[error("veilvote: decrypted tally exceeds the bound {0}")]
    TallyOutOfRange(u64),

    #[error("veilvote: audit chain tampered at event {0}")]
    AuditTampered(u64),

    #[error("veilvote: election halted after a fatal error")]
    Halted,

    #[error("veilvote: invalid digest - wrong length")]
    DigestBadLen,

    #[error("veilvote: signature error: {0}")]
    SignatureError(#[from] ed25519_dalek::SignatureError),

    #[error("veilvote: CBOR error deserializing submission: {0}")]
    CBORDeserialization(#[from] serde_cbor::Error),

    #[error("veilvote: JSON error serializing payload: {0}")]
    JSONSerialization(#[from] serde_json::Error),
}
