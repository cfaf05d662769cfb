//! Error types shared by every component of the provider.

use crate::key::Ski;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error(transparent)]
    InvalidSignatureEncoding(#[from] SignatureEncodingError),
    #[error("key store is read-only")]
    ReadOnlyStoreViolation,
    #[error("key not found for ski [{0}]")]
    KeyNotFound(Ski),
    #[error("unsupported key operation: {0}")]
    UnsupportedKeyOperation(&'static str),
    #[error("curve not recognized [{0}]")]
    CurveNotRecognized(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),
    #[error("options do not apply to this operation: {0}")]
    InvalidOptions(&'static str),
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("verification failed")]
    VerificationFailed,
    #[error("schnorr proof verification error: {0:?}")]
    ZkpError(lox_zkp::ProofError),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("cipher error: {0}")]
    Cipher(String),
    #[error("hsm session unavailable after {attempts} attempts: {reason}")]
    HsmSession { attempts: u32, reason: String },
    #[error("hsm operation failed: {0}")]
    Hsm(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Reasons an encoded ECDSA signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureEncodingError {
    #[error("failed unmarshalling signature [{0}]")]
    Malformed(&'static str),
    #[error("invalid signature, R must be larger than 0")]
    NonPositiveR,
    #[error("invalid signature, S must be larger than 0")]
    NonPositiveS,
    #[error("invalid signature, S must be smaller than the curve order")]
    SOutOfRange,
}

/// Violations of the credential protocol's staging and disclosure rules.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("nonce mismatch")]
    NonceMismatch,
    #[error("missing attribute value")]
    MissingAttributeValue(usize),
    #[error("attribute count mismatch: expected {expected}, got {actual}")]
    AttributeCountMismatch { expected: usize, actual: usize },
    #[error("revocation handle disclosed")]
    HandleDisclosed,
    #[error("handle revoked or epoch stale")]
    HandleRevokedOrEpochStale,
    #[error("revocation handle index {0} is out of range")]
    RhIndexOutOfRange(usize),
    #[error("disclosed value differs from credential attribute {0}")]
    DisclosedValueMismatch(usize),
    #[error("invalid attribute schema: {0}")]
    InvalidSchema(String),
}

impl From<lox_zkp::ProofError> for Error {
    fn from(value: lox_zkp::ProofError) -> Self {
        Error::ZkpError(value)
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(value: rmp_serde::encode::Error) -> Self {
        Error::Encoding(value.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(value: rmp_serde::decode::Error) -> Self {
        Error::Encoding(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Config(value.to_string())
    }
}
