use cstg_crypto::CryptoError;
use thiserror::Error;

use crate::client::TransportError;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Malformed response: {len} bytes, need at least {min}")]
    MalformedResponse { len: usize, min: usize },

    #[error("Invalid {field} encoding: {reason}")]
    Base64Decode { field: &'static str, reason: String },

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request envelope: {0}")]
    InvalidRequest(String),

    #[error("Token endpoint returned HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Coarse classification of an [`EnvelopeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or non-secp256r1 public key. Reject the input.
    KeyDecoding,
    /// Bad key length or cipher unavailable. A configuration bug.
    CipherInit,
    /// GCM tag mismatch. Do not retry with the same key.
    AuthenticationFailure,
    /// Response too short to hold an IV (or nonce prefix).
    MalformedResponse,
    Configuration,
    Transport,
    Encoding,
}

impl EnvelopeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnvelopeError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            EnvelopeError::InvalidConfig(_) => ErrorKind::Configuration,
            EnvelopeError::UnexpectedStatus(_) | EnvelopeError::Transport(_) => {
                ErrorKind::Transport
            }
            EnvelopeError::Base64Decode { .. }
            | EnvelopeError::InvalidRequest(_)
            | EnvelopeError::Json(_) => ErrorKind::Encoding,
            EnvelopeError::Crypto(e) => match e {
                CryptoError::KeyDecoding(_) => ErrorKind::KeyDecoding,
                CryptoError::AuthenticationFailed => ErrorKind::AuthenticationFailure,
                CryptoError::InvalidKeyLength { .. }
                | CryptoError::InvalidIvLength { .. }
                | CryptoError::CipherInit(_)
                | CryptoError::EncryptionFailed(_)
                | CryptoError::KeyEncoding(_)
                | CryptoError::RngFailed(_) => ErrorKind::CipherInit,
            },
        }
    }
}
