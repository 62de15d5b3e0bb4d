use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key decoding failed: {0}")]
    KeyDecoding(String),

    #[error("Key encoding failed: {0}")]
    KeyEncoding(String),

    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid IV length: expected {expected} bytes, got {got}")]
    InvalidIvLength { expected: usize, got: usize },

    #[error("Cipher initialization failed: {0}")]
    CipherInit(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed: tag mismatch")]
    AuthenticationFailed,

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}
