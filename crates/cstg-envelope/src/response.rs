//! Response envelope: base64 of `[IV:12B][ciphertext+tag]`, empty AAD.
//!
//! Unlike requests there is no JSON wrapper and no timestamp binding.
//! Refresh responses additionally prefix the plaintext with an 8-byte
//! timestamp and an 8-byte nonce echoed from the request.

use cstg_crypto::{
    aes_gcm_open, aes_gcm_seal, base64_decode, base64_encode, generate_iv, SharedSecret,
    AES_GCM_IV_LENGTH,
};

use crate::error::EnvelopeError;

/// Bytes of timestamp + nonce at the start of a refresh response plaintext.
pub const RESPONSE_NONCE_PREFIX_LENGTH: usize = 8 + 8;

/// Decode the base64 transport string and decrypt it.
pub fn open_response(response: &str, shared_secret: &SharedSecret) -> Result<Vec<u8>, EnvelopeError> {
    let bytes = decode_response(response)?;
    open_response_bytes(&bytes, shared_secret)
}

/// Decrypt raw response bytes `[IV:12B][ciphertext+tag]`.
pub fn open_response_bytes(
    bytes: &[u8],
    shared_secret: &SharedSecret,
) -> Result<Vec<u8>, EnvelopeError> {
    if bytes.len() < AES_GCM_IV_LENGTH {
        return Err(EnvelopeError::MalformedResponse {
            len: bytes.len(),
            min: AES_GCM_IV_LENGTH,
        });
    }

    let (iv, ciphertext) = bytes.split_at(AES_GCM_IV_LENGTH);
    let plaintext = aes_gcm_open(shared_secret.as_bytes(), iv, ciphertext, &[]).map_err(|e| {
        tracing::warn!("response envelope failed authentication");
        EnvelopeError::from(e)
    })?;

    tracing::debug!(plaintext_len = plaintext.len(), "opened response envelope");
    Ok(plaintext)
}

/// Decrypt a refresh response and strip its timestamp/nonce prefix.
pub fn open_response_with_nonce(
    response: &str,
    key: &SharedSecret,
) -> Result<Vec<u8>, EnvelopeError> {
    let mut plaintext = open_response(response, key)?;
    if plaintext.len() < RESPONSE_NONCE_PREFIX_LENGTH {
        return Err(EnvelopeError::MalformedResponse {
            len: plaintext.len(),
            min: RESPONSE_NONCE_PREFIX_LENGTH,
        });
    }
    plaintext.drain(..RESPONSE_NONCE_PREFIX_LENGTH);
    Ok(plaintext)
}

/// Parse a base64 response key (e.g. `refresh_response_key`).
pub fn decode_response_key(key: &str) -> Result<SharedSecret, EnvelopeError> {
    let bytes = base64_decode(key).map_err(|e| EnvelopeError::Base64Decode {
        field: "response key",
        reason: e.to_string(),
    })?;
    Ok(SharedSecret::from_bytes(&bytes)?)
}

/// Server side: encrypt a response body under a fresh IV.
///
/// Returns the base64 transport string.
pub fn seal_response(plaintext: &[u8], shared_secret: &SharedSecret) -> Result<String, EnvelopeError> {
    let iv = generate_iv()?;
    let ciphertext = aes_gcm_seal(shared_secret.as_bytes(), &iv, plaintext, &[])?;

    let mut bytes = Vec::with_capacity(AES_GCM_IV_LENGTH + ciphertext.len());
    bytes.extend_from_slice(&iv);
    bytes.extend_from_slice(&ciphertext);
    Ok(base64_encode(&bytes))
}

fn decode_response(response: &str) -> Result<Vec<u8>, EnvelopeError> {
    base64_decode(response.trim()).map_err(|e| EnvelopeError::Base64Decode {
        field: "response",
        reason: e.to_string(),
    })
}
