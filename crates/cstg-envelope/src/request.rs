//! Request envelope: AES-256-GCM under the ECDH secret, bound to a timestamp.
//!
//! Transport JSON:
//! `{"payload", "iv", "public_key", "timestamp", "subscription_id", "app_name"}`
//! with binary fields in standard base64 and `timestamp` as a JSON number.
//!
//! AAD is the JSON text of `[timestamp]`. Subscription and app identifiers are
//! not bound into the AAD.

use cstg_crypto::{
    aes_gcm_open, aes_gcm_seal, base64_decode, base64_encode, decode_public_key, generate_iv,
    KeyPair, SharedSecret, AES_GCM_IV_LENGTH,
};
use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// An encrypted token-generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// Ciphertext || 16-byte tag.
    pub payload: Vec<u8>,
    pub iv: [u8; AES_GCM_IV_LENGTH],
    /// Client's ephemeral public key, X.509 SubjectPublicKeyInfo DER.
    pub public_key: Vec<u8>,
    /// Milliseconds since the Unix epoch (UTC). Also the AAD source.
    pub timestamp: i64,
    pub subscription_id: String,
    pub app_name: String,
}

/// Field order here is the order fields are written on the wire.
#[derive(Serialize, Deserialize)]
struct WireRequest {
    payload: String,
    iv: String,
    public_key: String,
    timestamp: i64,
    subscription_id: String,
    app_name: String,
}

/// Build the AAD for a request timestamp: UTF-8 of the JSON array `[timestamp]`.
pub fn request_aad(timestamp: i64) -> Vec<u8> {
    serde_json::json!([timestamp]).to_string().into_bytes()
}

/// Encrypt `plaintext` into a request envelope.
///
/// Reads the current UTC time and draws a fresh random IV. The caller must
/// pass a shared secret derived from a key pair generated for this request
/// only; `key_pair` supplies the public key sent alongside the payload.
pub fn build_request_envelope(
    plaintext: &[u8],
    subscription_id: &str,
    app_name: &str,
    key_pair: &KeyPair,
    shared_secret: &SharedSecret,
) -> Result<RequestEnvelope, EnvelopeError> {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let iv = generate_iv()?;
    seal_request(
        plaintext,
        subscription_id,
        app_name,
        key_pair.public_key_der()?,
        shared_secret,
        iv,
        timestamp,
    )
}

/// Encrypt with an explicit IV and timestamp.
///
/// Deterministic given its inputs. Reusing an IV with the same secret breaks
/// GCM; outside of fixed test vectors use [`build_request_envelope`].
pub fn seal_request(
    plaintext: &[u8],
    subscription_id: &str,
    app_name: &str,
    public_key: Vec<u8>,
    shared_secret: &SharedSecret,
    iv: [u8; AES_GCM_IV_LENGTH],
    timestamp: i64,
) -> Result<RequestEnvelope, EnvelopeError> {
    let aad = request_aad(timestamp);
    let payload = aes_gcm_seal(shared_secret.as_bytes(), &iv, plaintext, &aad)?;

    tracing::debug!(
        timestamp,
        subscription_id,
        payload_len = payload.len(),
        "built request envelope"
    );

    Ok(RequestEnvelope {
        payload,
        iv,
        public_key,
        timestamp,
        subscription_id: subscription_id.to_string(),
        app_name: app_name.to_string(),
    })
}

impl RequestEnvelope {
    /// Serialize to the transport JSON object.
    pub fn to_json(&self) -> Result<serde_json::Value, EnvelopeError> {
        Ok(serde_json::to_value(self.to_wire())?)
    }

    /// Serialize to the transport JSON text sent as the POST body.
    pub fn to_json_string(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(&self.to_wire())?)
    }

    fn to_wire(&self) -> WireRequest {
        WireRequest {
            payload: base64_encode(&self.payload),
            iv: base64_encode(&self.iv),
            public_key: base64_encode(&self.public_key),
            timestamp: self.timestamp,
            subscription_id: self.subscription_id.clone(),
            app_name: self.app_name.clone(),
        }
    }

    /// Parse a transport JSON object. Field order does not matter.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, EnvelopeError> {
        let wire: WireRequest = serde_json::from_value(json.clone())
            .map_err(|e| EnvelopeError::InvalidRequest(e.to_string()))?;
        Self::from_wire(wire)
    }

    /// Parse transport JSON text.
    pub fn from_json_str(s: &str) -> Result<Self, EnvelopeError> {
        let wire: WireRequest =
            serde_json::from_str(s).map_err(|e| EnvelopeError::InvalidRequest(e.to_string()))?;
        Self::from_wire(wire)
    }

    fn from_wire(wire: WireRequest) -> Result<Self, EnvelopeError> {
        let iv_bytes = decode_field("iv", &wire.iv)?;
        let iv: [u8; AES_GCM_IV_LENGTH] = iv_bytes.as_slice().try_into().map_err(|_| {
            EnvelopeError::InvalidRequest(format!(
                "iv must be {} bytes, got {}",
                AES_GCM_IV_LENGTH,
                iv_bytes.len()
            ))
        })?;

        Ok(Self {
            payload: decode_field("payload", &wire.payload)?,
            iv,
            public_key: decode_field("public_key", &wire.public_key)?,
            timestamp: wire.timestamp,
            subscription_id: wire.subscription_id,
            app_name: wire.app_name,
        })
    }

    /// Server side: derive the secret from `server_key` and the envelope's
    /// public key, then decrypt.
    ///
    /// Returns the plaintext together with the shared secret, which the server
    /// uses to seal its response.
    pub fn open(&self, server_key: &KeyPair) -> Result<(Vec<u8>, SharedSecret), EnvelopeError> {
        let client_key = decode_public_key(&self.public_key)?;
        let secret = server_key.derive_shared_secret(&client_key);
        let plaintext = self.open_with(&secret)?;
        Ok((plaintext, secret))
    }

    /// Decrypt with an already-derived secret, recomputing the AAD from `timestamp`.
    pub fn open_with(&self, shared_secret: &SharedSecret) -> Result<Vec<u8>, EnvelopeError> {
        let aad = request_aad(self.timestamp);
        aes_gcm_open(shared_secret.as_bytes(), &self.iv, &self.payload, &aad).map_err(|e| {
            tracing::warn!(timestamp = self.timestamp, "request envelope failed authentication");
            e.into()
        })
    }
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, EnvelopeError> {
    base64_decode(value).map_err(|e| EnvelopeError::Base64Decode {
        field,
        reason: e.to_string(),
    })
}
