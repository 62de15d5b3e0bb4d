//! Client-side token generation flow.
//!
//! Every call generates a new ephemeral key pair, so no (key, IV) pair is
//! ever reused. The shared secret lives in a [`PendingResponse`] that is
//! consumed by the one response it can open.

use async_trait::async_trait;
use cstg_crypto::{KeyPair, SharedSecret};
use p256::PublicKey;

use crate::config::ClientConfig;
use crate::error::EnvelopeError;
use crate::request::{build_request_envelope, RequestEnvelope};
use crate::response::open_response;

// ============================================================================
// TokenTransport: user-provided HTTP layer
// ============================================================================

/// User-implemented transport that POSTs the request JSON to the
/// token-generation endpoint and returns the raw response.
///
/// Timeouts and retries belong to the implementation.
#[async_trait]
pub trait TokenTransport: Send + Sync {
    async fn post(&self, body: String) -> Result<TransportResponse, TransportError>;
}

/// Raw HTTP response handed back by a [`TokenTransport`].
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Base64 response envelope on success.
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure (connection, timeout, ...).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Builds request envelopes for one server key and opens their responses.
#[derive(Debug, Clone)]
pub struct TokenGenerateClient {
    config: ClientConfig,
    server_key: PublicKey,
}

/// The shared secret for one outstanding request.
#[derive(Debug)]
pub struct PendingResponse {
    shared_secret: SharedSecret,
}

impl PendingResponse {
    /// Decrypt the base64 response body. Consumes the secret.
    pub fn open(self, response: &str) -> Result<Vec<u8>, EnvelopeError> {
        open_response(response, &self.shared_secret)
    }

    pub fn shared_secret(&self) -> &SharedSecret {
        &self.shared_secret
    }
}

impl TokenGenerateClient {
    /// Decode and validate the configured server key up front.
    pub fn new(config: ClientConfig) -> Result<Self, EnvelopeError> {
        let server_key = config.decode_server_public_key()?;
        Ok(Self { config, server_key })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Encrypt `plaintext` under a fresh ephemeral key.
    ///
    /// The key pair is dropped before returning; only the shared secret
    /// survives, inside the returned [`PendingResponse`].
    pub fn prepare(
        &self,
        plaintext: &[u8],
    ) -> Result<(RequestEnvelope, PendingResponse), EnvelopeError> {
        let key_pair = KeyPair::generate()?;
        let shared_secret = key_pair.derive_shared_secret(&self.server_key);
        let envelope = build_request_envelope(
            plaintext,
            self.config.subscription_id(),
            self.config.app_name(),
            &key_pair,
            &shared_secret,
        )?;
        Ok((envelope, PendingResponse { shared_secret }))
    }

    /// Full round trip: build, POST through `transport`, decrypt.
    ///
    /// Non-2xx responses are returned as [`EnvelopeError::UnexpectedStatus`]
    /// without touching the decrypt path.
    pub async fn generate<T>(&self, transport: &T, plaintext: &[u8]) -> Result<Vec<u8>, EnvelopeError>
    where
        T: TokenTransport + ?Sized,
    {
        let (envelope, pending) = self.prepare(plaintext)?;
        let response = transport.post(envelope.to_json_string()?).await?;

        if !response.is_success() {
            tracing::warn!(status = response.status, "token generation request rejected");
            return Err(EnvelopeError::UnexpectedStatus(response.status));
        }

        pending.open(&response.body)
    }
}
