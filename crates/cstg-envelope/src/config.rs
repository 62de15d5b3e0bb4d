//! Client configuration supplied by the host application.

use cstg_crypto::{base64_decode, decode_public_key};
use p256::PublicKey;
use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// Length of the version tag in front of the base64 server key
/// (`UID2-X-L-` / `EUID-X-L-`).
pub const SERVER_PUBLIC_KEY_PREFIX_LENGTH: usize = 9;

/// Immutable settings for building token-generation envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct ClientConfig {
    server_public_key: String,
    subscription_id: String,
    app_name: String,
}

impl ClientConfig {
    /// Build a config, validating the same fields as [`ClientConfig::from_json`].
    pub fn new(
        server_public_key: impl Into<String>,
        subscription_id: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Result<Self, EnvelopeError> {
        let config = Self {
            server_public_key: server_public_key.into(),
            subscription_id: subscription_id.into(),
            app_name: app_name.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate and parse a JSON object as client configuration.
    ///
    /// `server_public_key` and `subscription_id` are required and non-empty.
    /// `app_name` defaults to the empty string.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, EnvelopeError> {
        let obj = json
            .as_object()
            .ok_or_else(|| EnvelopeError::InvalidConfig("expected object".into()))?;

        let server_public_key = get_non_empty_string(obj, "server_public_key")?;
        let subscription_id = get_non_empty_string(obj, "subscription_id")?;
        let app_name = obj
            .get("app_name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        Self::new(server_public_key, subscription_id, app_name)
    }

    fn validate(&self) -> Result<(), EnvelopeError> {
        if self.subscription_id.is_empty() {
            return Err(EnvelopeError::InvalidConfig(
                "missing subscription_id".into(),
            ));
        }
        match self.server_public_key.get(SERVER_PUBLIC_KEY_PREFIX_LENGTH..) {
            Some(rest) if !rest.is_empty() => Ok(()),
            _ => Err(EnvelopeError::InvalidConfig(format!(
                "server_public_key must be longer than its {}-character prefix",
                SERVER_PUBLIC_KEY_PREFIX_LENGTH
            ))),
        }
    }

    pub fn server_public_key(&self) -> &str {
        &self.server_public_key
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Strip the version prefix, base64-decode, and parse the server's
    /// SubjectPublicKeyInfo, rejecting keys that are not on secp256r1.
    pub fn decode_server_public_key(&self) -> Result<PublicKey, EnvelopeError> {
        let encoded = self
            .server_public_key
            .get(SERVER_PUBLIC_KEY_PREFIX_LENGTH..)
            .ok_or_else(|| EnvelopeError::InvalidConfig("server_public_key too short".into()))?;
        let der = base64_decode(encoded).map_err(|e| EnvelopeError::Base64Decode {
            field: "server_public_key",
            reason: e.to_string(),
        })?;
        Ok(decode_public_key(&der)?)
    }
}

impl TryFrom<serde_json::Value> for ClientConfig {
    type Error = EnvelopeError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

fn get_non_empty_string(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &'static str,
) -> Result<String, EnvelopeError> {
    match obj.get(field).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(EnvelopeError::InvalidConfig(format!("missing {}", field))),
    }
}
