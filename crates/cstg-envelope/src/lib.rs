//! Encrypted envelopes for client-side token generation.
//!
//! Request direction: the client generates an ephemeral secp256r1 key pair,
//! runs ECDH against the server's public key, and AES-256-GCM encrypts the
//! JSON request with `[timestamp]` as AAD. The result travels as a JSON
//! object with base64 fields.
//!
//! Response direction: the server replies with base64 of
//! `[IV:12B][ciphertext+tag]`, encrypted under the same secret with empty AAD.
//!
//! HTTP delivery is handled by the caller through [`TokenTransport`].
//! Parsing the decrypted JSON bodies is left to the caller as well.

mod client;
mod config;
mod error;
mod request;
mod response;

pub use client::{
    PendingResponse, TokenGenerateClient, TokenTransport, TransportError, TransportResponse,
};
pub use config::{ClientConfig, SERVER_PUBLIC_KEY_PREFIX_LENGTH};
pub use error::{EnvelopeError, ErrorKind};
pub use request::{build_request_envelope, request_aad, seal_request, RequestEnvelope};
pub use response::{
    decode_response_key, open_response, open_response_bytes, open_response_with_nonce,
    seal_response, RESPONSE_NONCE_PREFIX_LENGTH,
};

pub use cstg_crypto::{KeyPair, SharedSecret};
