//! Cryptographic primitives for client-side token generation.
//!
//! This crate provides pure-Rust implementations of:
//! - Ephemeral secp256r1 key pairs and raw ECDH key agreement
//! - X.509 SubjectPublicKeyInfo encoding/decoding with explicit curve checks
//! - AES-256-GCM seal/open with caller-supplied IV and AAD
//! - Standard (padded) base64
//!
//! Envelope framing and the transport JSON live in `cstg-envelope`.

pub mod aes_gcm;
pub mod base64;
pub mod error;
pub mod key_agreement;
pub mod types;

pub use aes_gcm::{aes_gcm_open, aes_gcm_seal, generate_iv};
pub use base64::{base64_decode, base64_encode};
pub use error::CryptoError;
pub use key_agreement::{decode_public_key, encode_public_key, KeyPair, SharedSecret};
pub use types::{AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH};
