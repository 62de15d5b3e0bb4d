//! secp256r1 key pairs and ECDH key agreement.
//!
//! The shared secret is the raw ECDH x-coordinate, used as the AES-256 key
//! with no KDF in between. The token-generation server derives its key the
//! same way, so hashing here would break interoperability.

use p256::elliptic_curve::rand_core::{CryptoRngCore, OsRng};
use p256::pkcs8::{EncodePublicKey, ObjectIdentifier, SubjectPublicKeyInfoRef};
use p256::{PublicKey, SecretKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::types::AES_KEY_LENGTH;

/// id-ecPublicKey (RFC 5480 §2.1.1).
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
/// secp256r1 / prime256v1 named curve (RFC 5480 §2.1.1.1).
const SECP256R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");

/// Ephemeral secp256r1 key pair.
///
/// Generated fresh for every envelope and dropped once the shared secret has
/// been derived. The secret scalar is zeroized on drop.
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a key pair from the operating system's secure random source.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a key pair from the given random source.
    ///
    /// Draws 32 bytes at a time and retries until they form a valid scalar
    /// in `[1, n)`.
    pub fn generate_with(rng: &mut impl CryptoRngCore) -> Result<Self, CryptoError> {
        let mut candidate = [0u8; AES_KEY_LENGTH];
        loop {
            rng.try_fill_bytes(&mut candidate)
                .map_err(|e| CryptoError::RngFailed(e.to_string()))?;
            if let Ok(secret) = SecretKey::from_slice(&candidate) {
                candidate.zeroize();
                return Ok(Self::from_secret(secret));
            }
        }
    }

    /// Rebuild a key pair from a 32-byte big-endian scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| CryptoError::KeyDecoding(format!("invalid private key scalar: {}", e)))?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The public key as X.509 SubjectPublicKeyInfo DER (uncompressed point).
    pub fn public_key_der(&self) -> Result<Vec<u8>, CryptoError> {
        encode_public_key(&self.public)
    }

    /// ECDH with `peer`, returning the raw shared x-coordinate as AES key material.
    pub fn derive_shared_secret(&self, peer: &PublicKey) -> SharedSecret {
        let shared = p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        let mut key = [0u8; AES_KEY_LENGTH];
        key.copy_from_slice(shared.raw_secret_bytes().as_slice());
        SharedSecret(key)
    }
}

/// AES-256 key material derived from one ECDH exchange.
///
/// Bound to a single request/response round trip; zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; AES_KEY_LENGTH]);

impl SharedSecret {
    /// Wrap externally held key material (e.g. a base64 response key).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; AES_KEY_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: AES_KEY_LENGTH,
                    got: bytes.len(),
                })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SharedSecret {}

/// Encode a public key as X.509 SubjectPublicKeyInfo DER.
pub fn encode_public_key(key: &PublicKey) -> Result<Vec<u8>, CryptoError> {
    key.to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
}

/// Decode an X.509 SubjectPublicKeyInfo DER public key.
///
/// The algorithm must be id-ecPublicKey with the secp256r1 named curve, and
/// the point must lie on that curve. Keys for other curves are rejected even
/// if their encoding happens to be well-formed.
pub fn decode_public_key(der: &[u8]) -> Result<PublicKey, CryptoError> {
    let spki = SubjectPublicKeyInfoRef::try_from(der)
        .map_err(|e| CryptoError::KeyDecoding(format!("malformed SubjectPublicKeyInfo: {}", e)))?;

    spki.algorithm
        .assert_oids(EC_PUBLIC_KEY_OID, SECP256R1_OID)
        .map_err(|e| CryptoError::KeyDecoding(format!("not a secp256r1 key: {}", e)))?;

    let point = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| CryptoError::KeyDecoding("public key bit string is not octet-aligned".into()))?;

    PublicKey::from_sec1_bytes(point)
        .map_err(|_| CryptoError::KeyDecoding("point is not on secp256r1".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base64::base64_decode;
    use p256::elliptic_curve::rand_core::{self, CryptoRng, RngCore};

    const SERVER_SPKI: &str = "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEtXJdTSZAYHvoRDWiehMHoWF1BNPuqLs5w2ZHiAZ1IJc7O4/z0ojPTB0V+KYX/wxQK0hxx6kxCvHj335eI/ZQsQ==";
    const CLIENT_SCALAR: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";
    const CLIENT_SPKI: &str = "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEYP7UuiVanTHJYet0xjVtaMBJuJI7Yfps5mliLmDyn7Z5A/4QCLi8maQa6elWKLxk8vGyDC1+n1F3o8KU1EYimQ==";
    const SHARED: &str = "60094ab806cf65f9019d85abf78828a540fda6413df3a44291ac78821ca73f12";

    /// Replays a fixed byte string, cycling when exhausted.
    struct ReplayRng {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl RngCore for ReplayRng {
        fn next_u32(&mut self) -> u32 {
            rand_core::impls::next_u32_via_fill(self)
        }

        fn next_u64(&mut self) -> u64 {
            rand_core::impls::next_u64_via_fill(self)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for b in dest.iter_mut() {
                *b = self.bytes[self.pos % self.bytes.len()];
                self.pos += 1;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ReplayRng {}

    fn server_key() -> PublicKey {
        decode_public_key(&base64_decode(SERVER_SPKI).unwrap()).unwrap()
    }

    #[test]
    fn decodes_server_key() {
        let key = server_key();
        assert_eq!(encode_public_key(&key).unwrap(), base64_decode(SERVER_SPKI).unwrap());
    }

    #[test]
    fn public_key_der_is_91_byte_spki() {
        let pair = KeyPair::generate().unwrap();
        let der = pair.public_key_der().unwrap();
        assert_eq!(der.len(), 91);
        assert_eq!(decode_public_key(&der).unwrap(), *pair.public_key());
    }

    #[test]
    fn known_scalar_matches_independent_implementation() {
        let pair = KeyPair::from_secret_bytes(&hex::decode(CLIENT_SCALAR).unwrap()).unwrap();
        assert_eq!(pair.public_key_der().unwrap(), base64_decode(CLIENT_SPKI).unwrap());
        let secret = pair.derive_shared_secret(&server_key());
        assert_eq!(hex::encode(secret.as_bytes()), SHARED);
    }

    #[test]
    fn deterministic_rng_yields_that_scalar() {
        let mut rng = ReplayRng {
            bytes: hex::decode(CLIENT_SCALAR).unwrap(),
            pos: 0,
        };
        let pair = KeyPair::generate_with(&mut rng).unwrap();
        assert_eq!(pair.public_key_der().unwrap(), base64_decode(CLIENT_SPKI).unwrap());
    }

    #[test]
    fn zero_scalar_is_skipped() {
        let mut bytes = vec![0u8; 32];
        bytes.extend(hex::decode(CLIENT_SCALAR).unwrap());
        let mut rng = ReplayRng { bytes, pos: 0 };
        let pair = KeyPair::generate_with(&mut rng).unwrap();
        assert_eq!(pair.public_key_der().unwrap(), base64_decode(CLIENT_SPKI).unwrap());
    }

    #[test]
    fn both_sides_agree() {
        let client = KeyPair::generate().unwrap();
        let server = KeyPair::generate().unwrap();
        let a = client.derive_shared_secret(server.public_key());
        let b = server.derive_shared_secret(client.public_key());
        assert_eq!(a, b);
    }

    #[test]
    fn fresh_pairs_give_fresh_secrets() {
        let peer = server_key();
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();
        assert_ne!(a.public_key(), b.public_key());
        assert_ne!(a.derive_shared_secret(&peer), b.derive_shared_secret(&peer));
    }

    #[test]
    fn rejects_garbage() {
        let err = decode_public_key(b"not a key").unwrap_err();
        assert!(matches!(err, CryptoError::KeyDecoding(_)));
    }

    #[test]
    fn rejects_other_curves() {
        let p384 = "MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAEEd4kosJRx3dXPKxeoCXkZ/II5R2/+Y/FT2Zhy+Vlg7A3iC9KHKKX5gq828ODbYS8j6aWx3RA+S0PWDfpCgDnxShLRHdU1d7ojJhlM7aQGusxd2htCuj7MxhEFKvmwXE6";
        let secp256k1 = "MFYwEAYHKoZIzj0CAQYFK4EEAAoDQgAEL4veTRoHIJNVtKclClxRKOiLhL3cYZq3y6jVabJA7+TYrCImNuXj1tTbqd2mycQm94gnG6sNaEDcqH06pqxi1g==";
        for spki in [p384, secp256k1] {
            let err = decode_public_key(&base64_decode(spki).unwrap()).unwrap_err();
            assert!(err.to_string().contains("not a secp256r1 key"), "{}", err);
        }
    }

    #[test]
    fn rejects_point_off_curve() {
        let mut der = base64_decode(CLIENT_SPKI).unwrap();
        let last = der.len() - 1;
        der[last] ^= 0x01;
        let err = decode_public_key(&der).unwrap_err();
        assert!(err.to_string().contains("not on secp256r1"));
    }

    #[test]
    fn shared_secret_from_bytes_checks_length() {
        assert!(SharedSecret::from_bytes(&[0u8; 32]).is_ok());
        let err = SharedSecret::from_bytes(&[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                got: 16
            }
        ));
    }

    #[test]
    fn shared_secret_debug_hides_bytes() {
        let secret = SharedSecret::from_bytes(&[0xab; 32]).unwrap();
        assert_eq!(format!("{:?}", secret), "SharedSecret(..)");
    }
}
