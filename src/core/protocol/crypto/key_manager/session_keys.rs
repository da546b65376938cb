use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use p384::ecdsa::SigningKey;
use p384::pkcs8::{DecodePublicKey, EncodePublicKey, ObjectIdentifier, SubjectPublicKeyInfoRef};
use p384::{PublicKey, SecretKey};
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::protocol::error::CryptoError;

pub const CURVE_NAME: &str = "secp384r1";

/// id-ecPublicKey
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP384R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// The per-session secp384r1 key pair. The private half never leaves this
/// type; callers get a signing key or run ECDH through it.
#[derive(Clone)]
pub struct KeyMaterial {
    secret: SecretKey,
    public_der: Vec<u8>,
    x5u: String,
}

impl KeyMaterial {
    pub fn generate() -> Result<Self, CryptoError> {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    pub fn from_secret(secret: SecretKey) -> Result<Self, CryptoError> {
        let public_der = secret.public_key().to_public_key_der()?.as_bytes().to_vec();
        let x5u = STANDARD.encode(&public_der);
        Ok(Self {
            secret,
            public_der,
            x5u,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// SPKI DER encoding of the public key.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// Base64 of the DER public key, the `x5u` header value of every token.
    pub fn x5u(&self) -> &str {
        &self.x5u
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret)
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("curve", &CURVE_NAME)
            .field("x5u", &self.x5u)
            .field("private_key", &"***")
            .finish()
    }
}

/// Parses an SPKI DER public key, accepting only secp384r1 points.
/// The reported curve is the one named in the key's own parameters.
pub fn parse_public_key_der(der: &[u8]) -> Result<PublicKey, CryptoError> {
    let info = SubjectPublicKeyInfoRef::try_from(der)?;
    if info.algorithm.oid != EC_PUBLIC_KEY_OID {
        return Err(CryptoError::CurveMismatch {
            expected: CURVE_NAME.to_string(),
            actual: info.algorithm.oid.to_string(),
        });
    }

    let curve = info.algorithm.parameters_oid()?;
    if curve != SECP384R1_OID {
        return Err(CryptoError::CurveMismatch {
            expected: CURVE_NAME.to_string(),
            actual: curve.to_string(),
        });
    }

    Ok(PublicKey::from_public_key_der(der)?)
}

/// Symmetric material derived once the handshake challenge is answered.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    key: [u8; 32],
    iv: [u8; 16],
}

impl SessionKeys {
    /// `key = SHA-256(salt || shared_secret)`, `iv = key[0..16]`.
    pub fn derive(salt: &[u8], shared_secret: &[u8]) -> Self {
        let mut digest = Sha256::new();
        digest.update(salt);
        digest.update(shared_secret);
        let hash = digest.finalize();

        let mut key = [0u8; 32];
        key.copy_from_slice(&hash);
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&key[..16]);

        #[cfg(debug_assertions)]
        {
            tracing::debug!(target: "session_keys", "key_hash = {}", hex::encode(Sha256::digest(key)));
        }

        Self { key, iv }
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("key", &"***")
            .field("iv", &"***")
            .finish()
    }
}
