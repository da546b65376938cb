use p384::ecdh::diffie_hellman;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::protocol::crypto::key_manager::session_keys::{
    parse_public_key_der, KeyMaterial, SessionKeys,
};
use crate::core::protocol::error::CryptoError;

pub const SHARED_SECRET_LEN: usize = 48;

/// Runs ECDH between the local private key and a remote SPKI DER public key.
/// The returned secret is the affine x-coordinate of the shared point.
pub fn derive_shared_secret(
    local: &KeyMaterial,
    remote_der: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let remote = parse_public_key_der(remote_der)?;
    let shared = diffie_hellman(local.secret().to_nonzero_scalar(), remote.as_affine());
    let secret = Zeroizing::new(shared.raw_secret_bytes().to_vec());

    if secret.len() != SHARED_SECRET_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: SHARED_SECRET_LEN,
            actual: secret.len(),
        });
    }

    debug!("Shared secret derived ({} bytes)", secret.len());
    Ok(secret)
}

/// Where a session stands in the key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    SecretDerived,
    Armed,
}

/// Holds the local key pair and walks `Idle -> SecretDerived -> Armed`.
pub struct KeyExchange {
    material: KeyMaterial,
    shared_secret: Option<Zeroizing<Vec<u8>>>,
    state: ExchangeState,
}

impl KeyExchange {
    pub fn new(material: KeyMaterial) -> Self {
        Self {
            material,
            shared_secret: None,
            state: ExchangeState::Idle,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn derive(&mut self, remote_der: &[u8]) -> Result<(), CryptoError> {
        self.shared_secret = Some(derive_shared_secret(&self.material, remote_der)?);
        self.state = ExchangeState::SecretDerived;
        Ok(())
    }

    /// Produces the symmetric keys for `salt`. Requires a derived secret.
    pub fn arm(&mut self, salt: &[u8]) -> Result<SessionKeys, CryptoError> {
        let secret = self.shared_secret.as_ref().ok_or(CryptoError::NotArmed)?;
        let keys = SessionKeys::derive(salt, secret);
        self.state = ExchangeState::Armed;
        Ok(keys)
    }
}
