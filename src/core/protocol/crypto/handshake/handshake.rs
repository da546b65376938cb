use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::core::protocol::crypto::encryptor::PacketEncryptor;
use crate::core::protocol::crypto::key_manager::key_exchange::KeyExchange;
use crate::core::protocol::crypto::key_manager::session_keys::KeyMaterial;
use crate::core::protocol::crypto::signature::token::{verify_token, TokenSigner};
use crate::core::protocol::error::{CryptoError, ProtocolError, ProtocolResult};
use crate::core::protocol::packets::compression::CompressionSettings;

/// What the server's handshake token hands us.
#[derive(Debug, Clone)]
pub struct ServerChallenge {
    pub server_key_der: Vec<u8>,
    pub salt: Vec<u8>,
}

fn salt_from_claims(claims: &Value) -> Result<Vec<u8>, CryptoError> {
    let salt = claims
        .get("salt")
        .and_then(Value::as_str)
        .ok_or_else(|| CryptoError::InvalidToken {
            reason: "handshake token has no salt".to_string(),
        })?;
    Ok(STANDARD.decode(salt)?)
}

/// Verifies the challenge token against its own `x5u` key and extracts the
/// ephemeral server key and salt.
pub fn parse_challenge(token: &str) -> Result<ServerChallenge, CryptoError> {
    let (header, claims) = verify_token(token)?;
    let server_key_der = STANDARD.decode(&header.x5u)?;
    let salt = salt_from_claims(&claims)?;
    debug!("Server challenge: {} byte key, {} byte salt", server_key_der.len(), salt.len());
    Ok(ServerChallenge {
        server_key_der,
        salt,
    })
}

/// Answers the challenge: ECDH with the server key, key derivation from the
/// salt, and a ready encryptor. Every failure here is fatal to the session.
pub fn complete_handshake(
    exchange: &mut KeyExchange,
    token: &str,
    compression: CompressionSettings,
) -> ProtocolResult<PacketEncryptor> {
    let challenge = parse_challenge(token).map_err(|e| {
        ProtocolError::HandshakeFailed {
            reason: format!("bad server token: {}", e),
        }
        .log()
    })?;

    exchange
        .derive(&challenge.server_key_der)
        .map_err(|e| ProtocolError::from(e).log())?;
    let keys = exchange.arm(&challenge.salt)?;
    let encryptor = PacketEncryptor::new(keys, compression)?;

    info!("🔐 Encryption armed");
    Ok(encryptor)
}

/// Builds the token a server sends to start encryption.
pub fn issue_challenge(server: &KeyMaterial, salt: &[u8]) -> Result<String, CryptoError> {
    TokenSigner::new(server).sign(&json!({ "salt": STANDARD.encode(salt) }))
}
