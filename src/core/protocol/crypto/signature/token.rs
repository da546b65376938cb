//! Compact ES384 tokens as used by the login chain and the server handshake.
//!
//! Layout: `base64url(header).base64url(claims).base64url(signature)` where the
//! header is `{"alg":"ES384","x5u":<base64 SPKI DER>}` and the signature is the
//! raw 96-byte `r || s` pair.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use p384::ecdsa::signature::{Signer, Verifier};
use p384::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::protocol::crypto::key_manager::session_keys::{parse_public_key_der, KeyMaterial};
use crate::core::protocol::error::CryptoError;

pub const TOKEN_ALGORITHM: &str = "ES384";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub x5u: String,
}

/// Signs claim sets with the session key.
pub struct TokenSigner {
    key: SigningKey,
    x5u: String,
}

impl TokenSigner {
    pub fn new(material: &KeyMaterial) -> Self {
        Self {
            key: material.signing_key(),
            x5u: material.x5u().to_string(),
        }
    }

    pub fn x5u(&self) -> &str {
        &self.x5u
    }

    pub fn sign(&self, claims: &Value) -> Result<String, CryptoError> {
        let header = TokenHeader {
            alg: TOKEN_ALGORITHM.to_string(),
            x5u: self.x5u.clone(),
        };
        let header_json = serde_json::to_vec(&header).map_err(|e| CryptoError::SigningFailed {
            reason: e.to_string(),
        })?;
        let claims_json = serde_json::to_vec(claims).map_err(|e| CryptoError::SigningFailed {
            reason: e.to_string(),
        })?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature: Signature = self
            .key
            .try_sign(signing_input.as_bytes())
            .map_err(|e| CryptoError::SigningFailed { reason: e.to_string() })?;

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

/// Tokens from other implementations sometimes carry padded or standard
/// base64 segments.
fn decode_segment(segment: &str) -> Result<Vec<u8>, CryptoError> {
    match URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')) {
        Ok(bytes) => Ok(bytes),
        Err(_) => Ok(STANDARD.decode(segment)?),
    }
}

fn split_token(token: &str) -> Result<(&str, &str, &str), CryptoError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) => Ok((h, c, s)),
        _ => Err(CryptoError::InvalidToken {
            reason: "expected three dot-separated segments".to_string(),
        }),
    }
}

pub fn decode_token_header(token: &str) -> Result<TokenHeader, CryptoError> {
    let (header, _, _) = split_token(token)?;
    Ok(serde_json::from_slice(&decode_segment(header)?)?)
}

/// Reads the claims without checking the signature.
pub fn decode_token_claims(token: &str) -> Result<Value, CryptoError> {
    let (_, claims, _) = split_token(token)?;
    Ok(serde_json::from_slice(&decode_segment(claims)?)?)
}

/// Verifies a token against the key in its own `x5u` header and returns the
/// header and the claims.
pub fn verify_token(token: &str) -> Result<(TokenHeader, Value), CryptoError> {
    let (header_b64, claims_b64, signature_b64) = split_token(token)?;
    let header: TokenHeader = serde_json::from_slice(&decode_segment(header_b64)?)?;
    if header.alg != TOKEN_ALGORITHM {
        return Err(CryptoError::InvalidToken {
            reason: format!("unsupported alg {}", header.alg),
        });
    }

    let der = STANDARD.decode(&header.x5u)?;
    let public_key = parse_public_key_der(&der)?;
    let verifying_key = VerifyingKey::from(&public_key);

    let signature = Signature::from_slice(&decode_segment(signature_b64)?)?;
    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    verifying_key.verify(signing_input.as_bytes(), &signature)?;

    let claims = serde_json::from_slice(&decode_segment(claims_b64)?)?;
    Ok((header, claims))
}
