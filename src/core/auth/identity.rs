use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::core::protocol::crypto::signature::token::decode_token_claims;
use crate::core::protocol::error::{ProtocolError, ProtocolResult};

/// Profile name used when an external chain does not carry one.
const FALLBACK_NAME: &str = "Player";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub uuid: Uuid,
    pub xuid: String,
}

/// Output of an identity provider: who we are plus the tokens that vouch for it.
#[derive(Debug, Clone)]
pub struct IdentitySession {
    pub profile: Profile,
    pub token_chain: Vec<String>,
}

impl IdentitySession {
    pub fn is_offline(&self) -> bool {
        self.token_chain.is_empty()
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// May suspend for a long time (interactive sign-in).
    async fn authenticate(&self) -> ProtocolResult<IdentitySession>;
}

/// Deterministic UUIDv3 of a username in the URL namespace.
pub fn offline_uuid(username: &str) -> Uuid {
    Uuid::new_v3(&Uuid::NAMESPACE_URL, username.as_bytes())
}

pub struct OfflineIdentity {
    username: String,
}

impl OfflineIdentity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn create(&self) -> ProtocolResult<IdentitySession> {
        if self.username.trim().is_empty() {
            return Err(ProtocolError::AuthenticationFailed {
                reason: "Must specify a valid username for offline session".to_string(),
            });
        }
        Ok(IdentitySession {
            profile: Profile {
                name: self.username.clone(),
                uuid: offline_uuid(&self.username),
                xuid: "0".to_string(),
            },
            token_chain: Vec::new(),
        })
    }
}

#[async_trait]
impl IdentityProvider for OfflineIdentity {
    async fn authenticate(&self) -> ProtocolResult<IdentitySession> {
        self.create()
    }
}

/// Wraps a token chain obtained out of band (e.g. a cached sign-in). The
/// profile is read from the `extraData` of the chain's second token.
pub struct ChainIdentity {
    chain: Vec<String>,
}

impl ChainIdentity {
    pub fn new(chain: Vec<String>) -> Self {
        Self { chain }
    }
}

fn profile_from_claims(claims: &Value) -> Profile {
    let extra = claims.get("extraData");
    let field = |name: &str| extra.and_then(|e| e.get(name)).and_then(Value::as_str);

    let name = field("displayName").unwrap_or(FALLBACK_NAME).to_string();
    let uuid = field("identity")
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(|| offline_uuid(&name));
    let xuid = field("XUID").unwrap_or("0").to_string();
    Profile { name, uuid, xuid }
}

#[async_trait]
impl IdentityProvider for ChainIdentity {
    async fn authenticate(&self) -> ProtocolResult<IdentitySession> {
        let token = self
            .chain
            .get(1)
            .or_else(|| self.chain.first())
            .ok_or_else(|| ProtocolError::AuthenticationFailed {
                reason: "empty token chain".to_string(),
            })?;
        let claims = decode_token_claims(token).map_err(|e| ProtocolError::AuthenticationFailed {
            reason: e.to_string(),
        })?;
        let profile = profile_from_claims(&claims);
        info!("Authenticated as {} ({})", profile.name, profile.xuid);
        Ok(IdentitySession {
            profile,
            token_chain: self.chain.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::crypto::key_manager::session_keys::KeyMaterial;
    use crate::core::protocol::crypto::signature::token::TokenSigner;
    use serde_json::json;

    #[test]
    fn offline_uuid_is_stable_v3() {
        let a = offline_uuid("Steve");
        assert_eq!(a, offline_uuid("Steve"));
        assert_ne!(a, offline_uuid("Alex"));
        assert_eq!(a.get_version_num(), 3);
    }

    #[tokio::test]
    async fn offline_identity_needs_a_name() {
        assert!(OfflineIdentity::new("").authenticate().await.is_err());

        let session = OfflineIdentity::new("Steve").authenticate().await.unwrap();
        assert_eq!(session.profile.name, "Steve");
        assert_eq!(session.profile.xuid, "0");
        assert!(session.is_offline());
    }

    #[tokio::test]
    async fn chain_identity_reads_extra_data() {
        let keys = KeyMaterial::generate().unwrap();
        let signer = TokenSigner::new(&keys);
        let root = signer.sign(&json!({"certificateAuthority": true})).unwrap();
        let leaf = signer
            .sign(&json!({"extraData": {
                "displayName": "Notch",
                "identity": "adfcf5ca-206c-404a-aec4-f59fff264c9b",
                "XUID": "2535"
            }}))
            .unwrap();

        let session = ChainIdentity::new(vec![root, leaf]).authenticate().await.unwrap();
        assert_eq!(session.profile.name, "Notch");
        assert_eq!(session.profile.xuid, "2535");
        assert_eq!(
            session.profile.uuid.to_string(),
            "adfcf5ca-206c-404a-aec4-f59fff264c9b"
        );
        assert!(!session.is_offline());
    }
}
