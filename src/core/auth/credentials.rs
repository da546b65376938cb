use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::core::auth::client_claims::{default_user_claims, stamp_fresh_claims, ClaimContext};
use crate::core::auth::identity::{IdentitySession, Profile};
use crate::core::protocol::crypto::key_manager::session_keys::KeyMaterial;
use crate::core::protocol::crypto::signature::token::TokenSigner;
use crate::core::protocol::error::{ProtocolError, ProtocolResult};

/// Root key the identity chain points at when no other key is supplied.
pub const MOJANG_PUBLIC_KEY: &str = "MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAECRXueJeTDqNRRgJi/vlRufByu/2G0i2Ebt6YMar5QX/R0DIIyrJMcUpruK4QveTfJSTp3Shlq4Gk34cD/4GUWwkv0DVuzeuB+tXija7HBxii03NHDbPAD0AKnLr2wdAp";
pub const TITLE_ID: &str = "89692877";
pub const OFFLINE_CHAIN_LIFETIME_SECS: u64 = 60 * 60;

/// Identity chain cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityChainKey {
    pub mojang_key: Option<String>,
    pub offline: bool,
}

/// User chain cache key: the canonical JSON of the caller's custom claims.
/// `serde_json::Map` keeps keys sorted, so equal objects serialize equally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserChainKey(String);

impl UserChainKey {
    pub fn from_claims(custom: &Map<String, Value>) -> Self {
        Self(Value::Object(custom.clone()).to_string())
    }
}

/// The two strings carried by the login packet.
#[derive(Debug, Clone)]
pub struct LoginTokens {
    /// `{"chain":[identity, ...external tokens]}`
    pub identity: String,
    pub client: String,
}

pub struct CredentialChainBuilder {
    signer: TokenSigner,
    context: ClaimContext,
    profile: Option<Profile>,
    identity_cache: HashMap<IdentityChainKey, String>,
    user_cache: HashMap<UserChainKey, Map<String, Value>>,
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl CredentialChainBuilder {
    pub fn new(material: &KeyMaterial, context: ClaimContext) -> Self {
        Self {
            signer: TokenSigner::new(material),
            context,
            profile: None,
            identity_cache: HashMap::new(),
            user_cache: HashMap::new(),
        }
    }

    /// Both caches embed the profile, so a different one invalidates them.
    pub fn set_profile(&mut self, profile: Profile) {
        if self.profile.as_ref() == Some(&profile) {
            return;
        }
        if self.profile.is_some() {
            debug!("Profile changed to {}, dropping cached chains", profile.name);
        }
        self.identity_cache.clear();
        self.user_cache.clear();
        self.context.third_party_name = profile.name.clone();
        self.profile = Some(profile);
    }

    pub fn build_identity_chain(&mut self, mojang_key: Option<&str>, offline: bool) -> ProtocolResult<String> {
        let key = IdentityChainKey {
            mojang_key: mojang_key.map(str::to_string),
            offline,
        };
        if let Some(token) = self.identity_cache.get(&key) {
            debug!("Identity chain cache hit (offline = {})", offline);
            return Ok(token.clone());
        }

        let claims = if offline {
            let profile = self.profile.as_ref().ok_or_else(|| ProtocolError::AuthenticationFailed {
                reason: "Must specify a valid username for offline session".to_string(),
            })?;
            let iat = unix_secs();
            json!({
                "extraData": {
                    "displayName": profile.name,
                    "identity": profile.uuid.to_string(),
                    "titleId": TITLE_ID,
                    "XUID": "0",
                },
                "certificateAuthority": true,
                "identityPublicKey": self.signer.x5u(),
                "nbf": 0,
                "iat": iat,
                "exp": iat + OFFLINE_CHAIN_LIFETIME_SECS,
                "iss": "self",
            })
        } else {
            json!({
                "identityPublicKey": mojang_key.unwrap_or(MOJANG_PUBLIC_KEY),
                "certificateAuthority": true,
            })
        };

        let token = self.signer.sign(&claims)?;
        self.identity_cache.insert(key, token.clone());
        Ok(token)
    }

    /// Signs the client-state claims merged with `custom`. The merge is cached
    /// per `custom`; the fresh fields are re-stamped on every call.
    pub fn build_user_chain(&mut self, custom: &Map<String, Value>) -> ProtocolResult<String> {
        let key = UserChainKey::from_claims(custom);
        let context = &self.context;
        let merged = self.user_cache.entry(key).or_insert_with(|| {
            let mut claims = default_user_claims(context);
            claims.extend(custom.iter().map(|(k, v)| (k.clone(), v.clone())));
            claims
        });

        stamp_fresh_claims(merged, &context.server_address);
        let token = self.signer.sign(&Value::Object(merged.clone()))?;
        Ok(token)
    }

    pub fn login_tokens(
        &mut self,
        session: &IdentitySession,
        mojang_key: Option<&str>,
        custom: &Map<String, Value>,
    ) -> ProtocolResult<LoginTokens> {
        self.set_profile(session.profile.clone());

        let identity_chain = self.build_identity_chain(mojang_key, session.is_offline())?;
        let mut chain = Vec::with_capacity(session.token_chain.len() + 1);
        chain.push(identity_chain);
        chain.extend(session.token_chain.iter().cloned());

        let identity = serde_json::to_string(&json!({ "chain": chain })).map_err(|e| {
            ProtocolError::InternalError {
                details: e.to_string(),
            }
        })?;
        let client = self.build_user_chain(custom)?;
        Ok(LoginTokens { identity, client })
    }
}
