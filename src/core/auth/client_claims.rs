use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub const SKIN_WIDTH: u32 = 64;
pub const SKIN_HEIGHT: u32 = 64;

const SKIN_RESOURCE_PATCH: &str = r#"{"geometry":{"default":"geometry.humanoid.custom"}}"#;

/// Claims that must differ on every login, even for otherwise identical
/// requests.
pub const FRESH_CLAIMS: [&str; 5] = [
    "ServerAddress",
    "ClientRandomId",
    "DeviceId",
    "PlayFabId",
    "SelfSignedId",
];

/// Values the client-state claims are built from.
#[derive(Debug, Clone)]
pub struct ClaimContext {
    pub game_version: String,
    pub device_os: u32,
    pub device_model: String,
    pub server_address: String,
    pub third_party_name: String,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn default_skin_data() -> String {
    // Opaque steve-ish tone, one RGBA pixel repeated.
    let pixel = [0xB4u8, 0x84, 0x64, 0xFF];
    let image: Vec<u8> = pixel
        .iter()
        .copied()
        .cycle()
        .take((SKIN_WIDTH * SKIN_HEIGHT * 4) as usize)
        .collect();
    STANDARD.encode(image)
}

/// Stamps the always-fresh fields into `claims`.
pub fn stamp_fresh_claims(claims: &mut Map<String, Value>, server_address: &str) {
    let play_fab: String = Uuid::new_v4().simple().to_string().chars().take(16).collect();
    claims.insert("ServerAddress".into(), json!(server_address));
    claims.insert("ClientRandomId".into(), json!(now_millis()));
    claims.insert("DeviceId".into(), json!(Uuid::new_v4().to_string()));
    claims.insert("PlayFabId".into(), json!(play_fab));
    claims.insert("SelfSignedId".into(), json!(Uuid::new_v4().to_string()));
}

/// The client-state payload a vanilla client puts in its user chain.
pub fn default_user_claims(ctx: &ClaimContext) -> Map<String, Value> {
    let claims = json!({
        "AnimatedImageData": [],
        "ArmSize": "wide",
        "CapeData": "",
        "CapeId": "",
        "CapeImageHeight": 0,
        "CapeImageWidth": 0,
        "CapeOnClassicSkin": false,
        "CompatibleWithClientSideChunkGen": false,
        "CurrentInputMode": 1,
        "DefaultInputMode": 1,
        "DeviceModel": ctx.device_model,
        "DeviceOS": ctx.device_os,
        "GameVersion": ctx.game_version,
        "GuiScale": 0,
        "IsEditorMode": false,
        "LanguageCode": "en_US",
        "OverrideSkin": false,
        "PersonaPieces": [],
        "PersonaSkin": false,
        "PieceTintColors": [],
        "PlatformOfflineId": "",
        "PlatformOnlineId": "",
        "PremiumSkin": false,
        "SkinAnimationData": "",
        "SkinColor": "#0",
        "SkinGeometryDataEngineVersion": STANDARD.encode("0.0.0"),
        "SkinData": default_skin_data(),
        "SkinGeometryData": "",
        "SkinId": format!("{}.Custom", Uuid::new_v4()),
        "SkinImageHeight": SKIN_HEIGHT,
        "SkinImageWidth": SKIN_WIDTH,
        "SkinResourcePatch": STANDARD.encode(SKIN_RESOURCE_PATCH),
        "ThirdPartyName": ctx.third_party_name,
        "ThirdPartyNameOnly": false,
        "TrustedSkin": false,
        "UIProfile": 0,
    });

    let mut map = match claims {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    stamp_fresh_claims(&mut map, &ctx.server_address);
    map
}
