use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::core::protocol::error::ProtocolError;

pub const DEFAULT_VERSION: &str = "1.21.20";
pub const DEFAULT_PORT: u16 = 19132;

/// Game version string to network protocol number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion(pub i32);

const KNOWN_VERSIONS: &[(&str, i32)] = &[
    ("1.21.20", 712),
    ("1.21.2", 686),
    ("1.21.0", 685),
    ("1.20.80", 671),
];

impl ProtocolVersion {
    pub fn from_game_version(version: &str) -> Result<Self, ProtocolError> {
        KNOWN_VERSIONS
            .iter()
            .find(|(name, _)| *name == version)
            .map(|(_, protocol)| ProtocolVersion(*protocol))
            .ok_or_else(|| ProtocolError::ConfigError {
                details: format!("unsupported game version {}", version),
            })
    }

    pub fn number(self) -> i32 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub version: String,
    pub offline: bool,
    pub username: String,
    pub host: String,
    pub port: u16,
    pub view_distance: i32,
    /// Extra user-chain claims, merged over the defaults.
    pub skin_data: Map<String, Value>,
    /// Root key for the online identity chain.
    pub mojang_key: Option<String>,
    pub debug: bool,
    pub tokens_folder: String,
    pub device_os: u32,
    pub device_model: String,
    pub compression_level: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            offline: false,
            username: "defaultUser".to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            view_distance: 10,
            skin_data: Map::new(),
            mojang_key: None,
            debug: false,
            tokens_folder: "tokens".to_string(),
            device_os: 7,
            device_model: "Helicopter".to_string(),
            compression_level: 7,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid value, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl ClientOptions {
    /// Reads `.env` and `BEDROCK_*` variables over the defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let skin_data = match env::var("BEDROCK_SKIN_DATA") {
            Ok(raw) => match serde_json::from_str::<Value>(&raw)
                .context("BEDROCK_SKIN_DATA must be JSON")?
            {
                Value::Object(map) => map,
                _ => anyhow::bail!("BEDROCK_SKIN_DATA must be a JSON object"),
            },
            Err(_) => defaults.skin_data,
        };

        let options = Self {
            version: env::var("BEDROCK_VERSION").unwrap_or(defaults.version),
            offline: parse_var("BEDROCK_OFFLINE", defaults.offline)?,
            username: env::var("BEDROCK_USERNAME").unwrap_or(defaults.username),
            host: env::var("BEDROCK_HOST").unwrap_or(defaults.host),
            port: parse_var("BEDROCK_PORT", defaults.port)?,
            view_distance: parse_var("BEDROCK_VIEW_DISTANCE", defaults.view_distance)?,
            skin_data,
            mojang_key: env::var("BEDROCK_MOJANG_KEY").ok(),
            debug: parse_var("BEDROCK_DEBUG", defaults.debug)?,
            tokens_folder: env::var("BEDROCK_TOKENS_FOLDER").unwrap_or(defaults.tokens_folder),
            device_os: parse_var("BEDROCK_DEVICE_OS", defaults.device_os)?,
            device_model: env::var("BEDROCK_DEVICE_MODEL").unwrap_or(defaults.device_model),
            compression_level: parse_var("BEDROCK_COMPRESSION_LEVEL", defaults.compression_level)?,
        };

        options
            .protocol()
            .context("BEDROCK_VERSION is not a supported game version")?;
        Ok(options)
    }

    pub fn protocol(&self) -> Result<ProtocolVersion, ProtocolError> {
        ProtocolVersion::from_game_version(&self.version)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
