use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bedrock_client::config::ClientOptions;
use bedrock_client::core::auth::client_claims::ClaimContext;
use bedrock_client::core::auth::credentials::CredentialChainBuilder;
use bedrock_client::core::auth::identity::{offline_uuid, OfflineIdentity};
use bedrock_client::core::protocol::crypto::key_manager::session_keys::KeyMaterial;
use bedrock_client::core::protocol::crypto::signature::token::decode_token_claims;

/// Offline tooling for the Bedrock client core
#[derive(Parser)]
#[command(name = "bedrock-client")]
#[command(about = "Builds and inspects Bedrock login credentials", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an offline login chain and print it
    Chain {
        /// Display name for the offline profile
        #[arg(long)]
        username: Option<String>,

        /// Also sign an online root token around this key
        #[arg(long)]
        mojang_key: Option<String>,
    },

    /// Print the offline UUID for a username
    Uuid {
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install the tracing subscriber")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Chain {
            username,
            mojang_key,
        } => print_chain(username, mojang_key)?,
        Commands::Uuid { name } => {
            println!("{}", offline_uuid(&name));
        }
    }

    Ok(())
}

fn print_chain(username: Option<String>, mojang_key: Option<String>) -> anyhow::Result<()> {
    let mut options = ClientOptions::from_env()?;
    if let Some(username) = username {
        options.username = username;
    }
    if mojang_key.is_some() {
        options.mojang_key = mojang_key;
    }

    let session = OfflineIdentity::new(options.username.clone())
        .create()
        .context("could not build an offline identity")?;
    let material = KeyMaterial::generate().context("could not generate a key pair")?;
    info!("Generated secp384r1 key pair for {}", session.profile.name);

    let mut builder = CredentialChainBuilder::new(
        &material,
        ClaimContext {
            game_version: options.version.clone(),
            device_os: options.device_os,
            device_model: options.device_model.clone(),
            server_address: options.server_address(),
            third_party_name: options.username.clone(),
        },
    );
    let tokens = builder
        .login_tokens(&session, options.mojang_key.as_deref(), &options.skin_data)
        .context("could not sign the login chain")?;

    let chain: Value = serde_json::from_str(&tokens.identity)?;
    println!("Identity chain:");
    if let Some(entries) = chain["chain"].as_array() {
        for token in entries.iter().filter_map(Value::as_str) {
            let claims = decode_token_claims(token).context("chain token is unreadable")?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
            println!("{}", token);
        }
    }

    if let Some(key) = options.mojang_key.as_deref() {
        let root = builder
            .build_identity_chain(Some(key), false)
            .context("could not sign the online root token")?;
        println!("\nOnline root token:\n{}", root);
    }

    println!("\nUser chain:\n{}", tokens.client);
    println!("\nUUID: {}", session.profile.uuid);
    Ok(())
}
