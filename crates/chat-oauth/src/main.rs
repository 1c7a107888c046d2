//! Chat OAuth Server - Entry Point
//!
//! Serves the OAuth endpoints over HTTP with in-memory persistence.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use chat_oauth::{
    Config, JwtSigningKeys, MemoryDirectory, MemorySessionStore, MemoryStore, OAuthServer,
    OAuthStore, ScopeSet, model::Client, server,
};

#[derive(Parser, Debug)]
#[command(name = "chat-oauth")]
#[command(about = "OAuth 2.0 / OpenID Connect authorization server")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "3000", env = "PORT")]
    port: u16,

    /// Server origin used in discovery URLs (e.g., https://q.example.com)
    #[arg(long, env = "OAUTH_ORIGIN")]
    origin: Option<String>,

    /// Mint refresh tokens alongside access tokens
    #[arg(long)]
    refresh: bool,

    /// PEM private key (RSA, EC P-256 or Ed25519) for signing ID tokens
    #[arg(long, env = "OAUTH_ID_TOKEN_KEY")]
    id_token_key: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Register a development client with this id at startup
    #[arg(long)]
    dev_client_id: Option<String>,

    /// Secret of the development client; omit for a public client
    #[arg(long, requires = "dev_client_id")]
    dev_client_secret: Option<String>,

    /// Redirect URI of the development client
    #[arg(long, requires = "dev_client_id", default_value = "http://localhost:8080/callback")]
    dev_redirect_uri: String,

    /// Space-separated scopes of the development client
    #[arg(long, requires = "dev_client_id", default_value = "openid profile read write")]
    dev_scopes: String,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

async fn seed_dev_client(store: &MemoryStore, cli: &Cli) -> anyhow::Result<()> {
    let Some(id) = cli.dev_client_id.clone() else {
        return Ok(());
    };
    let scopes = ScopeSet::parse(&cli.dev_scopes)?;
    let client = Client {
        name: id.clone(),
        id,
        description: "Development client".to_string(),
        confidential: cli.dev_client_secret.is_some(),
        creator_id: Uuid::nil(),
        secret: cli.dev_client_secret.clone().unwrap_or_default(),
        redirect_uri: cli.dev_redirect_uri.clone(),
        scopes,
    };

    tracing::info!(
        client_id = %client.id,
        confidential = client.confidential,
        "Seeding development client"
    );
    store.save_client(client).await?;
    Ok(())
}

fn load_signing_keys(path: Option<&PathBuf>) -> anyhow::Result<JwtSigningKeys> {
    if let Some(path) = path {
        let pem = std::fs::read(path)
            .with_context(|| format!("reading ID token key {}", path.display()))?;
        let keys = JwtSigningKeys::from_pem(&pem)
            .with_context(|| format!("loading ID token key {}", path.display()))?;
        tracing::info!(keys = ?keys, "Loaded ID token signing key");
        return Ok(keys);
    }

    let mut secret = [0u8; 32];
    getrandom::fill(&mut secret).map_err(|e| anyhow::anyhow!("getrandom: {e}"))?;
    tracing::warn!("No ID token key configured; signing with an ephemeral HS256 secret");
    Ok(JwtSigningKeys::hmac(&secret))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::from_env()?;
    if let Some(ref origin) = cli.origin {
        config.origin = origin.trim_end_matches('/').to_string();
    }
    if cli.refresh {
        config.is_refresh_enabled = true;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        origin = %config.origin,
        refresh = config.is_refresh_enabled,
        "Starting chat OAuth server"
    );

    let keys = load_signing_keys(cli.id_token_key.as_ref())?;

    let store = MemoryStore::new();
    seed_dev_client(&store, &cli).await?;

    let store: Arc<dyn OAuthStore> = Arc::new(store);
    tokio::spawn(server::run_housekeeping(Arc::clone(&store), config.housekeeping_interval));

    let server = OAuthServer::new(
        config,
        store,
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryDirectory::new()),
        Arc::new(keys),
    );
    server.run_http(cli.port).await
}
