use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use consolectl_auth::AuthStrategy;
use consolectl_config::{Config, paths};
use consolectl_store::FileTokenCache;
use consolectl_transport::{ApiClient, TlsOptions, TransportConfig, build_transport};
use consolectl_types::{CredentialStore as _, Fingerprint, Token, TokenProvider as _, now_secs};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "consolectl", version, about = "Management console command-line client")]
struct Cli {
    /// Path to the YAML configuration file (default: ~/.config/consolectl/config.yaml).
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log every request and response to stderr.
    #[arg(long, global = true)]
    debug: bool,
    /// Skip TLS certificate verification.
    #[arg(long, global = true)]
    insecure: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Obtain a token and store it in the cache.
    Login,
    /// Remove the cached token for the configured credential.
    Logout,
    /// Print a valid access token to stdout.
    Token,
    /// Show which credential is configured and whether a token is cached.
    Status,
    /// Send an authenticated request and print the response body.
    Api {
        /// HTTP method (GET, POST, PUT, DELETE, ...).
        method: String,
        /// Path relative to the endpoint, e.g. /v1/clusters.
        path: String,
        /// JSON request body.
        #[arg(short, long, value_name = "JSON")]
        data: Option<String>,
    },
    /// Print the server version.
    Version,
}

/// Everything a command needs, built from the configuration.
struct Session {
    config: Config,
    cache: Arc<FileTokenCache>,
    fingerprint: Fingerprint,
    strategy: AuthStrategy,
    client: ApiClient,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(config.debug);

    let session = open_session(config)?;
    match cli.command {
        Commands::Login => cmd_login(&session).await,
        Commands::Logout => cmd_logout(&session).await,
        Commands::Token => cmd_token(&session).await,
        Commands::Status => cmd_status(&session).await,
        Commands::Api { method, path, data } => cmd_api(&session, &method, &path, data).await,
        Commands::Version => cmd_version(&session).await,
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => paths::config_path().ok().filter(|p| p.exists()),
    };
    let mut config =
        Config::load(path.as_deref()).map_err(|e| anyhow!("config error: {e}"))?;
    if cli.debug {
        config.debug = true;
    }
    if cli.insecure {
        config.tls.insecure = true;
    }
    Ok(config)
}

fn open_session(config: Config) -> Result<Session> {
    let tls = TlsOptions::from_parts(config.tls.insecure, config.tls.ca_file.as_deref())?;
    let mut transport = TransportConfig {
        tls,
        timeout: (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
        user_agent: config.user_agent.clone(),
        debug: config.debug,
        auth: None,
    };
    let http = transport.http_client()?;

    let cache_dir = match &config.cache_dir {
        Some(dir) => dir.clone(),
        None => paths::token_cache_dir()?,
    };
    let cache = Arc::new(FileTokenCache::new(cache_dir));
    let fingerprint = Fingerprint::new(config.endpoint(), &config.credential()?);

    let strategy = AuthStrategy::from_config(&config, http.clone(), cache.clone())?;
    transport.auth = Some(strategy.wrapper());
    let client = ApiClient::new(config.endpoint(), build_transport(&transport, http.clone()), http);

    Ok(Session {
        config,
        cache,
        fingerprint,
        strategy,
        client,
    })
}

fn describe_expiry(token: &Token) -> String {
    let now = now_secs();
    if token.expires_at > now {
        format!("expires in {}s", token.expires_at - now)
    } else {
        "expired".to_string()
    }
}

async fn cmd_login(session: &Session) -> Result<()> {
    let token = session
        .strategy
        .access_token()
        .await
        .map_err(|e| anyhow!("login failed: {e}"))?;
    eprintln!(
        "Logged in to {} ({}), token {}",
        session.config.endpoint(),
        session.strategy.kind(),
        describe_expiry(&token)
    );
    Ok(())
}

async fn cmd_logout(session: &Session) -> Result<()> {
    if session.cache.remove(&session.fingerprint).await? {
        eprintln!("Logged out of {}", session.config.endpoint());
    } else {
        eprintln!("No cached token for {}", session.config.endpoint());
    }
    Ok(())
}

async fn cmd_token(session: &Session) -> Result<()> {
    let token = session.strategy.access_token().await?;
    println!("{}", token.access_token);
    Ok(())
}

async fn cmd_status(session: &Session) -> Result<()> {
    let credential = session.config.credential()?;
    println!("endpoint:    {}", session.config.endpoint());
    println!("credential:  {} ({})", session.strategy.kind(), credential.client_id());
    println!("fingerprint: {}", session.fingerprint);
    println!(
        "cache file:  {}",
        session.cache.path_for(&session.fingerprint).display()
    );

    let cached = session.cache.read(&session.fingerprint).await;
    let state = if cached.access_token.is_empty() {
        "none".to_string()
    } else if cached.valid() {
        format!("valid, {}", describe_expiry(&cached))
    } else if cached.can_refresh() {
        "expired (refreshable)".to_string()
    } else {
        "expired".to_string()
    };
    println!("token:       {state}");
    Ok(())
}

async fn cmd_api(session: &Session, method: &str, path: &str, data: Option<String>) -> Result<()> {
    let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{method}'"))?;
    let mut request = session.client.verb(method, path);
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(&data).context("--data is not valid JSON")?;
        request = request.json(&body);
    }

    let resp = request.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    eprintln!("{status}");
    if !body.is_empty() {
        println!("{body}");
    }
    if !status.is_success() {
        bail!("request failed with status {status}");
    }
    Ok(())
}

async fn cmd_version(session: &Session) -> Result<()> {
    let version = session.client.server_version().await?;
    println!("{version}");
    Ok(())
}
