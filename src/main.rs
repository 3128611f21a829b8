//! Command line interface for creating and checking Nostr HTTP auth tokens,
//! verifying GitHub identity claims, and serving the authenticated HTTP API.

use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use nostr_http_auth::{
    server, validate_payload, validate_token, ClaimVerifier, HttpFetcher, Keys, SchnorrVerifier,
    Settings, TokenRequest,
};

/// Command line interface entry point.
#[derive(Parser)]
#[command(
    name = "nostr-http-auth",
    author,
    version,
    about = "Nostr HTTP auth tokens and identity claims"
)]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Write a default `.env` file if none exists.
    Init,
    /// Sign a token for a request with `SECRET_KEY`.
    Token {
        #[arg(long)]
        url: String,
        #[arg(long)]
        method: String,
        /// File whose contents are bound via the `payload` tag.
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Prefix the token with the `Nostr ` scheme.
        #[arg(long)]
        scheme: bool,
    },
    /// Validate a token and print the authenticated public key.
    Verify {
        #[arg(long)]
        token: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        method: String,
        /// Request body the token must be bound to.
        #[arg(long)]
        payload: Option<PathBuf>,
    },
    /// Check that a GitHub gist claims a public key.
    Github {
        #[arg(long)]
        pubkey: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        proof: String,
    },
    /// Launch the HTTP service.
    Serve,
}

/// Execute the selected CLI subcommand, returning what should be printed.
async fn run(cli: Cli) -> anyhow::Result<Option<String>> {
    ensure_env_file(&cli.env)?;
    let cfg = Settings::from_env(&cli.env)?;
    match cli.command {
        Commands::Init => Ok(None),
        Commands::Token {
            url,
            method,
            payload,
            scheme,
        } => {
            let Some(secret) = cfg.secret_key.as_deref() else {
                bail!("SECRET_KEY is not set in {}", cli.env);
            };
            let keys = Keys::from_secret_hex(secret)?;
            let mut request = TokenRequest::new(url, method)?;
            if let Some(path) = payload {
                let body = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                request = request.with_payload(&body);
            }
            let mut auth = cfg.auth;
            auth.include_scheme |= scheme;
            Ok(Some(request.sign(&keys, &auth).await?))
        }
        Commands::Verify {
            token,
            url,
            method,
            payload,
        } => {
            let event = validate_token(&token, &url, &method, &SchnorrVerifier, &cfg.auth)?;
            if let Some(path) = payload {
                let body = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                validate_payload(&event, &body)?;
            }
            Ok(Some(event.pubkey))
        }
        Commands::Github {
            pubkey,
            username,
            proof,
        } => {
            let verifier = ClaimVerifier::with_github_base(
                Arc::new(HttpFetcher::default()),
                cfg.github_gist_base.clone(),
            );
            let verified = verifier.validate_github(&pubkey, &username, &proof).await?;
            Ok(Some(verified.to_string()))
        }
        Commands::Serve => {
            let addr: SocketAddr = cfg.bind_http.as_str().parse()?;
            server::serve_http(addr, &cfg, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
            Ok(None)
        }
    }
}

/// Create a default `.env` file if one is not already present at `path`.
fn ensure_env_file(path: &str) -> anyhow::Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        return Ok(());
    }
    if let Some(parent) = env_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut content = String::new();
    content.push_str("BIND_HTTP=127.0.0.1:7777\n");
    content.push_str("PUBLIC_URL=\n");
    content.push_str("SECRET_KEY=\n");
    content.push_str("AUTH_TOLERANCE_SECS=60\n");
    content.push_str("AUTH_INCLUDE_SCHEME=0\n");
    content.push_str("GITHUB_GIST_BASE=https://gist.github.com\n");
    fs::write(env_path, content)?;
    Ok(())
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    if let Some(out) = run(cli).await? {
        println!("{out}");
    }
    Ok(())
}
