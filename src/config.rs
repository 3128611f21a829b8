//! Configuration: per-call [`AuthConfig`] and service [`Settings`] loaded
//! from `.env` files.

use std::env;

use anyhow::{Context, Result};

use crate::identity::GITHUB_GIST_BASE;

/// Options shared by token building and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthConfig {
    /// Prefix built tokens with `"Nostr "`. Defaults to `false`.
    pub include_scheme: bool,
    /// Allowed distance in seconds between `created_at` and now, in both
    /// directions. Defaults to `60`.
    pub tolerance_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            include_scheme: false,
            tolerance_secs: 60,
        }
    }
}

/// Runtime settings derived from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP bind address, e.g. `127.0.0.1:7777`.
    pub bind_http: String,
    /// Externally visible base URL that clients sign, without trailing slash.
    pub public_url: String,
    /// Hex secret key used by the CLI to sign tokens.
    pub secret_key: Option<String>,
    pub auth: AuthConfig,
    /// Base URL of the gist host used for GitHub claims.
    pub github_gist_base: String,
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let bind_http = env::var("BIND_HTTP").context("BIND_HTTP")?;
        let public_url = non_empty("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{bind_http}"))
            .trim_end_matches('/')
            .to_string();
        let secret_key = non_empty("SECRET_KEY");
        let defaults = AuthConfig::default();
        let tolerance_secs = match non_empty("AUTH_TOLERANCE_SECS") {
            Some(v) => v.parse().context("AUTH_TOLERANCE_SECS")?,
            None => defaults.tolerance_secs,
        };
        let include_scheme = env::var("AUTH_INCLUDE_SCHEME").unwrap_or_else(|_| "0".into()) == "1";
        let github_gist_base = non_empty("GITHUB_GIST_BASE")
            .unwrap_or_else(|| GITHUB_GIST_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            bind_http,
            public_url,
            secret_key,
            auth: AuthConfig {
                include_scheme,
                tolerance_secs,
            },
            github_gist_base,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}
