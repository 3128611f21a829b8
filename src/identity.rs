//! External identity claims: proof that a Nostr key is attested by an
//! account on another platform.
//!
//! For GitHub the proof is a public gist whose raw text contains
//! `Verifying that I control the following Nostr public key: <key>`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    error::{AuthError, Result},
    event::Tag,
};

/// Default host for GitHub gist proofs.
pub const GITHUB_GIST_BASE: &str = "https://gist.github.com";

/// Sentence that precedes the claimed key in a proof document.
pub const CLAIM_PREFIX: &str = "Verifying that I control the following Nostr public key: ";

/// Status and text body of a fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Retrieves a document by URL.
///
/// Only transport failures are errors here; status handling is up to the
/// caller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::ClaimFetch(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::ClaimFetch(e.to_string()))?;
        Ok(FetchResponse { status, body })
    }
}

/// A claimed external identity, as carried by a NIP-39 `i` tag:
/// `["i", "github:<username>", "<proof>"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    pub platform: String,
    pub identity: String,
    pub proof: String,
}

impl IdentityClaim {
    pub fn new(
        platform: impl Into<String>,
        identity: impl Into<String>,
        proof: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            identity: identity.into(),
            proof: proof.into(),
        }
    }

    /// Read a claim from an `i` tag. Returns `None` for other tags or
    /// malformed values.
    pub fn from_tag(tag: &Tag) -> Option<Self> {
        if tag.name() != Some("i") {
            return None;
        }
        let (platform, identity) = tag.value()?.split_once(':')?;
        let proof = tag.0.get(2)?;
        Some(Self::new(platform, identity, proof.as_str()))
    }

    pub fn to_tag(&self) -> Tag {
        Tag(vec![
            "i".into(),
            format!("{}:{}", self.platform, self.identity),
            self.proof.clone(),
        ])
    }
}

/// Text a user publishes to claim `pubkey`.
pub fn claim_text(pubkey: &str) -> String {
    format!("{CLAIM_PREFIX}{pubkey}")
}

/// Key asserted by a proof document, if it follows the claim template.
pub fn extract_claimed_key(body: &str) -> Option<&str> {
    let start = body.find(CLAIM_PREFIX)? + CLAIM_PREFIX.len();
    body[start..].split_whitespace().next()
}

/// Location of a GitHub gist proof under `base`.
pub fn github_proof_url(base: &str, username: &str, proof: &str) -> Result<String> {
    check_segment("username", username, |c| c.is_ascii_alphanumeric() || c == '-')?;
    if username.starts_with('-') {
        return Err(AuthError::Validation(format!("invalid username: {username}")));
    }
    check_segment("proof", proof, |c| c.is_ascii_alphanumeric())?;
    Ok(format!("{}/{username}/{proof}/raw", base.trim_end_matches('/')))
}

/// Every character of `value` must satisfy `allowed`; `\`, `.` and `%` never
/// reach the gist URL.
fn check_segment(field: &str, value: &str, allowed: impl Fn(char) -> bool) -> Result<()> {
    if value.is_empty() {
        return Err(AuthError::Validation(format!("missing {field}")));
    }
    if !value.chars().all(allowed) {
        return Err(AuthError::Validation(format!("invalid {field}: {value}")));
    }
    Ok(())
}

/// Verifies identity claims by fetching and inspecting proof documents.
#[derive(Clone)]
pub struct ClaimVerifier {
    fetcher: Arc<dyn Fetcher>,
    github_base: String,
}

impl ClaimVerifier {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_github_base(fetcher, GITHUB_GIST_BASE)
    }

    pub fn with_github_base(fetcher: Arc<dyn Fetcher>, base: impl Into<String>) -> Self {
        Self {
            fetcher,
            github_base: base.into(),
        }
    }

    /// Check that gist `proof` of `username` claims `pubkey`.
    ///
    /// A fetched document that names another key (or none) yields
    /// `Ok(false)`; failing to fetch it is an error.
    pub async fn validate_github(&self, pubkey: &str, username: &str, proof: &str) -> Result<bool> {
        if pubkey.trim().is_empty() {
            return Err(AuthError::Validation("missing pubkey".into()));
        }
        let url = github_proof_url(&self.github_base, username, proof)?;
        info!(%url, "fetching github identity proof");
        let resp = self.fetcher.fetch(&url).await?;
        if !(200..300).contains(&resp.status) {
            return Err(AuthError::ClaimFetch(format!(
                "{url} returned status {}",
                resp.status
            )));
        }
        let claimed = extract_claimed_key(&resp.body);
        debug!(?claimed, "extracted claimed key");
        Ok(claimed.is_some_and(|key| key.eq_ignore_ascii_case(pubkey.trim())))
    }

    /// Verify `claim` for `pubkey`, dispatching on its platform.
    pub async fn verify(&self, pubkey: &str, claim: &IdentityClaim) -> Result<bool> {
        match claim.platform.as_str() {
            "github" => {
                self.validate_github(pubkey, &claim.identity, &claim.proof)
                    .await
            }
            other => Err(AuthError::UnsupportedPlatform(other.to_string())),
        }
    }
}
