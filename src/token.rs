//! Building and parsing HTTP auth tokens.
//!
//! A token is the base64 of a signed kind 27235 event's JSON, optionally
//! prefixed with the `Nostr ` authorization scheme.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    config::AuthConfig,
    error::{AuthError, Result},
    event::{Event, Signer, Tag, UnsignedEvent, HTTP_AUTH_KIND},
};

/// Authorization scheme prefix, including the separating space.
pub const AUTH_SCHEME: &str = "Nostr ";

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Hex SHA-256 of a request body, as carried by the `payload` tag.
pub fn hash_payload(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// A request to be authenticated, checked before any signing happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    url: String,
    method: String,
    payload_hash: Option<String>,
}

impl TokenRequest {
    /// Fails with [`AuthError::Validation`] if `url` or `method` is empty.
    /// Surrounding whitespace is trimmed from both before signing.
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Result<Self> {
        let url = url.into().trim().to_string();
        let method = method.into().trim().to_lowercase();
        if url.is_empty() {
            return Err(AuthError::Validation("missing url".into()));
        }
        if method.is_empty() {
            return Err(AuthError::Validation("missing method".into()));
        }
        Ok(Self {
            url,
            method,
            payload_hash: None,
        })
    }

    /// Bind a precomputed body hash.
    pub fn with_payload_hash(mut self, hash: impl Into<String>) -> Self {
        self.payload_hash = Some(hash.into());
        self
    }

    /// Bind the SHA-256 of `body`.
    pub fn with_payload(self, body: &[u8]) -> Self {
        self.with_payload_hash(hash_payload(body))
    }

    pub fn unsigned_event(&self, created_at: u64) -> UnsignedEvent {
        let mut tags = vec![
            Tag::pair("u", self.url.clone()),
            Tag::pair("method", self.method.clone()),
        ];
        if let Some(hash) = &self.payload_hash {
            tags.push(Tag::pair("payload", hash.clone()));
        }
        UnsignedEvent {
            created_at,
            kind: HTTP_AUTH_KIND,
            tags,
            content: String::new(),
        }
    }

    /// Sign the request with `signer` and encode the result as a token.
    pub async fn sign<S>(&self, signer: &S, config: &AuthConfig) -> Result<String>
    where
        S: Signer + ?Sized,
    {
        let event = signer.sign(self.unsigned_event(unix_now())).await?;
        let token = encode_event(&event, config.include_scheme)?;
        debug!(url = %self.url, method = %self.method, id = %event.id, "built auth token");
        Ok(token)
    }
}

/// Build a token for `url` and `method`, optionally bound to a body hash.
///
/// Input checks run before `signer` is called, so an empty url or method
/// never reaches the signer.
pub async fn build_token<S>(
    url: &str,
    method: &str,
    signer: &S,
    config: &AuthConfig,
    payload_hash: Option<&str>,
) -> Result<String>
where
    S: Signer + ?Sized,
{
    let mut request = TokenRequest::new(url, method)?;
    if let Some(hash) = payload_hash {
        request = request.with_payload_hash(hash);
    }
    request.sign(signer, config).await
}

fn encode_event(event: &Event, include_scheme: bool) -> Result<String> {
    let json = serde_json::to_string(event)
        .map_err(|e| AuthError::Signer(format!("encoding signed event: {e}")))?;
    let encoded = STANDARD.encode(json);
    Ok(if include_scheme {
        format!("{AUTH_SCHEME}{encoded}")
    } else {
        encoded
    })
}

/// Decode a token, with or without the `Nostr ` prefix, into an event.
pub fn parse_token(token: &str) -> Result<Event> {
    let token = token.trim();
    let token = token.strip_prefix(AUTH_SCHEME).unwrap_or(token).trim();
    if token.is_empty() {
        return Err(AuthError::Parse("missing token".into()));
    }
    let bytes = STANDARD
        .decode(token)
        .map_err(|e| AuthError::Parse(format!("base64: {e}")))?;
    let event: Event =
        serde_json::from_slice(&bytes).map_err(|e| AuthError::Parse(format!("json: {e}")))?;
    event.check_shape()?;
    debug!(id = %event.id, "parsed auth token");
    Ok(event)
}
