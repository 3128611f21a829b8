//! Error kinds surfaced by token handling and claim verification.

use thiserror::Error;

/// Every way an auth or claim operation can fail.
///
/// Validation failures keep their own variants so callers can tell a
/// malformed token from an expired one or from a bad signature.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A required input was empty or otherwise unusable.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The token could not be decoded into an event.
    #[error("malformed token: {0}")]
    Parse(String),

    #[error("wrong event kind: expected {expected}, got {actual}")]
    WrongKind { expected: u32, actual: u32 },

    /// `created_at` is outside the tolerance window, in either direction.
    #[error("token expired: created_at {created_at} is more than {tolerance}s from {now}")]
    ExpiredToken {
        created_at: u64,
        now: u64,
        tolerance: u64,
    },

    #[error(
        "url mismatch: expected {expected}, got {}",
        .actual.as_deref().unwrap_or("<none>")
    )]
    UrlMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error(
        "method mismatch: expected {expected}, got {}",
        .actual.as_deref().unwrap_or("<none>")
    )]
    MethodMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error(
        "payload mismatch: expected {expected}, got {}",
        .actual.as_deref().unwrap_or("<none>")
    )]
    PayloadMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("signer failed: {0}")]
    Signer(String),

    /// The proof document could not be retrieved.
    #[error("claim fetch failed: {0}")]
    ClaimFetch(String),

    #[error("unsupported identity platform: {0}")]
    UnsupportedPlatform(String),
}

impl AuthError {
    /// Stable snake_case name of the error kind, used in HTTP responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation",
            AuthError::Parse(_) => "parse",
            AuthError::WrongKind { .. } => "wrong_kind",
            AuthError::ExpiredToken { .. } => "expired_token",
            AuthError::UrlMismatch { .. } => "url_mismatch",
            AuthError::MethodMismatch { .. } => "method_mismatch",
            AuthError::PayloadMismatch { .. } => "payload_mismatch",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Signer(_) => "signer",
            AuthError::ClaimFetch(_) => "claim_fetch",
            AuthError::UnsupportedPlatform(_) => "unsupported_platform",
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;
