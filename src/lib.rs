//! Nostr HTTP authentication (kind 27235 tokens) and external identity claim
//! verification.
//!
//! Signing, signature checks, and document fetches are injected as
//! capabilities ([`Signer`], [`Verifier`], [`Fetcher`]) so callers can swap in
//! remote signers or test doubles.

pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod server;
pub mod token;
pub mod validate;

pub use config::{AuthConfig, Settings};
pub use error::{AuthError, Result};
pub use event::{Event, Keys, SchnorrVerifier, Signer, Tag, UnsignedEvent, Verifier, HTTP_AUTH_KIND};
pub use identity::{ClaimVerifier, FetchResponse, Fetcher, HttpFetcher, IdentityClaim};
pub use token::{build_token, hash_payload, parse_token, TokenRequest, AUTH_SCHEME};
pub use validate::{validate_event, validate_payload, validate_token};
