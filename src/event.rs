//! Nostr event model plus the signing and verification capabilities.

use anyhow::anyhow;
use async_trait::async_trait;
use secp256k1::{schnorr::Signature, Keypair, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{AuthError, Result};

/// Kind reserved for HTTP authentication events.
pub const HTTP_AUTH_KIND: u32 = 27235;

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// The first element names the tag and the rest hold data. HTTP auth uses:
///
/// - `u` – absolute request URL
/// - `method` – lowercase HTTP verb
/// - `payload` – hex SHA-256 of the request body
///
/// For example `["method", "get"]` is `Tag(vec!["method".into(), "get".into()])`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// Build a two-element `[name, value]` tag.
    pub fn pair(name: &str, value: impl Into<String>) -> Self {
        Tag(vec![name.to_string(), value.into()])
    }

    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }
}

/// Signed Nostr event as it travels inside a token.
///
/// ```json
/// {
///   "id": "5e8f...",
///   "pubkey": "1b84...",
///   "created_at": 1700000000,
///   "kind": 27235,
///   "tags": [["u", "https://api.example.com/v1"], ["method", "get"]],
///   "content": "",
///   "sig": "9c2a..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex, x-only).
    pub pubkey: String,
    /// Unix timestamp of creation. Negative values fail to decode.
    pub created_at: u64,
    /// Kind number, `27235` for HTTP auth.
    ///
    /// Values outside `u32` (negative or too large) are rejected while
    /// decoding, so they surface as parse errors rather than a wrong kind.
    pub kind: u32,
    /// Ordered tags; HTTP auth reads `u`, `method` and `payload`.
    pub tags: Vec<Tag>,
    /// Event content body, empty for HTTP auth.
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}

impl Event {
    /// Value of the first tag called `name`, if any.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name() == Some(name))
            .and_then(Tag::value)
    }

    /// Reject events whose hex fields do not have the expected shape.
    pub(crate) fn check_shape(&self) -> Result<()> {
        for (field, value, len) in [
            ("id", &self.id, 64),
            ("pubkey", &self.pubkey, 64),
            ("sig", &self.sig, 128),
        ] {
            if value.len() != len || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(AuthError::Parse(format!("{field} must be {len} hex characters")));
            }
        }
        Ok(())
    }
}

/// Event fields a signer needs; the signer supplies `id`, `pubkey` and `sig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Tag>,
    pub content: String,
}

/// SHA-256 of the canonical `[0, pubkey, created_at, kind, tags, content]` array.
pub fn event_hash(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> [u8; 32] {
    let arr = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    Sha256::digest(arr.to_string().as_bytes()).into()
}

/// Turns an unsigned event into a signed one.
///
/// Implementations may suspend, e.g. to reach a remote signer.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, event: UnsignedEvent) -> Result<Event>;
}

/// Decides whether a signed event's id and signature are valid.
pub trait Verifier {
    fn verify(&self, event: &Event) -> bool;
}

impl<F> Verifier for F
where
    F: Fn(&Event) -> bool,
{
    fn verify(&self, event: &Event) -> bool {
        self(event)
    }
}

/// BIP-340 verifier that also recomputes the event id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchnorrVerifier;

impl Verifier for SchnorrVerifier {
    fn verify(&self, event: &Event) -> bool {
        verify_event(event)
            .inspect_err(|e| debug!(id = %event.id, "signature check failed: {e}"))
            .is_ok()
    }
}

/// Verify an event's ID and Schnorr signature.
fn verify_event(ev: &Event) -> anyhow::Result<()> {
    let hash = event_hash(&ev.pubkey, ev.created_at, ev.kind, &ev.tags, &ev.content);
    if hex::encode(hash) != ev.id.to_ascii_lowercase() {
        return Err(anyhow!("id mismatch"));
    }
    let sig = Signature::from_slice(&hex::decode(&ev.sig)?)?;
    let pk = XOnlyPublicKey::from_slice(&hex::decode(&ev.pubkey)?)?;
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest_slice(&hash)?;
    secp.verify_schnorr(&sig, &msg, &pk)?;
    Ok(())
}

/// Local secp256k1 key pair usable as a [`Signer`].
#[derive(Clone)]
pub struct Keys {
    secp: Secp256k1<secp256k1::All>,
    keypair: Keypair,
}

impl Keys {
    pub fn from_secret_bytes(sk: &[u8]) -> Result<Self> {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, sk)
            .map_err(|e| AuthError::Validation(format!("secret key: {e}")))?;
        Ok(Self { secp, keypair })
    }

    /// Parse a 64-character hex secret key.
    pub fn from_secret_hex(sk: &str) -> Result<Self> {
        let bytes = hex::decode(sk.trim())
            .map_err(|e| AuthError::Validation(format!("secret key: {e}")))?;
        Self::from_secret_bytes(&bytes)
    }

    /// Hex x-only public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.x_only_public_key().0.serialize())
    }

    /// Sign without suspending.
    pub fn sign_event(&self, ev: UnsignedEvent) -> Event {
        let pubkey = self.public_key_hex();
        let hash = event_hash(&pubkey, ev.created_at, ev.kind, &ev.tags, &ev.content);
        let msg = Message::from_digest(hash);
        let sig = self.secp.sign_schnorr_no_aux_rand(&msg, &self.keypair);
        Event {
            id: hex::encode(hash),
            pubkey,
            created_at: ev.created_at,
            kind: ev.kind,
            tags: ev.tags,
            content: ev.content,
            sig: hex::encode(sig.as_ref()),
        }
    }
}

#[async_trait]
impl Signer for Keys {
    async fn sign(&self, event: UnsignedEvent) -> Result<Event> {
        Ok(self.sign_event(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Keys {
        Keys::from_secret_bytes(&[1u8; 32]).unwrap()
    }

    fn unsigned() -> UnsignedEvent {
        UnsignedEvent {
            created_at: 1,
            kind: HTTP_AUTH_KIND,
            tags: vec![Tag::pair("u", "http://test.com"), Tag::pair("method", "get")],
            content: String::new(),
        }
    }

    #[test]
    fn event_hash_matches_reference() {
        let tags = vec![Tag::pair("u", "http://test.com")];
        let hash = event_hash("ab", 5, 1, &tags, "hi");
        let mut hasher = Sha256::new();
        hasher.update(br#"[0,"ab",5,1,[["u","http://test.com"]],"hi"]"#);
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(hash, expected);
    }

    #[test]
    fn signed_event_verifies() {
        let ev = keys().sign_event(unsigned());
        assert_eq!(ev.pubkey, keys().public_key_hex());
        assert!(ev.check_shape().is_ok());
        assert!(SchnorrVerifier.verify(&ev));
    }

    #[test]
    fn tampered_event_fails_verification() {
        let mut ev = keys().sign_event(unsigned());
        ev.tags[0] = Tag::pair("u", "http://evil.com");
        assert!(!SchnorrVerifier.verify(&ev));

        let mut ev = keys().sign_event(unsigned());
        ev.sig = "00".repeat(64);
        assert!(!SchnorrVerifier.verify(&ev));
    }

    #[test]
    fn verify_event_reports_reason() {
        let mut ev = keys().sign_event(unsigned());
        ev.content = "changed".into();
        assert_eq!(verify_event(&ev).unwrap_err().to_string(), "id mismatch");

        let mut ev = keys().sign_event(unsigned());
        ev.sig = "00".repeat(64);
        let err = verify_event(&ev).unwrap_err();
        assert_ne!(err.to_string(), "id mismatch");
    }

    #[test]
    fn closures_are_verifiers() {
        let ev = keys().sign_event(unsigned());
        assert!((|_: &Event| true).verify(&ev));
        assert!(!(|_: &Event| false).verify(&ev));
    }

    #[test]
    fn tag_value_returns_first_match() {
        let mut ev = keys().sign_event(unsigned());
        ev.tags.push(Tag::pair("u", "http://second.com"));
        ev.tags.push(Tag(vec!["empty".into()]));
        assert_eq!(ev.tag_value("u"), Some("http://test.com"));
        assert_eq!(ev.tag_value("empty"), None);
        assert_eq!(ev.tag_value("payload"), None);
    }

    #[test]
    fn check_shape_rejects_short_hex() {
        let mut ev = keys().sign_event(unsigned());
        ev.id = "abc".into();
        assert!(matches!(ev.check_shape(), Err(AuthError::Parse(_))));
    }

    #[test]
    fn bad_secret_key_is_rejected() {
        assert!(matches!(
            Keys::from_secret_hex("zz"),
            Err(AuthError::Validation(_))
        ));
        assert!(Keys::from_secret_bytes(&[0u8; 32]).is_err());
    }
}
