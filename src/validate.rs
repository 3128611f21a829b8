//! Validation of decoded HTTP auth events against the request they claim
//! to authorize.

use tracing::warn;

use crate::{
    config::AuthConfig,
    error::{AuthError, Result},
    event::{Event, Verifier, HTTP_AUTH_KIND},
    token::{hash_payload, parse_token, unix_now},
};

/// Check `event` against the expected url and method.
///
/// Checks run in a fixed order and stop at the first failure: kind,
/// freshness, url, method, then signature.
pub fn validate_event<V>(
    event: &Event,
    url: &str,
    method: &str,
    verifier: &V,
    config: &AuthConfig,
) -> Result<()>
where
    V: Verifier + ?Sized,
{
    validate_event_at(event, url, method, verifier, config, unix_now())
        .inspect_err(|e| warn!(id = %event.id, kind = e.kind(), "rejected auth event: {e}"))
}

pub(crate) fn validate_event_at<V>(
    event: &Event,
    url: &str,
    method: &str,
    verifier: &V,
    config: &AuthConfig,
    now: u64,
) -> Result<()>
where
    V: Verifier + ?Sized,
{
    if event.kind != HTTP_AUTH_KIND {
        return Err(AuthError::WrongKind {
            expected: HTTP_AUTH_KIND,
            actual: event.kind,
        });
    }
    if now.abs_diff(event.created_at) > config.tolerance_secs {
        return Err(AuthError::ExpiredToken {
            created_at: event.created_at,
            now,
            tolerance: config.tolerance_secs,
        });
    }
    let actual_url = event.tag_value("u");
    if actual_url != Some(url) {
        return Err(AuthError::UrlMismatch {
            expected: url.to_string(),
            actual: actual_url.map(str::to_string),
        });
    }
    let expected_method = method.to_lowercase();
    let actual_method = event.tag_value("method");
    if actual_method != Some(expected_method.as_str()) {
        return Err(AuthError::MethodMismatch {
            expected: expected_method,
            actual: actual_method.map(str::to_string),
        });
    }
    if !verifier.verify(event) {
        return Err(AuthError::InvalidSignature);
    }
    Ok(())
}

/// Parse `token` and validate the event inside it.
///
/// Returns the authenticated event so callers can read its `pubkey`.
pub fn validate_token<V>(
    token: &str,
    url: &str,
    method: &str,
    verifier: &V,
    config: &AuthConfig,
) -> Result<Event>
where
    V: Verifier + ?Sized,
{
    let event = parse_token(token)?;
    validate_event(&event, url, method, verifier, config)?;
    Ok(event)
}

/// Check that the event's `payload` tag is the hash of `body`.
pub fn validate_payload(event: &Event, body: &[u8]) -> Result<()> {
    let expected = hash_payload(body);
    let actual = event.tag_value("payload");
    match actual {
        Some(hash) if hash.eq_ignore_ascii_case(&expected) => Ok(()),
        _ => Err(AuthError::PayloadMismatch {
            expected,
            actual: actual.map(str::to_string),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{Keys, SchnorrVerifier, Tag},
        token::{build_token, TokenRequest},
    };

    const URL: &str = "http://test.com";

    fn cfg() -> AuthConfig {
        AuthConfig::default()
    }

    fn keys() -> Keys {
        Keys::from_secret_bytes(&[1u8; 32]).unwrap()
    }

    fn event_at(created_at: u64) -> Event {
        let req = TokenRequest::new(URL, "get").unwrap();
        keys().sign_event(req.unsigned_event(created_at))
    }

    async fn token(include_scheme: bool) -> String {
        let cfg = AuthConfig {
            include_scheme,
            ..AuthConfig::default()
        };
        build_token(URL, "get", &keys(), &cfg, None).await.unwrap()
    }

    #[tokio::test]
    async fn fresh_token_validates_with_and_without_scheme() {
        let cfg = AuthConfig::default();
        for scheme in [false, true] {
            let ev = validate_token(&token(scheme).await, URL, "get", &SchnorrVerifier, &cfg)
                .unwrap();
            assert_eq!(ev.pubkey, keys().public_key_hex());
        }
    }

    #[tokio::test]
    async fn expected_method_is_case_insensitive() {
        let t = token(false).await;
        assert!(validate_token(&t, URL, "GET", &SchnorrVerifier, &cfg()).is_ok());
    }

    #[tokio::test]
    async fn wrong_url_is_rejected() {
        let t = token(false).await;
        let err = validate_token(
            &t,
            "http://wrong-test.com",
            "get",
            &SchnorrVerifier,
            &cfg(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AuthError::UrlMismatch {
                expected: "http://wrong-test.com".into(),
                actual: Some(URL.into()),
            }
        );
    }

    #[tokio::test]
    async fn url_comparison_is_exact() {
        let t = token(false).await;
        let err =
            validate_token(&t, "http://test.com/", "get", &SchnorrVerifier, &cfg()).unwrap_err();
        assert!(matches!(err, AuthError::UrlMismatch { .. }));
    }

    #[tokio::test]
    async fn wrong_method_is_rejected() {
        let t = token(true).await;
        let err = validate_token(&t, URL, "post", &SchnorrVerifier, &cfg()).unwrap_err();
        assert!(matches!(err, AuthError::MethodMismatch { .. }));
    }

    #[test]
    fn parse_errors_propagate_unchanged() {
        for t in ["", "fake"] {
            let err = validate_token(t, URL, "get", &SchnorrVerifier, &cfg()).unwrap_err();
            assert!(matches!(err, AuthError::Parse(_)));
        }
    }

    #[test]
    fn tolerance_window_is_symmetric() {
        let cfg = AuthConfig::default();
        let now = 1_700_000_000;
        for created_at in [now - 60, now, now + 60] {
            assert!(
                validate_event_at(&event_at(created_at), URL, "get", &SchnorrVerifier, &cfg, now)
                    .is_ok()
            );
        }
        for created_at in [now - 61, now + 61] {
            let err =
                validate_event_at(&event_at(created_at), URL, "get", &SchnorrVerifier, &cfg, now)
                    .unwrap_err();
            assert!(matches!(err, AuthError::ExpiredToken { .. }));
        }
    }

    #[test]
    fn custom_tolerance_is_honoured() {
        let cfg = AuthConfig {
            tolerance_secs: 5,
            ..AuthConfig::default()
        };
        let now = 1_000;
        let err = validate_event_at(&event_at(now - 6), URL, "get", &SchnorrVerifier, &cfg, now)
            .unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken { tolerance: 5, .. }));
    }

    #[test]
    fn old_event_is_expired_in_real_time() {
        let err = validate_event(&event_at(1), URL, "get", &SchnorrVerifier, &cfg()).unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken { .. }));
    }

    #[test]
    fn wrong_kind_is_checked_first() {
        let now = 1_000;
        let mut ev = event_at(1);
        ev.kind = 1;
        let err = validate_event_at(&ev, "other", "post", &SchnorrVerifier, &cfg(), now)
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::WrongKind {
                expected: HTTP_AUTH_KIND,
                actual: 1,
            }
        );
    }

    #[test]
    fn missing_tags_are_mismatches() {
        let now = 1_000;
        let mut ev = event_at(now);
        ev.tags.retain(|t| t.name() != Some("method"));
        let err = validate_event_at(&ev, URL, "get", &|_: &Event| true, &cfg(), now).unwrap_err();
        assert_eq!(
            err,
            AuthError::MethodMismatch {
                expected: "get".into(),
                actual: None,
            }
        );
        ev.tags.clear();
        let err = validate_event_at(&ev, URL, "get", &|_: &Event| true, &cfg(), now).unwrap_err();
        assert!(matches!(err, AuthError::UrlMismatch { actual: None, .. }));
    }

    #[test]
    fn signature_is_checked_last() {
        let now = 1_000;
        let mut ev = event_at(now);
        ev.tags.push(Tag::pair("extra", "x"));
        let err = validate_event_at(&ev, URL, "get", &SchnorrVerifier, &cfg(), now).unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);

        let ev = event_at(now);
        let err = validate_event_at(&ev, URL, "get", &|_: &Event| false, &cfg(), now).unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
    }

    #[test]
    fn payload_must_match_body() {
        let req = TokenRequest::new(URL, "post").unwrap().with_payload(b"hello");
        let ev = keys().sign_event(req.unsigned_event(1));
        assert!(validate_payload(&ev, b"hello").is_ok());
        assert!(matches!(
            validate_payload(&ev, b"goodbye"),
            Err(AuthError::PayloadMismatch { actual: Some(_), .. })
        ));
        assert!(matches!(
            validate_payload(&event_at(1), b"hello"),
            Err(AuthError::PayloadMismatch { actual: None, .. })
        ));
    }
}
