//! HTTP endpoints for health checks, NIP-98 authenticated identity, and
//! GitHub claim checks.

use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{OriginalUri, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::{AuthConfig, Settings},
    error::AuthError,
    event::SchnorrVerifier,
    identity::{ClaimVerifier, HttpFetcher},
    validate::{validate_payload, validate_token},
};

#[derive(Clone)]
struct HttpState {
    /// Base URL clients sign; the request path and query are appended.
    public_url: String,
    auth: AuthConfig,
    claims: ClaimVerifier,
}

impl HttpState {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            public_url: settings.public_url.clone(),
            auth: settings.auth,
            claims: ClaimVerifier::with_github_base(
                Arc::new(HttpFetcher::default()),
                settings.github_gist_base.clone(),
            ),
        }
    }
}

/// Response body for the `/healthz` endpoint.
#[derive(Serialize, Deserialize)]
struct Health {
    /// Always "ok" when the server is running.
    status: String,
}

/// Authenticated caller returned by `/whoami`.
#[derive(Serialize, Deserialize)]
struct WhoAmI {
    pubkey: String,
}

#[derive(Serialize, Deserialize)]
struct ClaimResult {
    verified: bool,
}

/// Error body with the machine-readable kind from [`AuthError::kind`].
#[derive(Serialize, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

struct ApiError(AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AuthError::Validation(_) | AuthError::UnsupportedPlatform(_) => StatusCode::BAD_REQUEST,
            AuthError::ClaimFetch(_) => StatusCode::BAD_GATEWAY,
            AuthError::Signer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };
        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Start an HTTP server exposing `/healthz`, `/whoami` and `/claims/github`.
pub async fn serve_http(
    addr: SocketAddr,
    settings: &Settings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let state = Arc::new(HttpState::from_settings(settings));
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/whoami", any(whoami))
        .route("/claims/github", get(github_claim))
        .with_state(state);
    info!(%addr, "listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Health check endpoint.
async fn healthz() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

/// Authenticate the `Authorization` header against this exact request.
///
/// The signed `u` tag must equal `PUBLIC_URL` plus path and query. A
/// non-empty body must also match the `payload` tag.
async fn whoami(
    State(state): State<Arc<HttpState>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WhoAmI>, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = format!("{}{}", state.public_url, path);
    let event = validate_token(token, &url, method.as_str(), &SchnorrVerifier, &state.auth)?;
    if !body.is_empty() {
        validate_payload(&event, &body)?;
    }
    info!(pubkey = %event.pubkey, %method, %url, "authenticated request");
    Ok(Json(WhoAmI {
        pubkey: event.pubkey,
    }))
}

#[derive(Deserialize)]
struct GithubClaimParams {
    pubkey: String,
    username: String,
    proof: String,
}

/// Check a GitHub gist proof on behalf of the caller.
async fn github_claim(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<GithubClaimParams>,
) -> Result<Json<ClaimResult>, ApiError> {
    let verified = state
        .claims
        .validate_github(&params.pubkey, &params.username, &params.proof)
        .await?;
    Ok(Json(ClaimResult { verified }))
}
