//! HTTP handlers for the OAuth 2.0 / OpenID Connect endpoints.
//!
//! Implements:
//! - RFC 6749 §3.1: Authorization endpoint (plus the consent decision)
//! - RFC 6749 §3.2: Token endpoint
//! - RFC 7009: Token revocation
//! - OpenID Connect Discovery 1.0

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{OriginalUri, State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, Cookie, HeaderMapExt, authorization::Basic};
use chrono::Utc;
use serde::Deserialize;

use super::router::HttpState;
use crate::authorize::AuthorizeParams;
use crate::error::{ErrorCode, FlowError, TokenError};
use crate::grant::{ClientCredentials, TokenRequest, TokenResponse};
use crate::session::SESSION_COOKIE;

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers.typed_get::<Cookie>().and_then(|cookie| cookie.get(SESSION_COOKIE).map(str::to_owned))
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

/// `GET|POST /authorize`
///
/// Parameters come from the query string on GET and the form body on POST.
pub async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    form: Result<Form<AuthorizeParams>, FormRejection>,
) -> Response {
    let Form(params) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Malformed authorization request");
            return FlowError::BadRequest("malformed request").into_response();
        }
    };

    let session = session_token(&headers);
    state.flow.authorize(&params, session.as_deref(), uri.path(), Utc::now()).await.into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DecideRequest {
    pub submit: String,
}

/// `POST /authorize/decide`
///
/// The consent page posts the user's choice here.
pub async fn handle_decide(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    form: Result<Form<DecideRequest>, FormRejection>,
) -> Response {
    let Ok(Form(request)) = form else {
        return FlowError::BadRequest("malformed request").into_response();
    };

    let session = session_token(&headers);
    state.flow.decide(&request.submit, session.as_deref(), Utc::now()).await.into_response()
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

/// `POST /token`
///
/// Client credentials are taken from HTTP Basic when present, else the body.
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Form(request) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Malformed token request");
            return TokenError::bad_request(ErrorCode::InvalidRequest)
                .with_description("malformed form body")
                .into_response();
        }
    };

    let basic = headers
        .typed_get::<Authorization<Basic>>()
        .map(|Authorization(basic)| ClientCredentials::new(basic.username(), basic.password()));

    match state.grants.exchange(&request, basic).await {
        Ok(response) => token_success(response),
        Err(err) => err.into_response(),
    }
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(body: TokenResponse) -> Response {
    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

// ─── RFC 7009: Token Revocation ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RevokeRequest {
    pub token: String,
}

/// `POST /revoke`
///
/// Deletes any access or refresh token matching `token`. Unknown tokens are
/// not an error, and neither is a body that does not decode: it names no token.
pub async fn handle_revoke(
    State(state): State<Arc<HttpState>>,
    form: Result<Form<RevokeRequest>, FormRejection>,
) -> Response {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Undecodable revocation body");
            RevokeRequest::default()
        }
    };
    if request.token.is_empty() {
        return ().into_response();
    }

    if let Err(err) = state.store.delete_token_by_access(&request.token).await {
        return TokenError::from(err).into_response();
    }
    if let Err(err) = state.store.delete_token_by_refresh(&request.token).await {
        return TokenError::from(err).into_response();
    }

    tracing::info!("Revoked token");
    ().into_response()
}

// ─── OpenID Connect Discovery ────────────────────────────────────────────────

/// `GET /oidc/discovery`
pub async fn handle_discovery(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.discovery.clone())
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chat-oauth",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
