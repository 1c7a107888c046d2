//! Error types for the OAuth authorization server.
//!
//! Uses `thiserror` for structured error handling. Two error surfaces face
//! HTTP clients:
//! - [`TokenError`]: a JSON body `{error, error_description?, error_uri?}`
//!   returned by the token endpoint.
//! - [`FlowError`]: a bare status returned by the authorization and consent
//!   endpoints when there is no usable redirect URI to report through.

use std::fmt;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Errors from the scope registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Scope name is not part of the registry.
    #[error("unknown scope: {0}")]
    Unknown(String),

    /// Scope appears more than once in the request.
    #[error("duplicated scope: {0}")]
    Duplicate(String),

    /// Scope token contains characters outside the scope-token grammar.
    #[error("scope contains illegal characters: {0:?}")]
    IllegalCharacter(String),
}

/// Errors from PKCE verification.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PkceError {
    /// The recorded challenge method is neither `plain` nor `S256`.
    #[error("unknown code challenge method: {0}")]
    UnknownMethod(String),
}

/// Errors from the OAuth store.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row matched the lookup.
    #[error("not found")]
    NotFound,

    /// A unique key is already taken.
    #[error("conflict on {0}")]
    Conflict(&'static str),

    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Errors from the session store.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session backend failed.
    #[error("session backend error: {0}")]
    Backend(String),
}

/// Errors from the user directory.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Unknown user or wrong password. The two are deliberately indistinguishable.
    #[error("user id or password is wrong")]
    InvalidCredentials,

    /// No user with the given id.
    #[error("user not found")]
    NotFound,

    /// The directory backend failed.
    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Errors from ID token signing.
#[derive(thiserror::Error, Debug)]
pub enum SigningError {
    /// The PEM holds no RSA, EC or Ed25519 private key.
    #[error("unsupported signing key")]
    UnsupportedKey,

    #[error("jwt encoding failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// OAuth 2.0 / OpenID Connect error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    UnauthorizedClient,
    AccessDenied,
    UnsupportedResponseType,
    InvalidScope,
    ServerError,
    InvalidClient,
    InvalidGrant,
    UnsupportedGrantType,
    LoginRequired,
    ConsentRequired,
}

impl ErrorCode {
    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::LoginRequired => "login_required",
            Self::ConsentRequired => "consent_required",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON error body returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

/// Error returned by the token endpoint.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{code} ({status})")]
pub struct TokenError {
    /// HTTP status of the response.
    pub status: StatusCode,
    /// OAuth error code.
    pub code: ErrorCode,
    /// Optional human-readable description.
    pub description: Option<String>,
}

impl TokenError {
    #[must_use]
    pub const fn new(status: StatusCode, code: ErrorCode) -> Self {
        Self { status, code, description: None }
    }

    /// 400 with the given code.
    #[must_use]
    pub const fn bad_request(code: ErrorCode) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code)
    }

    /// 401 with the given code.
    #[must_use]
    pub const fn unauthorized(code: ErrorCode) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code)
    }

    /// 500 `server_error`.
    #[must_use]
    pub const fn server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::ServerError)
    }

    /// Attach an `error_description`.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The JSON body for this error.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code,
            error_description: self.description.clone(),
            error_uri: None,
        }
    }
}

impl From<StoreError> for TokenError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Store failure at token endpoint");
        Self::server_error()
    }
}

impl From<DirectoryError> for TokenError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::InvalidCredentials | DirectoryError::NotFound => {
                Self::unauthorized(ErrorCode::InvalidGrant)
            }
            DirectoryError::Backend(message) => {
                tracing::error!(error = %message, "Directory failure at token endpoint");
                Self::server_error()
            }
        }
    }
}

impl From<SigningError> for TokenError {
    fn from(err: SigningError) -> Self {
        tracing::error!(error = %err, "ID token signing failed");
        Self::server_error()
    }
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body())).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        response
    }
}

/// Direct-status errors of the authorization and consent endpoints.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Malformed request or unknown client.
    #[error("{0}")]
    BadRequest(&'static str),

    /// No logged-in user behind the session.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Unusable client or session.
    #[error("{0}")]
    Forbidden(&'static str),

    /// Store, session or directory failure before a redirect target was known.
    #[error("internal server error")]
    Internal,
}

impl FlowError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Rejection of a bearer-authenticated API request (RFC 6750 §3).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BearerError {
    #[error("missing bearer token")]
    Missing,

    #[error("invalid token")]
    InvalidToken,

    /// The token lacks the named scope.
    #[error("insufficient scope: {0} required")]
    InsufficientScope(&'static str),

    #[error("internal server error")]
    Internal,
}

impl BearerError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Missing | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::InsufficientScope(_) => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `WWW-Authenticate` challenge for this rejection, if any.
    #[must_use]
    pub fn challenge(&self) -> Option<String> {
        match self {
            Self::Missing => Some("Bearer".to_string()),
            Self::InvalidToken => Some(r#"Bearer error="invalid_token""#.to_string()),
            Self::InsufficientScope(scope) => {
                Some(format!(r#"Bearer error="insufficient_scope", scope="{scope}""#))
            }
            Self::Internal => None,
        }
    }
}

impl IntoResponse for BearerError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.to_string()).into_response();
        if let Some(value) = self.challenge().and_then(|c| HeaderValue::from_str(&c).ok()) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for token endpoint operations.
pub type TokenResult<T> = Result<T, TokenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_names() {
        assert_eq!(ErrorCode::InvalidGrant.as_str(), "invalid_grant");
        assert_eq!(ErrorCode::ConsentRequired.to_string(), "consent_required");
        assert_eq!(
            serde_json::to_value(ErrorCode::UnsupportedResponseType).unwrap(),
            "unsupported_response_type"
        );
    }

    #[test]
    fn test_error_body_omits_empty_fields() {
        let body = TokenError::bad_request(ErrorCode::InvalidRequest).body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "invalid_request" }));

        let body = TokenError::unauthorized(ErrorCode::InvalidClient)
            .with_description("client authentication failed")
            .body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error_description"], "client authentication failed");
        assert!(json.get("error_uri").is_none());
    }

    #[test]
    fn test_token_error_response_headers() {
        let response = TokenError::server_error().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    }

    #[test]
    fn test_directory_errors_do_not_leak_cause() {
        let missing = TokenError::from(DirectoryError::NotFound);
        let wrong = TokenError::from(DirectoryError::InvalidCredentials);
        assert_eq!(missing, wrong);
        assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
        assert_eq!(missing.code, ErrorCode::InvalidGrant);
    }

    #[test]
    fn test_signing_failure_is_server_error() {
        let err = TokenError::from(SigningError::UnsupportedKey);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, ErrorCode::ServerError);
    }

    #[test]
    fn test_flow_error_status() {
        assert_eq!(FlowError::BadRequest("unknown client").status(), StatusCode::BAD_REQUEST);
        assert_eq!(FlowError::Forbidden("bad session").status(), StatusCode::FORBIDDEN);
        assert_eq!(FlowError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
