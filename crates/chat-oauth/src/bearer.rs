//! Bearer token authentication for resource servers (RFC 6750).

use axum::http::HeaderMap;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use chrono::{DateTime, Utc};

use crate::error::{BearerError, StoreError};
use crate::model::AccessToken;
use crate::scope::Scope;
use crate::store::OAuthStore;

/// Resolve the `Authorization: Bearer` header to a live access token.
pub async fn authenticate(
    store: &dyn OAuthStore,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Result<AccessToken, BearerError> {
    let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() else {
        return Err(BearerError::Missing);
    };

    let token = match store.get_token_by_access(bearer.token()).await {
        Ok(token) => token,
        Err(StoreError::NotFound) => return Err(BearerError::InvalidToken),
        Err(err) => {
            tracing::error!(error = %err, "Failed to look up bearer token");
            return Err(BearerError::Internal);
        }
    };

    if token.is_expired_at(now) {
        tracing::debug!(client_id = %token.client_id, "Rejected expired bearer token");
        return Err(BearerError::InvalidToken);
    }
    Ok(token)
}

/// Check that a token carries `scope`.
pub fn require_scope(token: &AccessToken, scope: Scope) -> Result<(), BearerError> {
    if token.scopes.contains(scope) {
        Ok(())
    } else {
        Err(BearerError::InsufficientScope(scope.as_str()))
    }
}
