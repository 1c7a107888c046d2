//! Refresh-token grant with rotation (RFC 6749 §6).

use super::{ClientCredentials, GrantEngine, TokenRequest, TokenResponse, narrow_scope, parse_scope};
use crate::error::{ErrorCode, StoreError, TokenError, TokenResult};

impl GrantEngine {
    pub(super) async fn refresh_token(
        &self,
        request: &TokenRequest,
        basic: Option<ClientCredentials>,
    ) -> TokenResult<TokenResponse> {
        if request.refresh_token.is_empty() {
            return Err(TokenError::bad_request(ErrorCode::InvalidRequest)
                .with_description("refresh_token is required"));
        }

        let old = match self.store.get_token_by_refresh(&request.refresh_token).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => {
                return Err(TokenError::bad_request(ErrorCode::InvalidGrant));
            }
            Err(err) => return Err(err.into()),
        };

        let client = self.find_client(&old.client_id).await?;
        if client.confidential {
            let credentials = ClientCredentials::resolve(basic, request)?;
            if !credentials.authenticates(&client) {
                return Err(TokenError::unauthorized(ErrorCode::InvalidClient));
            }
        }

        // A refresh may narrow the scopes of the old token but never widen them.
        let requested = parse_scope(&request.scope)?;
        let scopes = narrow_scope(&requested, &old.scopes)?;

        let params = self.issue_params(&client, old.user_id, scopes, true);
        let token = match self.store.rotate_refresh(&request.refresh_token, params).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => {
                return Err(TokenError::bad_request(ErrorCode::InvalidGrant));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            client_id = %client.id,
            user_id = ?token.user_id,
            scopes = %token.scopes,
            "Rotated refresh token"
        );
        self.respond(&client, &token, &old.scopes, "").await
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::super::fixtures::Fixture;
    use super::*;
    use crate::scope::{Scope, ScopeSet};
    use crate::store::{IssueParams, OAuthStore};

    async fn seed_token(fx: &Fixture, client_id: &str) -> String {
        let token = fx
            .store
            .issue_token(IssueParams {
                client_id: client_id.into(),
                user_id: Some(fx.user_id),
                redirect_uri: "http://example.com".into(),
                scopes: ScopeSet::from([Scope::Read, Scope::PrivateRead]),
                expires_in: 3600,
                refresh: true,
            })
            .await
            .unwrap();
        token.refresh_token.unwrap()
    }

    fn refresh_request(refresh_token: &str, scope: &str) -> TokenRequest {
        TokenRequest {
            grant_type: "refresh_token".into(),
            refresh_token: refresh_token.into(),
            scope: scope.into(),
            client_id: "confidential".into(),
            client_secret: "secret".into(),
            ..TokenRequest::default()
        }
    }

    #[tokio::test]
    async fn test_rotation_narrows_and_retires_old_refresh() {
        let fx = Fixture::new().await;
        let old = seed_token(&fx, "confidential").await;

        let response = fx.engine.exchange(&refresh_request(&old, "private_read"), None).await.unwrap();
        assert_eq!(response.scope.as_deref(), Some("private_read"));
        let new_refresh = response.refresh_token.unwrap();
        assert_ne!(new_refresh, old);

        assert!(fx.store.get_token_by_refresh(&old).await.is_err());
        let token = fx.store.get_token_by_refresh(&new_refresh).await.unwrap();
        assert_eq!(token.user_id, Some(fx.user_id));

        let err = fx.engine.exchange(&refresh_request(&old, ""), None).await.unwrap_err();
        assert_eq!((err.status, err.code), (StatusCode::BAD_REQUEST, ErrorCode::InvalidGrant));
    }

    #[tokio::test]
    async fn test_refresh_cannot_widen() {
        let fx = Fixture::new().await;
        let old = seed_token(&fx, "confidential").await;

        let err = fx.engine.exchange(&refresh_request(&old, "write"), None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidScope);

        let response =
            fx.engine.exchange(&refresh_request(&old, "read write"), None).await.unwrap();
        assert_eq!(response.scope.as_deref(), Some("read"));
    }

    #[tokio::test]
    async fn test_same_scopes_omit_scope_field() {
        let fx = Fixture::new().await;
        let old = seed_token(&fx, "confidential").await;
        let response = fx.engine.exchange(&refresh_request(&old, ""), None).await.unwrap();
        assert_eq!(response.scope, None);
    }

    #[tokio::test]
    async fn test_confidential_client_must_authenticate() {
        let fx = Fixture::new().await;
        let old = seed_token(&fx, "confidential").await;

        let mut request = refresh_request(&old, "");
        request.client_secret = "wrong".into();
        let err = fx.engine.exchange(&request, None).await.unwrap_err();
        assert_eq!((err.status, err.code), (StatusCode::UNAUTHORIZED, ErrorCode::InvalidClient));

        // The failed attempt leaves the refresh token usable.
        assert!(fx.store.get_token_by_refresh(&old).await.is_ok());
    }

    #[tokio::test]
    async fn test_public_client_needs_no_authentication() {
        let fx = Fixture::new().await;
        let old = seed_token(&fx, "public").await;

        let mut request = refresh_request(&old, "");
        request.client_id = String::new();
        request.client_secret = String::new();
        assert!(fx.engine.exchange(&request, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_refresh_token() {
        let fx = Fixture::new().await;
        let err = fx.engine.exchange(&refresh_request("", ""), None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }
}
