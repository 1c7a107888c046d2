//! Authorization-code grant (RFC 6749 §4.1.3).

use chrono::Utc;

use super::{ClientCredentials, GrantEngine, TokenRequest, TokenResponse};
use crate::error::{ErrorCode, StoreError, TokenError, TokenResult};

impl GrantEngine {
    pub(super) async fn authorization_code(
        &self,
        request: &TokenRequest,
        basic: Option<ClientCredentials>,
    ) -> TokenResult<TokenResponse> {
        if request.code.is_empty() {
            return Err(TokenError::bad_request(ErrorCode::InvalidRequest)
                .with_description("code is required"));
        }

        // The record is gone once taken, so a replay fails here even when a
        // later check rejects this attempt.
        let record = match self.store.take_authorize(&request.code).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                return Err(TokenError::bad_request(ErrorCode::InvalidGrant));
            }
            Err(err) => return Err(err.into()),
        };

        if record.is_expired_at(Utc::now()) {
            return Err(TokenError::bad_request(ErrorCode::InvalidGrant)
                .with_description("authorization code expired"));
        }

        let client = self.find_client(&record.client_id).await?;
        let credentials = ClientCredentials::resolve(basic, request)?;
        if !credentials.authenticates(&client) {
            return Err(TokenError::unauthorized(ErrorCode::InvalidClient));
        }

        let redirect_matches = if record.redirect_uri.is_empty() {
            request.redirect_uri.is_empty()
        } else {
            request.redirect_uri == record.redirect_uri && request.redirect_uri == client.redirect_uri
        };
        if !redirect_matches {
            return Err(TokenError::unauthorized(ErrorCode::InvalidGrant)
                .with_description("redirect_uri mismatch"));
        }

        match record.validate_pkce(&request.code_verifier) {
            Ok(true) => {}
            Ok(false) => {
                return Err(TokenError::bad_request(ErrorCode::InvalidRequest)
                    .with_description("code_verifier mismatch"));
            }
            Err(err) => {
                tracing::debug!(error = %err, client_id = %client.id, "PKCE verification failed");
                return Err(TokenError::bad_request(ErrorCode::InvalidRequest));
            }
        }

        let user_id = Some(record.user_id);
        self.issue(&client, user_id, record.scopes, &record.original_scopes, true, &record.nonce)
            .await
    }
}
