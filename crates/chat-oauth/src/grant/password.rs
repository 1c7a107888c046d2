//! Resource-owner password credentials grant (RFC 6749 §4.3).

use super::{ClientCredentials, GrantEngine, TokenRequest, TokenResponse, narrow_scope, parse_scope};
use crate::error::{ErrorCode, TokenError, TokenResult};

impl GrantEngine {
    pub(super) async fn password(
        &self,
        request: &TokenRequest,
        basic: Option<ClientCredentials>,
    ) -> TokenResult<TokenResponse> {
        let credentials = ClientCredentials::resolve(basic, request)?;
        let client = self.find_client(&credentials.id).await?;
        if !credentials.secret_matches(&client) {
            return Err(TokenError::unauthorized(ErrorCode::InvalidClient));
        }

        if request.username.is_empty() {
            return Err(TokenError::bad_request(ErrorCode::InvalidRequest)
                .with_description("username is required"));
        }
        let user_id = self.directory.authenticate(&request.username, &request.password).await?;

        let requested = parse_scope(&request.scope)?;
        let valid = narrow_scope(&requested, &client.scopes)?;

        self.issue(&client, Some(user_id), valid, &requested, true, "").await
    }
}
