//! Client-credentials grant (RFC 6749 §4.4).

use super::{ClientCredentials, GrantEngine, TokenRequest, TokenResponse, narrow_scope, parse_scope};
use crate::error::{ErrorCode, TokenError, TokenResult};

impl GrantEngine {
    pub(super) async fn client_credentials(
        &self,
        request: &TokenRequest,
        basic: Option<ClientCredentials>,
    ) -> TokenResult<TokenResponse> {
        let credentials = ClientCredentials::resolve(basic, request)?;
        let client = self.find_client(&credentials.id).await?;
        if !client.confidential {
            return Err(TokenError::unauthorized(ErrorCode::UnauthorizedClient));
        }
        if !credentials.secret_matches(&client) {
            return Err(TokenError::unauthorized(ErrorCode::InvalidClient));
        }

        let requested = parse_scope(&request.scope)?;
        let valid = narrow_scope(&requested, &client.scopes)?;

        // No user behind the token and never a refresh token.
        self.issue(&client, None, valid, &requested, false, "").await
    }
}
