//! Client authentication for the token endpoint.

use subtle::ConstantTimeEq;

use crate::error::{ErrorCode, TokenError, TokenResult};
use crate::model::Client;

use super::TokenRequest;

/// A `(client_id, client_secret)` pair presented by the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub id: String,
    pub secret: String,
}

impl ClientCredentials {
    #[must_use]
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { id: id.into(), secret: secret.into() }
    }

    /// Pick the credentials channel: HTTP Basic when present, else the body.
    ///
    /// Fails with `invalid_client` (400) when neither supplies a client id.
    pub fn resolve(basic: Option<Self>, request: &TokenRequest) -> TokenResult<Self> {
        let credentials = basic
            .unwrap_or_else(|| Self::new(request.client_id.as_str(), request.client_secret.as_str()));
        if credentials.id.is_empty() {
            return Err(TokenError::bad_request(ErrorCode::InvalidClient)
                .with_description("client_id is required"));
        }
        Ok(credentials)
    }

    /// Whether these credentials identify `client`.
    ///
    /// The secret is only compared for confidential clients.
    #[must_use]
    pub fn authenticates(&self, client: &Client) -> bool {
        self.id == client.id && self.secret_matches(client)
    }

    /// Secret check alone, for grants that looked the client up by this id.
    #[must_use]
    pub fn secret_matches(&self, client: &Client) -> bool {
        !client.confidential || secrets_equal(&self.secret, &client.secret)
    }
}

/// Constant-time comparison of a presented secret with the stored one.
fn secrets_equal(presented: &str, stored: &str) -> bool {
    presented.as_bytes().ct_eq(stored.as_bytes()).into()
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::scope::ScopeSet;

    fn client(confidential: bool) -> Client {
        Client {
            id: "client".into(),
            name: "test".into(),
            description: String::new(),
            confidential,
            creator_id: Uuid::nil(),
            secret: "secret".into(),
            redirect_uri: String::new(),
            scopes: ScopeSet::new(),
        }
    }

    #[test]
    fn test_basic_wins_over_body() {
        let request = TokenRequest {
            client_id: "body".into(),
            client_secret: "body-secret".into(),
            ..TokenRequest::default()
        };
        let resolved =
            ClientCredentials::resolve(Some(ClientCredentials::new("basic", "pw")), &request)
                .unwrap();
        assert_eq!(resolved, ClientCredentials::new("basic", "pw"));

        let resolved = ClientCredentials::resolve(None, &request).unwrap();
        assert_eq!(resolved, ClientCredentials::new("body", "body-secret"));
    }

    #[test]
    fn test_missing_client_id() {
        let err = ClientCredentials::resolve(None, &TokenRequest::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_authenticates() {
        let confidential = client(true);
        assert!(ClientCredentials::new("client", "secret").authenticates(&confidential));
        assert!(!ClientCredentials::new("client", "wrong").authenticates(&confidential));
        assert!(!ClientCredentials::new("other", "secret").authenticates(&confidential));

        // A public client's secret is never consulted.
        let public = client(false);
        assert!(ClientCredentials::new("client", "anything").authenticates(&public));
        assert!(!ClientCredentials::new("other", "").authenticates(&public));
    }

    #[test]
    fn test_secret_comparison() {
        let confidential = client(true);
        assert!(ClientCredentials::new("client", "secret").secret_matches(&confidential));
        for wrong in ["", "secre", "secret ", "Secret", "secretsecret"] {
            let presented = ClientCredentials::new("client", wrong);
            assert!(!presented.secret_matches(&confidential), "{wrong:?}");
        }
        assert!(secrets_equal("", ""));
        assert!(!secrets_equal("a", "b"));
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", ClientCredentials::new("client", "hunter2"));
        assert!(debug.contains("client"));
        assert!(!debug.contains("hunter2"));
    }
}
