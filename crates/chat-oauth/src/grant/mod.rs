//! Grant engine behind the token endpoint.
//!
//! Implements the four grants (RFC 6749 §4.1, §4.3, §4.4 and §6):
//! - `authorization_code`, with PKCE (RFC 7636)
//! - `password`
//! - `client_credentials`
//! - `refresh_token`, with rotation
//!
//! Each grant validates its inputs, authenticates the client, narrows the
//! requested scopes and asks the store for a new token. User-bound grants
//! carrying `openid` also get a signed ID token and never a refresh token.

mod authorization_code;
mod client_auth;
mod client_credentials;
mod password;
mod refresh;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::directory::UserDirectory;
use crate::error::{ErrorCode, StoreError, TokenError, TokenResult};
use crate::id_token::{IdTokenClaims, ProfileClaims, SigningKeys};
use crate::model::{AccessToken, Client};
use crate::scope::{self, Scope, ScopeSet};
use crate::store::{IssueParams, OAuthStore};

pub use client_auth::ClientCredentials;

/// `token_type` of every issued token.
pub const TOKEN_TYPE: &str = "Bearer";

/// Grant types accepted at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    Password,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    pub const ALL: [Self; 4] =
        [Self::AuthorizationCode, Self::Password, Self::ClientCredentials, Self::RefreshToken];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Password => "password",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl FromStr for GrantType {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| TokenError::bad_request(ErrorCode::UnsupportedGrantType))
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form body of a token request. Absent fields decode as empty strings.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub code_verifier: String,
    pub username: String,
    pub password: String,
    pub scope: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Successful token response (RFC 6749 §5.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Build the response for a freshly issued token.
    ///
    /// `scope` is reported only when the granted set differs in size from
    /// `compared_to`.
    #[must_use]
    pub fn for_token(token: &AccessToken, compared_to: &ScopeSet) -> Self {
        Self {
            access_token: token.access_token.clone(),
            token_type: TOKEN_TYPE.to_string(),
            expires_in: token.expires_in,
            refresh_token: token.refresh_token.clone(),
            scope: (token.scopes.len() != compared_to.len()).then(|| token.scopes.to_string()),
            id_token: None,
        }
    }
}

/// Token lifetimes, refresh policy and the ID token issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantSettings {
    pub access_token_exp: i64,
    pub is_refresh_enabled: bool,
    /// `iss` of ID tokens; also the base of profile picture URLs.
    pub issuer: String,
}

impl From<&Config> for GrantSettings {
    fn from(config: &Config) -> Self {
        Self {
            access_token_exp: config.access_token_exp,
            is_refresh_enabled: config.is_refresh_enabled,
            issuer: config.origin.clone(),
        }
    }
}

/// Per-request token endpoint logic.
pub struct GrantEngine {
    store: Arc<dyn OAuthStore>,
    directory: Arc<dyn UserDirectory>,
    keys: Arc<dyn SigningKeys>,
    settings: GrantSettings,
}

impl GrantEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn OAuthStore>,
        directory: Arc<dyn UserDirectory>,
        keys: Arc<dyn SigningKeys>,
        settings: GrantSettings,
    ) -> Self {
        Self { store, directory, keys, settings }
    }

    /// Run a token request.
    ///
    /// `basic` carries client credentials from an `Authorization: Basic`
    /// header; when absent the body fields are consulted.
    pub async fn exchange(
        &self,
        request: &TokenRequest,
        basic: Option<ClientCredentials>,
    ) -> TokenResult<TokenResponse> {
        let grant_type: GrantType = request.grant_type.parse().inspect_err(|_| {
            tracing::debug!(grant_type = %request.grant_type, "Unsupported grant type");
        })?;

        let result = match grant_type {
            GrantType::AuthorizationCode => self.authorization_code(request, basic).await,
            GrantType::Password => self.password(request, basic).await,
            GrantType::ClientCredentials => self.client_credentials(request, basic).await,
            GrantType::RefreshToken => self.refresh_token(request, basic).await,
        };

        if let Err(ref err) = result {
            if err.code != ErrorCode::ServerError {
                tracing::debug!(grant_type = %grant_type, error = %err.code, "Token request rejected");
            }
        }
        result
    }

    async fn find_client(&self, id: &str) -> TokenResult<Client> {
        match self.store.get_client(id).await {
            Ok(client) => Ok(client),
            Err(StoreError::NotFound) => Err(TokenError::bad_request(ErrorCode::InvalidClient)),
            Err(err) => Err(err.into()),
        }
    }

    fn issue_params(
        &self,
        client: &Client,
        user_id: Option<Uuid>,
        scopes: ScopeSet,
        refresh_allowed: bool,
    ) -> IssueParams {
        let refresh = self.settings.is_refresh_enabled
            && refresh_allowed
            && !scopes.contains(Scope::OpenId);
        IssueParams {
            client_id: client.id.clone(),
            user_id,
            redirect_uri: client.redirect_uri.clone(),
            scopes,
            expires_in: self.settings.access_token_exp,
            refresh,
        }
    }

    /// Issue a token and build the response. `nonce` is echoed into the ID
    /// token when non-empty.
    async fn issue(
        &self,
        client: &Client,
        user_id: Option<Uuid>,
        scopes: ScopeSet,
        compared_to: &ScopeSet,
        refresh_allowed: bool,
        nonce: &str,
    ) -> TokenResult<TokenResponse> {
        let params = self.issue_params(client, user_id, scopes, refresh_allowed);
        let token = self.store.issue_token(params).await?;

        tracing::info!(
            client_id = %client.id,
            user_id = ?user_id,
            scopes = %token.scopes,
            "Issued access token"
        );
        self.respond(client, &token, compared_to, nonce).await
    }

    async fn respond(
        &self,
        client: &Client,
        token: &AccessToken,
        compared_to: &ScopeSet,
        nonce: &str,
    ) -> TokenResult<TokenResponse> {
        let mut response = TokenResponse::for_token(token, compared_to);
        if let Some(user_id) = token.user_id.filter(|_| token.scopes.contains(Scope::OpenId)) {
            response.id_token = Some(self.id_token(client, user_id, token, nonce).await?);
        }
        Ok(response)
    }

    async fn id_token(
        &self,
        client: &Client,
        user_id: Uuid,
        token: &AccessToken,
        nonce: &str,
    ) -> TokenResult<String> {
        let profile = if token.scopes.contains(Scope::Profile) {
            let user = self.directory.get_user(user_id).await?;
            Some(ProfileClaims::for_user(&user, &self.settings.issuer))
        } else {
            None
        };

        let iat = token.created_at.timestamp();
        let claims = IdTokenClaims {
            iss: self.settings.issuer.clone(),
            sub: user_id.to_string(),
            aud: client.id.clone(),
            exp: iat.saturating_add(token.expires_in),
            iat,
            nonce: (!nonce.is_empty()).then(|| nonce.to_string()),
            profile,
        };
        Ok(self.keys.sign_id_token(&claims)?)
    }
}

impl fmt::Debug for GrantEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantEngine").field("settings", &self.settings).finish()
    }
}

fn parse_scope(text: &str) -> TokenResult<ScopeSet> {
    ScopeSet::parse(text).map_err(|err| {
        tracing::debug!(error = %err, "Rejected scope");
        TokenError::bad_request(ErrorCode::InvalidScope)
    })
}

fn narrow_scope(requested: &ScopeSet, allowed: &ScopeSet) -> TokenResult<ScopeSet> {
    scope::narrow(requested, allowed).ok_or(TokenError::bad_request(ErrorCode::InvalidScope))
}

#[cfg(test)]
pub(super) mod fixtures {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use super::{GrantEngine, GrantSettings};
    use crate::directory::MemoryDirectory;
    use crate::id_token::JwtSigningKeys;
    use crate::model::{AuthorizationRecord, Client};
    use crate::scope::{Scope, ScopeSet};
    use crate::store::{MemoryStore, OAuthStore};

    pub const ISSUER: &str = "https://q.example.com";
    pub const SIGNING_SECRET: &[u8] = b"grant-fixture-secret";

    pub struct Fixture {
        pub engine: GrantEngine,
        pub store: MemoryStore,
        pub directory: MemoryDirectory,
        pub user_id: Uuid,
    }

    impl Fixture {
        /// Store seeded with a `confidential`, a `public` and an `oidc` client
        /// plus user `alice`.
        pub async fn new() -> Self {
            let store = MemoryStore::new();
            let directory = MemoryDirectory::with_cost(4);
            let user_id = directory.add_user("alice", "hunter2", "user").await.unwrap();

            store
                .save_client(Client {
                    id: "confidential".into(),
                    name: "Confidential".into(),
                    description: String::new(),
                    confidential: true,
                    creator_id: Uuid::new_v4(),
                    secret: "secret".into(),
                    redirect_uri: "http://example.com".into(),
                    scopes: ScopeSet::from([Scope::Read, Scope::PrivateRead]),
                })
                .await
                .unwrap();
            store
                .save_client(Client {
                    id: "public".into(),
                    name: "Public".into(),
                    description: String::new(),
                    confidential: false,
                    creator_id: Uuid::new_v4(),
                    secret: String::new(),
                    redirect_uri: "http://example.com".into(),
                    scopes: ScopeSet::from([Scope::Read, Scope::Write]),
                })
                .await
                .unwrap();
            store
                .save_client(Client {
                    id: "oidc".into(),
                    name: "Relying Party".into(),
                    description: String::new(),
                    confidential: false,
                    creator_id: Uuid::new_v4(),
                    secret: String::new(),
                    redirect_uri: "http://example.com".into(),
                    scopes: ScopeSet::from([Scope::OpenId, Scope::Profile, Scope::Read]),
                })
                .await
                .unwrap();

            let settings = GrantSettings {
                access_token_exp: 3600,
                is_refresh_enabled: true,
                issuer: ISSUER.into(),
            };
            let engine = GrantEngine::new(
                Arc::new(store.clone()),
                Arc::new(directory.clone()),
                Arc::new(JwtSigningKeys::hmac(SIGNING_SECRET)),
                settings,
            );
            Self { engine, store, directory, user_id }
        }
    }

    pub fn authorization_record(code: &str, client_id: &str) -> AuthorizationRecord {
        let scopes = ScopeSet::from([Scope::Read, Scope::PrivateRead]);
        AuthorizationRecord {
            code: code.into(),
            client_id: client_id.into(),
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            expires_in: 300,
            redirect_uri: "http://example.com".into(),
            original_scopes: scopes.clone(),
            scopes,
            code_challenge: String::new(),
            code_challenge_method: String::new(),
            nonce: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::scope::Scope;

    #[test]
    fn test_grant_type_parse() {
        assert_eq!("refresh_token".parse::<GrantType>().unwrap(), GrantType::RefreshToken);
        let err = "implicit".parse::<GrantType>().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedGrantType);
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_response_scope_only_on_cardinality_change() {
        let token = AccessToken {
            id: Uuid::new_v4(),
            client_id: "c".into(),
            user_id: None,
            redirect_uri: String::new(),
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            scopes: ScopeSet::from([Scope::Read, Scope::PrivateRead]),
            expires_in: 3600,
            created_at: Utc::now(),
        };

        let same = TokenResponse::for_token(&token, &ScopeSet::from([Scope::Read, Scope::Write]));
        assert_eq!(same.scope, None);
        assert_eq!(same.token_type, "Bearer");
        assert_eq!(same.refresh_token.as_deref(), Some("rt"));

        let wider = ScopeSet::from([Scope::Read, Scope::PrivateRead, Scope::Write]);
        let narrowed = TokenResponse::for_token(&token, &wider);
        assert_eq!(narrowed.scope.as_deref(), Some("read private_read"));
    }

    #[test]
    fn test_response_serialization_keeps_expires_in() {
        let response = TokenResponse {
            access_token: "at".into(),
            token_type: TOKEN_TYPE.into(),
            expires_in: 0,
            refresh_token: None,
            scope: None,
            id_token: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"access_token": "at", "token_type": "Bearer", "expires_in": 0}));
    }

    #[tokio::test]
    async fn test_openid_grant_signs_id_token_without_refresh() {
        let fx = fixtures::Fixture::new().await;
        let request = TokenRequest {
            grant_type: "password".into(),
            client_id: "oidc".into(),
            username: "alice".into(),
            password: "hunter2".into(),
            scope: "openid profile".into(),
            ..TokenRequest::default()
        };
        let response = fx.engine.exchange(&request, None).await.unwrap();
        assert_eq!(response.refresh_token, None);

        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_audience(&["oidc"]);
        let key = jsonwebtoken::DecodingKey::from_secret(fixtures::SIGNING_SECRET);
        let claims = jsonwebtoken::decode::<IdTokenClaims>(
            response.id_token.as_deref().unwrap(),
            &key,
            &validation,
        )
        .unwrap()
        .claims;
        assert_eq!(claims.iss, fixtures::ISSUER);
        assert_eq!(claims.sub, fx.user_id.to_string());
        assert_eq!(claims.profile.unwrap().name, "alice");

        let request = TokenRequest { scope: "read".into(), ..request };
        let response = fx.engine.exchange(&request, None).await.unwrap();
        assert!(response.refresh_token.is_some());
        assert_eq!(response.id_token, None);
    }

    #[test]
    fn test_token_request_debug_hides_secrets() {
        let request = TokenRequest {
            grant_type: "password".into(),
            password: "hunter2".into(),
            client_secret: "s3cret".into(),
            ..TokenRequest::default()
        };
        let debug = format!("{request:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cret"));
    }
}
