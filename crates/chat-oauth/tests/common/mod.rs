//! Shared fixtures for HTTP-level tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use tower::ServiceExt;
use uuid::Uuid;

use chat_oauth::error::{StoreError, StoreResult};
use chat_oauth::model::{AccessToken, AuthorizationRecord, Client};
use chat_oauth::server::create_router;
use chat_oauth::store::{IssueParams, PurgeReport};
use chat_oauth::{
    Config, JwtSigningKeys, MemoryDirectory, MemorySessionStore, MemoryStore, OAuthStore, Scope,
    ScopeSet,
};

pub const ORIGIN: &str = "http://localhost:3000";
pub const REDIRECT_URI: &str = "http://example.com";
pub const FORM: &str = "application/x-www-form-urlencoded";
/// HS256 secret the test router signs ID tokens with.
pub const ID_TOKEN_SECRET: &[u8] = b"integration-id-token-secret";

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub sessions: MemorySessionStore,
    pub directory: MemoryDirectory,
    pub user_id: Uuid,
}

impl TestApp {
    /// Router over in-memory collaborators, seeded with the `confidential`,
    /// `public` and `oidc` clients and user `alice`.
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let sessions = MemorySessionStore::new();
        let directory = MemoryDirectory::with_cost(4);
        let user_id = directory.add_user("alice", "hunter2", "user").await.unwrap();

        store
            .save_client(client(
                "confidential",
                "secret",
                ScopeSet::from([Scope::Read, Scope::PrivateRead]),
            ))
            .await
            .unwrap();
        store
            .save_client(client("public", "", ScopeSet::from([Scope::Read, Scope::Write])))
            .await
            .unwrap();
        store
            .save_client(client(
                "oidc",
                "oidc-secret",
                ScopeSet::from([Scope::OpenId, Scope::Profile, Scope::Read]),
            ))
            .await
            .unwrap();

        let router = create_router(
            &Config::for_testing(ORIGIN),
            Arc::new(store.clone()),
            Arc::new(sessions.clone()),
            Arc::new(directory.clone()),
            Arc::new(JwtSigningKeys::hmac(ID_TOKEN_SECRET)),
        );
        Self { router, store, sessions, directory, user_id }
    }

    pub async fn login(&self) -> String {
        self.sessions.create_session(Some(self.user_id)).await
    }

    pub async fn get(&self, uri: &str, session: Option<&str>) -> Response<Body> {
        let mut request = Request::get(uri);
        if let Some(session) = session {
            request = request.header(header::COOKIE, format!("r_session={session}"));
        }
        self.router.clone().oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    pub async fn post_form(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        headers: &[(header::HeaderName, String)],
    ) -> Response<Body> {
        let mut request = Request::post(uri).header(header::CONTENT_TYPE, FORM);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let body = serde_urlencoded::to_string(fields).unwrap();
        self.router.clone().oneshot(request.body(Body::from(body)).unwrap()).await.unwrap()
    }

    pub async fn token(
        &self,
        fields: &[(&str, &str)],
        basic: Option<(&str, &str)>,
    ) -> Response<Body> {
        let headers: Vec<_> = basic
            .map(|(id, secret)| (header::AUTHORIZATION, basic_auth(id, secret)))
            .into_iter()
            .collect();
        self.post_form("/oauth2/token", fields, &headers).await
    }
}

pub fn client(id: &str, secret: &str, scopes: ScopeSet) -> Client {
    Client {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        confidential: !secret.is_empty(),
        creator_id: Uuid::new_v4(),
        secret: secret.to_string(),
        redirect_uri: REDIRECT_URI.to_string(),
        scopes,
    }
}

pub fn authorization_record(code: &str, user_id: Uuid) -> AuthorizationRecord {
    let scopes = ScopeSet::from([Scope::Read, Scope::PrivateRead]);
    AuthorizationRecord {
        code: code.to_string(),
        client_id: "confidential".to_string(),
        user_id,
        created_at: Utc::now(),
        expires_in: 300,
        redirect_uri: REDIRECT_URI.to_string(),
        original_scopes: scopes.clone(),
        scopes,
        code_challenge: String::new(),
        code_challenge_method: String::new(),
        nonce: String::new(),
    }
}

pub fn basic_auth(id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION].to_str().unwrap().to_string()
}

/// Query parameters of a `Location`, which may be relative.
pub fn query_pairs(location: &str) -> HashMap<String, String> {
    let url = url::Url::parse(ORIGIN).unwrap().join(location).unwrap();
    url.query_pairs().into_owned().collect()
}

/// A store whose backend is down.
pub struct FailingStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::backend("connection refused"))
}

#[async_trait]
impl OAuthStore for FailingStore {
    async fn get_client(&self, _id: &str) -> StoreResult<Client> {
        down()
    }

    async fn get_clients_by_creator(&self, _creator_id: Uuid) -> StoreResult<Vec<Client>> {
        down()
    }

    async fn save_client(&self, _client: Client) -> StoreResult<()> {
        down()
    }

    async fn update_client(&self, _client: Client) -> StoreResult<()> {
        down()
    }

    async fn delete_client(&self, _id: &str) -> StoreResult<()> {
        down()
    }

    async fn save_authorize(&self, _record: AuthorizationRecord) -> StoreResult<()> {
        down()
    }

    async fn get_authorize(&self, _code: &str) -> StoreResult<AuthorizationRecord> {
        down()
    }

    async fn delete_authorize(&self, _code: &str) -> StoreResult<()> {
        down()
    }

    async fn issue_token(&self, _params: IssueParams) -> StoreResult<AccessToken> {
        down()
    }

    async fn get_token_by_id(&self, _id: Uuid) -> StoreResult<AccessToken> {
        down()
    }

    async fn get_token_by_access(&self, _access_token: &str) -> StoreResult<AccessToken> {
        down()
    }

    async fn get_token_by_refresh(&self, _refresh_token: &str) -> StoreResult<AccessToken> {
        down()
    }

    async fn get_tokens_by_user(&self, _user_id: Uuid) -> StoreResult<Vec<AccessToken>> {
        down()
    }

    async fn get_tokens_by_client(&self, _client_id: &str) -> StoreResult<Vec<AccessToken>> {
        down()
    }

    async fn delete_token_by_id(&self, _id: Uuid) -> StoreResult<()> {
        down()
    }

    async fn delete_token_by_access(&self, _access_token: &str) -> StoreResult<()> {
        down()
    }

    async fn delete_token_by_refresh(&self, _refresh_token: &str) -> StoreResult<()> {
        down()
    }

    async fn delete_token_by_user(&self, _user_id: Uuid) -> StoreResult<()> {
        down()
    }

    async fn delete_token_by_client(&self, _client_id: &str) -> StoreResult<()> {
        down()
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> StoreResult<PurgeReport> {
        down()
    }
}

/// Router over [`FailingStore`].
pub fn failing_router() -> Router {
    create_router(
        &Config::for_testing(ORIGIN),
        Arc::new(FailingStore),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryDirectory::new()),
        Arc::new(JwtSigningKeys::hmac(ID_TOKEN_SECRET)),
    )
}
