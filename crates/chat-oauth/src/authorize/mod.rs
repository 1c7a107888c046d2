//! Authorization and consent endpoints (RFC 6749 §4.1.1, OpenID Connect Core §3.1.2).
//!
//! [`AuthorizationFlow::authorize`] validates a request against the
//! client registration, then either sends the user agent to the login page,
//! parks the request in the session and sends it to the consent page, or
//! (for `prompt=none`) mints a code straight away.
//! [`AuthorizationFlow::decide`] picks the parked request back up once the
//! user has approved or denied it.
//!
//! Once the client's registered redirect URI is known, every failure is
//! reported by redirecting there with `error` and the request's `state`.

mod response_type;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;
use url::form_urlencoded;
use uuid::Uuid;

use crate::config::Config;
use crate::directory::{UserDirectory, UserInfo};
use crate::error::{DirectoryError, ErrorCode, FlowError, StoreError, StoreResult};
use crate::model::{AuthorizationRecord, Client};
use crate::pkce::{self, CodeChallengeMethod};
use crate::scope::{self, ScopeSet};
use crate::session::{AUTHORIZATION_SLOT, Session, SessionStore, SessionValue};
use crate::store::{self, MAX_ISSUE_ATTEMPTS, OAuthStore};

pub use response_type::ResponseTypes;

/// `submit` value that approves a pending request.
pub const APPROVE: &str = "approve";

/// Parameters of an authorization request, from the query string or a form body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub nonce: String,
    pub prompt: String,
}

impl AuthorizeParams {
    /// Re-encode as a query string. Empty optional fields are left out.
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (name, value) in [
            ("response_type", &self.response_type),
            ("client_id", &self.client_id),
            ("redirect_uri", &self.redirect_uri),
            ("scope", &self.scope),
            ("state", &self.state),
            ("code_challenge", &self.code_challenge),
            ("code_challenge_method", &self.code_challenge_method),
            ("nonce", &self.nonce),
            ("prompt", &self.prompt),
        ] {
            if name == "client_id" || !value.is_empty() {
                query.append_pair(name, value);
            }
        }
        query.finish()
    }
}

/// An authorization request waiting for the user's decision.
///
/// Lives only in the server-side session, so the user agent cannot alter
/// `access_time` or the granted scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub client_id: String,
    /// As sent by the client; may be empty.
    pub redirect_uri: String,
    pub state: String,
    /// Scopes as requested.
    pub scopes: ScopeSet,
    /// Scopes that will be granted.
    pub valid_scopes: ScopeSet,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub nonce: String,
    pub access_time: DateTime<Utc>,
}

impl PendingAuthorization {
    fn into_record(
        self,
        code: String,
        user_id: Uuid,
        now: DateTime<Utc>,
        expires_in: i64,
    ) -> AuthorizationRecord {
        AuthorizationRecord {
            code,
            client_id: self.client_id,
            user_id,
            created_at: now,
            expires_in,
            redirect_uri: self.redirect_uri,
            scopes: self.valid_scopes,
            original_scopes: self.scopes,
            code_challenge: self.code_challenge,
            code_challenge_method: self.code_challenge_method,
            nonce: self.nonce,
        }
    }
}

/// A `302 Found` redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    location: String,
}

impl Found {
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self { location: location.into() }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl IntoResponse for Found {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.location)]).into_response()
    }
}

/// The client's registered redirect URI plus the `state` to echo.
struct RedirectTarget {
    base: Url,
    state: String,
}

impl RedirectTarget {
    fn for_client(client: &Client, state: &str) -> Result<Self, FlowError> {
        if !client.has_redirect_uri() {
            return Err(FlowError::Forbidden("invalid client"));
        }
        let base = Url::parse(&client.redirect_uri).map_err(|err| {
            tracing::warn!(client_id = %client.id, error = %err, "Unparsable registered redirect URI");
            FlowError::Forbidden("invalid client")
        })?;
        Ok(Self { base, state: state.to_string() })
    }

    fn with(&self, pairs: &[(&str, &str)]) -> Found {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            if !self.state.is_empty() {
                query.append_pair("state", &self.state);
            }
            for (name, value) in pairs {
                query.append_pair(name, value);
            }
        }
        Found::to(url)
    }

    fn error(&self, code: ErrorCode) -> Found {
        tracing::debug!(error = %code, "Authorization request rejected");
        self.with(&[("error", code.as_str())])
    }

    fn error_described(&self, code: ErrorCode, description: &str) -> Found {
        tracing::debug!(error = %code, description, "Authorization request rejected");
        self.with(&[("error", code.as_str()), ("error_description", description)])
    }

    fn code(&self, code: &str) -> Found {
        self.with(&[("code", code)])
    }
}

/// Paths and lifetimes used by the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    pub authorization_code_exp: i64,
    pub consent_timeout: Duration,
    pub login_path: String,
    pub consent_path: String,
}

impl From<&Config> for FlowSettings {
    fn from(config: &Config) -> Self {
        Self {
            authorization_code_exp: config.authorization_code_exp,
            consent_timeout: config.consent_timeout,
            login_path: config.login_path.clone(),
            consent_path: config.consent_path.clone(),
        }
    }
}

/// Authorization endpoint and consent endpoint logic.
pub struct AuthorizationFlow {
    store: Arc<dyn OAuthStore>,
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn UserDirectory>,
    settings: FlowSettings,
}

impl AuthorizationFlow {
    #[must_use]
    pub fn new(
        store: Arc<dyn OAuthStore>,
        sessions: Arc<dyn SessionStore>,
        directory: Arc<dyn UserDirectory>,
        settings: FlowSettings,
    ) -> Self {
        Self { store, sessions, directory, settings }
    }

    /// Handle `GET|POST /authorize`.
    ///
    /// `request_path` is the path the request arrived on; it is used to
    /// build the post-login return URL.
    pub async fn authorize(
        &self,
        params: &AuthorizeParams,
        session_token: Option<&str>,
        request_path: &str,
        now: DateTime<Utc>,
    ) -> Result<Found, FlowError> {
        if params.client_id.is_empty() {
            return Err(FlowError::BadRequest("client_id is required"));
        }
        let client = self.find_client(&params.client_id).await?;
        let target = RedirectTarget::for_client(&client, &params.state)?;
        if !params.redirect_uri.is_empty() && params.redirect_uri != client.redirect_uri {
            return Err(FlowError::BadRequest("invalid client"));
        }

        if !params.code_challenge_method.is_empty() || !params.code_challenge.is_empty() {
            let method_known =
                CodeChallengeMethod::parse_or_default(&params.code_challenge_method).is_ok();
            if !method_known || !pkce::is_valid_pkce_string(&params.code_challenge) {
                return Ok(target.error(ErrorCode::InvalidRequest));
            }
        }

        let requested = match ScopeSet::parse(&params.scope) {
            Ok(requested) => requested,
            Err(err) => {
                tracing::debug!(client_id = %client.id, error = %err, "Rejected scope");
                return Ok(target.error(ErrorCode::InvalidScope));
            }
        };
        let Some(valid) = scope::narrow(&requested, &client.scopes) else {
            return Ok(target.error(ErrorCode::InvalidScope));
        };

        match ResponseTypes::parse(&params.response_type) {
            Some(types) if types.is_code_only() => {}
            _ => return Ok(target.error(ErrorCode::UnsupportedResponseType)),
        }

        let pending = PendingAuthorization {
            client_id: client.id.clone(),
            redirect_uri: params.redirect_uri.clone(),
            state: params.state.clone(),
            scopes: requested,
            valid_scopes: valid,
            code_challenge: params.code_challenge.clone(),
            code_challenge_method: params.code_challenge_method.clone(),
            nonce: params.nonce.clone(),
            access_time: now,
        };

        let signed_in = match self.signed_in(session_token).await {
            Ok(signed_in) => signed_in,
            Err(_) => return Ok(target.error(ErrorCode::ServerError)),
        };

        match params.prompt.as_str() {
            "" => {}
            "none" => {
                let user = signed_in.as_ref().map(|(_, user)| user);
                return Ok(self.reauthorize_silently(pending, user, &target, now).await);
            }
            other => {
                let description = format!("prompt {other} is not supported");
                return Ok(target.error_described(ErrorCode::InvalidRequest, &description));
            }
        }

        let Some((session, _)) = signed_in else {
            return Ok(self.login_redirect(params, request_path));
        };

        let consent = self.consent_redirect(&pending);
        let slot = SessionValue::PendingAuthorization(pending);
        if let Err(err) = self.sessions.set_value(&session.token, AUTHORIZATION_SLOT, slot).await {
            tracing::error!(error = %err, "Failed to store pending authorization");
            return Ok(target.error(ErrorCode::ServerError));
        }
        Ok(consent)
    }

    /// Handle `POST /authorize/decide`.
    pub async fn decide(
        &self,
        submit: &str,
        session_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Found, FlowError> {
        if submit.is_empty() {
            return Err(FlowError::BadRequest("submit is required"));
        }

        let Some(session) = self.load_session(session_token).await? else {
            return Err(FlowError::Forbidden("bad session"));
        };
        let Some(user) = self.active_user(&session).await? else {
            return Err(FlowError::Unauthorized("you are not logged in"));
        };
        if user.is_bot() {
            return Err(FlowError::Forbidden("your bot is not permitted to access this API"));
        }

        let slot =
            self.sessions.take_value(&session.token, AUTHORIZATION_SLOT).await.map_err(|err| {
                tracing::error!(error = %err, "Failed to read pending authorization");
                FlowError::Internal
            })?;
        let Some(SessionValue::PendingAuthorization(pending)) = slot else {
            return Err(FlowError::Forbidden("bad session"));
        };

        let client = self.find_client(&pending.client_id).await?;
        let target = RedirectTarget::for_client(&client, &pending.state)?;

        let timed_out = (now - pending.access_time)
            .to_std()
            .is_ok_and(|elapsed| elapsed > self.settings.consent_timeout);
        if timed_out {
            return Ok(target.error_described(ErrorCode::AccessDenied, "timeout"));
        }
        if submit != APPROVE {
            return Ok(target.error(ErrorCode::AccessDenied));
        }

        Ok(self.grant_code(pending, user.id, &target, now).await)
    }

    async fn reauthorize_silently(
        &self,
        pending: PendingAuthorization,
        user: Option<&UserInfo>,
        target: &RedirectTarget,
        now: DateTime<Utc>,
    ) -> Found {
        let Some(user) = user else {
            return target.error(ErrorCode::LoginRequired);
        };

        let tokens = match self.store.get_tokens_by_user(user.id).await {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::error!(error = %err, "Failed to list tokens for silent authorization");
                return target.error(ErrorCode::ServerError);
            }
        };
        let consented = tokens.iter().any(|token| {
            token.client_id == pending.client_id
                && !token.is_expired_at(now)
                && token.scopes.is_superset_of(&pending.scopes)
        });
        if !consented {
            return target.error(ErrorCode::ConsentRequired);
        }

        self.grant_code(pending, user.id, target, now).await
    }

    async fn grant_code(
        &self,
        pending: PendingAuthorization,
        user_id: Uuid,
        target: &RedirectTarget,
        now: DateTime<Utc>,
    ) -> Found {
        let client_id = pending.client_id.clone();
        match self.mint_code(pending, user_id, now).await {
            Ok(code) => {
                tracing::info!(client_id = %client_id, user_id = %user_id, "Issued authorization code");
                target.code(&code)
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to save authorization record");
                target.error(ErrorCode::ServerError)
            }
        }
    }

    async fn mint_code(
        &self,
        pending: PendingAuthorization,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<String> {
        let mut attempt = 1;
        loop {
            let code = store::generate_token()?;
            let record = pending.clone().into_record(
                code.clone(),
                user_id,
                now,
                self.settings.authorization_code_exp,
            );
            match self.store.save_authorize(record).await {
                Ok(()) => return Ok(code),
                Err(StoreError::Conflict(_)) if attempt < MAX_ISSUE_ATTEMPTS => {
                    tracing::warn!(attempt, "Authorization code collision, regenerating");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn login_redirect(&self, params: &AuthorizeParams, request_path: &str) -> Found {
        let current = format!("{request_path}?{}", params.to_query());
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect", &current)
            .finish();
        Found::to(format!("{}?{query}", self.settings.login_path))
    }

    fn consent_redirect(&self, pending: &PendingAuthorization) -> Found {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("client_id", &pending.client_id)
            .append_pair("scopes", &pending.valid_scopes.to_string());
        if !pending.state.is_empty() {
            query.append_pair("state", &pending.state);
        }
        Found::to(format!("{}?{}", self.settings.consent_path, query.finish()))
    }

    async fn find_client(&self, id: &str) -> Result<Client, FlowError> {
        match self.store.get_client(id).await {
            Ok(client) => Ok(client),
            Err(StoreError::NotFound) => Err(FlowError::BadRequest("unknown client")),
            Err(err) => {
                tracing::error!(error = %err, client_id = %id, "Failed to load client");
                Err(FlowError::Internal)
            }
        }
    }

    async fn load_session(&self, token: Option<&str>) -> Result<Option<Session>, FlowError> {
        let Some(token) = token else {
            return Ok(None);
        };
        self.sessions.get_session(token).await.map_err(|err| {
            tracing::error!(error = %err, "Failed to load session");
            FlowError::Internal
        })
    }

    /// The session's user, if any and still active.
    async fn active_user(&self, session: &Session) -> Result<Option<UserInfo>, FlowError> {
        let Some(user_id) = session.user_id else {
            return Ok(None);
        };
        match self.directory.get_user(user_id).await {
            Ok(user) if user.is_active() => Ok(Some(user)),
            Ok(_) | Err(DirectoryError::NotFound | DirectoryError::InvalidCredentials) => Ok(None),
            Err(err) => {
                tracing::error!(error = %err, user_id = %user_id, "Failed to load session user");
                Err(FlowError::Internal)
            }
        }
    }

    async fn signed_in(
        &self,
        token: Option<&str>,
    ) -> Result<Option<(Session, UserInfo)>, FlowError> {
        let Some(session) = self.load_session(token).await? else {
            return Ok(None);
        };
        Ok(self.active_user(&session).await?.map(|user| (session, user)))
    }
}

impl std::fmt::Debug for AuthorizationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationFlow").field("settings", &self.settings).finish()
    }
}
