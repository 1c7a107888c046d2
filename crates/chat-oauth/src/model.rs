//! OAuth domain types: clients, authorization records and access tokens.

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::error::PkceError;
use crate::pkce;
use crate::scope::ScopeSet;

/// A registered third-party application.
#[derive(Clone, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Confidential clients authenticate with `secret`; public ones do not.
    pub confidential: bool,
    pub creator_id: Uuid,
    pub secret: String,
    /// The single pre-registered redirect URI. Empty disables redirect flows.
    pub redirect_uri: String,
    /// The most this client may ever be granted.
    pub scopes: ScopeSet,
}

impl Client {
    /// Whether the client can take part in redirect-based flows.
    #[must_use]
    pub fn has_redirect_uri(&self) -> bool {
        !self.redirect_uri.is_empty()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("confidential", &self.confidential)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes.to_string())
            .finish()
    }
}

fn deadline(created_at: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(expires_in).and_then(|ttl| created_at.checked_add_signed(ttl))
}

/// A user's consent, redeemable once for an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRecord {
    pub code: String,
    pub client_id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Redirect URI as sent in the authorization request, possibly empty.
    pub redirect_uri: String,
    /// Scopes granted after narrowing.
    pub scopes: ScopeSet,
    /// Scopes as originally requested.
    pub original_scopes: ScopeSet,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub nonce: String,
}

impl AuthorizationRecord {
    /// `created_at + expires_in`, or `None` when that is not representable.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        deadline(self.created_at, self.expires_in)
    }

    /// Expired once `now` passes the deadline. A row without a
    /// representable deadline counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_none_or(|deadline| deadline < now)
    }

    /// Check a code verifier against the recorded challenge.
    pub fn validate_pkce(&self, verifier: &str) -> Result<bool, PkceError> {
        pkce::validate(&self.code_challenge, &self.code_challenge_method, verifier)
    }
}

/// A bearer credential and its optional refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub id: Uuid,
    pub client_id: String,
    /// `None` for client-credentials tokens.
    pub user_id: Option<Uuid>,
    pub redirect_uri: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scopes: ScopeSet,
    /// Lifetime in seconds.
    pub expires_in: i64,
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    /// `created_at + expires_in`, or `None` when that is not representable.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        deadline(self.created_at, self.expires_in)
    }

    /// Expired once `now` passes the deadline. A row without a
    /// representable deadline counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_none_or(|deadline| deadline < now)
    }

    /// Whether this token can be exchanged at the refresh grant.
    #[must_use]
    pub fn is_refresh_enabled(&self) -> bool {
        self.refresh_token.is_some()
    }
}
