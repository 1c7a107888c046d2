//! Persistence contract for clients, authorization records and tokens.
//!
//! [`OAuthStore`] is the seam between the grant engine and authorization
//! flow on one side and a backing database on the other. [`MemoryStore`]
//! is the in-process implementation.

mod memory;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::{AccessToken, AuthorizationRecord, Client};
use crate::scope::ScopeSet;

pub use memory::MemoryStore;

/// Attempts at minting a unique token string before giving up.
pub const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Generate a random opaque token: 256 bits, URL-safe base64 without padding.
pub fn generate_token() -> StoreResult<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| StoreError::backend(format!("getrandom: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Parameters for minting an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueParams {
    pub client_id: String,
    pub user_id: Option<Uuid>,
    pub redirect_uri: String,
    pub scopes: ScopeSet,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Whether a refresh token is minted alongside.
    pub refresh: bool,
}

/// Rows removed by a housekeeping run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub authorizations: usize,
    pub tokens: usize,
}

#[async_trait]
pub trait OAuthStore: Send + Sync {
    // ─── Clients ─────────────────────────────────────────────────────────────

    async fn get_client(&self, id: &str) -> StoreResult<Client>;

    async fn get_clients_by_creator(&self, creator_id: Uuid) -> StoreResult<Vec<Client>>;

    /// Insert a client. Fails with `Conflict` if the id is taken.
    async fn save_client(&self, client: Client) -> StoreResult<()>;

    /// Replace an existing client. Fails with `NotFound` if absent.
    async fn update_client(&self, client: Client) -> StoreResult<()>;

    /// Delete a client together with its authorization records and tokens.
    async fn delete_client(&self, id: &str) -> StoreResult<()>;

    // ─── Authorization records ───────────────────────────────────────────────

    /// Insert a record. Fails with `Conflict` if the code is taken.
    async fn save_authorize(&self, record: AuthorizationRecord) -> StoreResult<()>;

    async fn get_authorize(&self, code: &str) -> StoreResult<AuthorizationRecord>;

    /// Idempotent delete.
    async fn delete_authorize(&self, code: &str) -> StoreResult<()>;

    /// Look up and delete a record as one step.
    ///
    /// Of two concurrent callers with the same code, at most one receives
    /// the record. The default composes `get_authorize` and
    /// `delete_authorize` and is only as strong as the backend's isolation.
    async fn take_authorize(&self, code: &str) -> StoreResult<AuthorizationRecord> {
        let record = self.get_authorize(code).await?;
        self.delete_authorize(code).await?;
        Ok(record)
    }

    // ─── Tokens ──────────────────────────────────────────────────────────────

    /// Mint and persist a token with fresh access (and optional refresh) strings.
    async fn issue_token(&self, params: IssueParams) -> StoreResult<AccessToken>;

    /// Issue a new token, then retire the old refresh token.
    ///
    /// The default runs the two steps in that order, so a failure in between
    /// leaves the old refresh usable rather than none at all.
    async fn rotate_refresh(
        &self,
        old_refresh: &str,
        params: IssueParams,
    ) -> StoreResult<AccessToken> {
        let token = self.issue_token(params).await?;
        self.delete_token_by_refresh(old_refresh).await?;
        Ok(token)
    }

    async fn get_token_by_id(&self, id: Uuid) -> StoreResult<AccessToken>;

    async fn get_token_by_access(&self, access_token: &str) -> StoreResult<AccessToken>;

    async fn get_token_by_refresh(&self, refresh_token: &str) -> StoreResult<AccessToken>;

    async fn get_tokens_by_user(&self, user_id: Uuid) -> StoreResult<Vec<AccessToken>>;

    async fn get_tokens_by_client(&self, client_id: &str) -> StoreResult<Vec<AccessToken>>;

    async fn delete_token_by_id(&self, id: Uuid) -> StoreResult<()>;

    /// Idempotent delete.
    async fn delete_token_by_access(&self, access_token: &str) -> StoreResult<()>;

    /// Idempotent delete.
    async fn delete_token_by_refresh(&self, refresh_token: &str) -> StoreResult<()>;

    async fn delete_token_by_user(&self, user_id: Uuid) -> StoreResult<()>;

    async fn delete_token_by_client(&self, client_id: &str) -> StoreResult<()>;

    /// Remove expired authorization records and expired tokens that cannot be refreshed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<PurgeReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        // 32 bytes -> 43 base64url characters, no padding.
        assert_eq!(a.len(), 43);
        assert!(!a.contains('='));
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(a, b);
    }
}
