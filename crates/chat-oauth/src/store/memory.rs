//! In-memory OAuth store.
//!
//! All tables sit behind one lock so that cascades, code redemption and
//! refresh rotation are atomic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{IssueParams, MAX_ISSUE_ATTEMPTS, OAuthStore, PurgeReport, generate_token};
use crate::error::{StoreError, StoreResult};
use crate::model::{AccessToken, AuthorizationRecord, Client};

#[derive(Default)]
struct Tables {
    clients: HashMap<String, Client>,
    authorizes: HashMap<String, AuthorizationRecord>,
    tokens: HashMap<Uuid, AccessToken>,
    by_access: HashMap<String, Uuid>,
    by_refresh: HashMap<String, Uuid>,
}

impl Tables {
    fn insert_token(&mut self, token: AccessToken) -> StoreResult<()> {
        if self.by_access.contains_key(&token.access_token) {
            return Err(StoreError::Conflict("access_token"));
        }
        if let Some(ref refresh) = token.refresh_token {
            if self.by_refresh.contains_key(refresh) {
                return Err(StoreError::Conflict("refresh_token"));
            }
            self.by_refresh.insert(refresh.clone(), token.id);
        }
        self.by_access.insert(token.access_token.clone(), token.id);
        self.tokens.insert(token.id, token);
        Ok(())
    }

    fn remove_token(&mut self, id: Uuid) -> Option<AccessToken> {
        let token = self.tokens.remove(&id)?;
        self.by_access.remove(&token.access_token);
        if let Some(ref refresh) = token.refresh_token {
            self.by_refresh.remove(refresh);
        }
        Some(token)
    }

    /// Remove every token matching `pred`, returning how many went.
    fn remove_tokens_where(&mut self, pred: impl Fn(&AccessToken) -> bool) -> usize {
        let ids: Vec<Uuid> = self.tokens.values().filter(|t| pred(t)).map(|t| t.id).collect();
        for id in &ids {
            self.remove_token(*id);
        }
        ids.len()
    }

    /// Mint a token, regenerating the random strings on a uniqueness conflict.
    fn issue(&mut self, params: &IssueParams) -> StoreResult<AccessToken> {
        let mut last_conflict = StoreError::Conflict("access_token");
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let token = AccessToken {
                id: Uuid::new_v4(),
                client_id: params.client_id.clone(),
                user_id: params.user_id,
                redirect_uri: params.redirect_uri.clone(),
                access_token: generate_token()?,
                refresh_token: if params.refresh { Some(generate_token()?) } else { None },
                scopes: params.scopes.clone(),
                expires_in: params.expires_in,
                created_at: Utc::now(),
            };
            match self.insert_token(token.clone()) {
                Ok(()) => return Ok(token),
                Err(err @ StoreError::Conflict(_)) => {
                    tracing::debug!(attempt, error = %err, "Token string collision, regenerating");
                    last_conflict = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_conflict)
    }
}

/// In-memory OAuth state store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token row as-is. Test and migration helper.
    pub async fn insert_token(&self, token: AccessToken) -> StoreResult<()> {
        self.tables.write().await.insert_token(token)
    }

    /// Number of stored tokens (for monitoring).
    pub async fn token_count(&self) -> usize {
        self.tables.read().await.tokens.len()
    }

    /// Number of stored authorization records (for monitoring).
    pub async fn authorize_count(&self) -> usize {
        self.tables.read().await.authorizes.len()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}

#[async_trait]
impl OAuthStore for MemoryStore {
    async fn get_client(&self, id: &str) -> StoreResult<Client> {
        self.tables.read().await.clients.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_clients_by_creator(&self, creator_id: Uuid) -> StoreResult<Vec<Client>> {
        let tables = self.tables.read().await;
        Ok(tables.clients.values().filter(|c| c.creator_id == creator_id).cloned().collect())
    }

    async fn save_client(&self, client: Client) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.clients.contains_key(&client.id) {
            return Err(StoreError::Conflict("client_id"));
        }
        tables.clients.insert(client.id.clone(), client);
        Ok(())
    }

    async fn update_client(&self, client: Client) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let slot = tables.clients.get_mut(&client.id).ok_or(StoreError::NotFound)?;
        *slot = client;
        Ok(())
    }

    async fn delete_client(&self, id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.clients.remove(id).is_none() {
            return Ok(());
        }

        let before = tables.authorizes.len();
        tables.authorizes.retain(|_, record| record.client_id != id);
        let authorizations = before - tables.authorizes.len();
        let tokens = tables.remove_tokens_where(|t| t.client_id == id);

        tracing::debug!(client_id = %id, authorizations, tokens, "Deleted client with cascade");
        Ok(())
    }

    async fn save_authorize(&self, record: AuthorizationRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.authorizes.contains_key(&record.code) {
            return Err(StoreError::Conflict("code"));
        }
        tables.authorizes.insert(record.code.clone(), record);
        Ok(())
    }

    async fn get_authorize(&self, code: &str) -> StoreResult<AuthorizationRecord> {
        self.tables.read().await.authorizes.get(code).cloned().ok_or(StoreError::NotFound)
    }

    async fn delete_authorize(&self, code: &str) -> StoreResult<()> {
        self.tables.write().await.authorizes.remove(code);
        Ok(())
    }

    async fn take_authorize(&self, code: &str) -> StoreResult<AuthorizationRecord> {
        self.tables.write().await.authorizes.remove(code).ok_or(StoreError::NotFound)
    }

    async fn issue_token(&self, params: IssueParams) -> StoreResult<AccessToken> {
        self.tables.write().await.issue(&params)
    }

    async fn rotate_refresh(
        &self,
        old_refresh: &str,
        params: IssueParams,
    ) -> StoreResult<AccessToken> {
        let mut tables = self.tables.write().await;
        let old_id = *tables.by_refresh.get(old_refresh).ok_or(StoreError::NotFound)?;
        let token = tables.issue(&params)?;
        tables.remove_token(old_id);
        Ok(token)
    }

    async fn get_token_by_id(&self, id: Uuid) -> StoreResult<AccessToken> {
        self.tables.read().await.tokens.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_token_by_access(&self, access_token: &str) -> StoreResult<AccessToken> {
        let tables = self.tables.read().await;
        tables
            .by_access
            .get(access_token)
            .and_then(|id| tables.tokens.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_token_by_refresh(&self, refresh_token: &str) -> StoreResult<AccessToken> {
        let tables = self.tables.read().await;
        tables
            .by_refresh
            .get(refresh_token)
            .and_then(|id| tables.tokens.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_tokens_by_user(&self, user_id: Uuid) -> StoreResult<Vec<AccessToken>> {
        let tables = self.tables.read().await;
        Ok(tables.tokens.values().filter(|t| t.user_id == Some(user_id)).cloned().collect())
    }

    async fn get_tokens_by_client(&self, client_id: &str) -> StoreResult<Vec<AccessToken>> {
        let tables = self.tables.read().await;
        Ok(tables.tokens.values().filter(|t| t.client_id == client_id).cloned().collect())
    }

    async fn delete_token_by_id(&self, id: Uuid) -> StoreResult<()> {
        self.tables.write().await.remove_token(id);
        Ok(())
    }

    async fn delete_token_by_access(&self, access_token: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(id) = tables.by_access.get(access_token).copied() {
            tables.remove_token(id);
        }
        Ok(())
    }

    async fn delete_token_by_refresh(&self, refresh_token: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(id) = tables.by_refresh.get(refresh_token).copied() {
            tables.remove_token(id);
        }
        Ok(())
    }

    async fn delete_token_by_user(&self, user_id: Uuid) -> StoreResult<()> {
        let removed = self.tables.write().await.remove_tokens_where(|t| t.user_id == Some(user_id));
        tracing::debug!(user_id = %user_id, count = removed, "Revoked tokens by user");
        Ok(())
    }

    async fn delete_token_by_client(&self, client_id: &str) -> StoreResult<()> {
        let removed = self.tables.write().await.remove_tokens_where(|t| t.client_id == client_id);
        tracing::debug!(client_id = %client_id, count = removed, "Revoked tokens by client");
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<PurgeReport> {
        let mut tables = self.tables.write().await;

        let before = tables.authorizes.len();
        tables.authorizes.retain(|_, record| !record.is_expired_at(now));
        let authorizations = before - tables.authorizes.len();

        let tokens =
            tables.remove_tokens_where(|t| t.is_expired_at(now) && !t.is_refresh_enabled());

        if authorizations > 0 || tokens > 0 {
            tracing::debug!(authorizations, tokens, "Purged expired OAuth rows");
        }
        Ok(PurgeReport { authorizations, tokens })
    }
}
