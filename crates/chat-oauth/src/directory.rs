//! User directory: credential checks and user lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::spawn_blocking;
use uuid::Uuid;

use crate::error::DirectoryError;

/// Role carried by bot accounts. Bots may not approve authorization requests.
pub const BOT_ROLE: &str = "bot";

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub role: String,
}

impl UserInfo {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.role == BOT_ROLE
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Verify a username and password pair.
    ///
    /// Unknown users and wrong passwords both yield `InvalidCredentials`.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Uuid, DirectoryError>;

    async fn get_user(&self, id: Uuid) -> Result<UserInfo, DirectoryError>;
}

struct StoredUser {
    info: UserInfo,
    /// bcrypt hash, salt included.
    password_hash: String,
}

/// In-memory user directory with bcrypt password hashes.
#[derive(Clone)]
pub struct MemoryDirectory {
    users: Arc<RwLock<HashMap<Uuid, StoredUser>>>,
    cost: u32,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }

    /// Directory hashing new passwords at the given bcrypt cost.
    #[must_use]
    pub fn with_cost(cost: u32) -> Self {
        Self { users: Arc::new(RwLock::new(HashMap::new())), cost }
    }

    /// Add an active user and return its id.
    pub async fn add_user(
        &self,
        name: &str,
        password: &str,
        role: &str,
    ) -> Result<Uuid, DirectoryError> {
        let password = password.to_string();
        let cost = self.cost;
        let password_hash = spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| DirectoryError::Backend(format!("hashing task failed: {e}")))?
            .map_err(|e| DirectoryError::Backend(format!("bcrypt: {e}")))?;

        let id = Uuid::new_v4();
        let user = StoredUser {
            info: UserInfo { id, name: name.to_string(), active: true, role: role.to_string() },
            password_hash,
        };
        self.users.write().await.insert(id, user);
        Ok(id)
    }

    /// Activate or deactivate a user. Returns false if the user does not exist.
    pub async fn set_active(&self, id: Uuid, active: bool) -> bool {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return false;
        };
        user.info.active = active;
        true
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDirectory").finish()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Uuid, DirectoryError> {
        let (id, hash) = {
            let users = self.users.read().await;
            let user = users
                .values()
                .find(|u| u.info.name == username && u.info.active)
                .ok_or(DirectoryError::InvalidCredentials)?;
            (user.info.id, user.password_hash.clone())
        };

        let password = password.to_string();
        let verified = spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| DirectoryError::Backend(format!("hashing task failed: {e}")))?
            .map_err(|e| DirectoryError::Backend(format!("bcrypt: {e}")))?;

        if verified { Ok(id) } else { Err(DirectoryError::InvalidCredentials) }
    }

    async fn get_user(&self, id: Uuid) -> Result<UserInfo, DirectoryError> {
        let users = self.users.read().await;
        users.get(&id).map(|u| u.info.clone()).ok_or(DirectoryError::NotFound)
    }
}
