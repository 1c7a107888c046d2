//! Chat OAuth
//!
//! OAuth 2.0 and OpenID Connect authorization server core for a chat
//! platform. Third-party applications (clients) obtain scoped access tokens
//! on behalf of users or of themselves.
//!
//! # Features
//!
//! - **Four grants**: authorization code (with PKCE), password, client
//!   credentials and refresh token (with rotation)
//! - **Interactive authorization**: login redirect, consent slot in the
//!   session, silent reauthorization with `prompt=none`
//! - **OpenID Connect**: signed ID tokens for `openid` grants and a
//!   discovery document
//! - **Revocation**: RFC 7009 token revocation
//! - **Pluggable persistence**: every store, session and user lookup sits
//!   behind an async trait, with in-memory implementations included
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chat_oauth::{
//!     Config, JwtSigningKeys, MemoryDirectory, MemorySessionStore, MemoryStore, OAuthServer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = OAuthServer::new(
//!         Config::from_env()?,
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(MemorySessionStore::new()),
//!         Arc::new(MemoryDirectory::new()),
//!         Arc::new(JwtSigningKeys::from_pem(&std::fs::read("id_token.pem")?)?),
//!     );
//!     server.run_http(3000).await
//! }
//! ```

pub mod authorize;
pub mod bearer;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod grant;
pub mod id_token;
pub mod model;
pub mod pkce;
pub mod scope;
pub mod server;
pub mod session;
pub mod store;

pub use config::Config;
pub use directory::{MemoryDirectory, UserDirectory};
pub use error::{ErrorCode, FlowError, SigningError, StoreError, TokenError};
pub use id_token::{JwtSigningKeys, SigningKeys};
pub use scope::{Scope, ScopeSet};
pub use server::OAuthServer;
pub use session::{MemorySessionStore, SessionStore};
pub use store::{MemoryStore, OAuthStore};
