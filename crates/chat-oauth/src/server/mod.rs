//! HTTP server for the OAuth authorization server.

pub mod handlers;
pub mod router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::Config;
use crate::directory::UserDirectory;
use crate::id_token::SigningKeys;
use crate::session::SessionStore;
use crate::store::OAuthStore;

pub use router::{HttpState, create_router};

/// OAuth server: configuration plus the collaborators behind the endpoints.
pub struct OAuthServer {
    config: Config,
    store: Arc<dyn OAuthStore>,
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn UserDirectory>,
    keys: Arc<dyn SigningKeys>,
}

impl OAuthServer {
    #[must_use]
    pub fn new(
        config: Config,
        store: Arc<dyn OAuthStore>,
        sessions: Arc<dyn SessionStore>,
        directory: Arc<dyn UserDirectory>,
        keys: Arc<dyn SigningKeys>,
    ) -> Self {
        Self { config, store, sessions, directory, keys }
    }

    /// Build the router without binding a socket.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        create_router(
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.sessions),
            Arc::clone(&self.directory),
            Arc::clone(&self.keys),
        )
    }

    /// Run the server in HTTP mode.
    ///
    /// # Errors
    ///
    /// Returns error on server failure.
    pub async fn run_http(self, port: u16) -> anyhow::Result<()> {
        tracing::info!(
            origin = %self.config.origin,
            base_path = %self.config.base_path,
            "Starting OAuth server in HTTP mode on port {}",
            port
        );

        let router = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for OAuthServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthServer").field("config", &self.config).finish()
    }
}

/// Purge expired authorization records and tokens every `period`, forever.
pub async fn run_housekeeping(store: Arc<dyn OAuthStore>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match store.purge_expired(Utc::now()).await {
            Ok(report) if report.authorizations + report.tokens > 0 => {
                tracing::info!(
                    authorizations = report.authorizations,
                    tokens = report.tokens,
                    "Purged expired grants"
                );
            }
            Ok(_) => {}
            Err(err) => tracing::error!(error = %err, "Housekeeping failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
