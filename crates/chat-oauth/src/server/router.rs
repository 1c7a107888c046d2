//! Router assembly and shared handler state.

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::authorize::{AuthorizationFlow, FlowSettings};
use crate::config::Config;
use crate::directory::UserDirectory;
use crate::discovery::DiscoveryDocument;
use crate::grant::{GrantEngine, GrantSettings};
use crate::id_token::SigningKeys;
use crate::session::SessionStore;
use crate::store::OAuthStore;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub store: Arc<dyn OAuthStore>,
    pub grants: GrantEngine,
    pub flow: AuthorizationFlow,
    /// Built once at startup; the document never changes at runtime.
    pub discovery: DiscoveryDocument,
}

/// Create the HTTP router with the OAuth endpoints nested under `config.base_path`.
pub fn create_router(
    config: &Config,
    store: Arc<dyn OAuthStore>,
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn UserDirectory>,
    keys: Arc<dyn SigningKeys>,
) -> Router {
    let discovery = DiscoveryDocument::build(config, keys.as_ref());
    let state = Arc::new(HttpState {
        grants: GrantEngine::new(
            Arc::clone(&store),
            Arc::clone(&directory),
            keys,
            GrantSettings::from(config),
        ),
        flow: AuthorizationFlow::new(
            Arc::clone(&store),
            sessions,
            directory,
            FlowSettings::from(config),
        ),
        discovery,
        store,
    });

    let oauth = Router::new()
        .route("/authorize", get(handlers::handle_authorize).post(handlers::handle_authorize))
        .route("/authorize/decide", post(handlers::handle_decide))
        .route("/token", post(handlers::handle_token))
        .route("/revoke", post(handlers::handle_revoke))
        .route("/oidc/discovery", get(handlers::handle_discovery))
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::PRAGMA,
                    HeaderValue::from_static("no-cache"),
                )),
        );

    let base_path = config.base_path.trim_end_matches('/');
    let router = Router::new().route("/health", get(handlers::health_check));
    let router =
        if base_path.is_empty() { router.merge(oauth) } else { router.nest(base_path, oauth) };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
