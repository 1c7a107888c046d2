//! OpenID Connect discovery document (OpenID Connect Discovery 1.0 §3).

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::grant::GrantType;
use crate::id_token::SigningKeys;
use crate::pkce::CodeChallengeMethod;
use crate::scope::Scope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub revocation_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub scopes_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
}

impl DiscoveryDocument {
    #[must_use]
    pub fn build(config: &Config, keys: &dyn SigningKeys) -> Self {
        let strings =
            |items: &[&str]| -> Vec<String> { items.iter().map(ToString::to_string).collect() };
        Self {
            issuer: config.origin.clone(),
            authorization_endpoint: config.endpoint_url("/authorize"),
            token_endpoint: config.endpoint_url("/token"),
            revocation_endpoint: config.endpoint_url("/revoke"),
            userinfo_endpoint: config.origin_url(&config.userinfo_path),
            jwks_uri: config.origin_url(&config.jwks_path),
            scopes_supported: Scope::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            response_types_supported: strings(&["code"]),
            response_modes_supported: strings(&["query"]),
            grant_types_supported: GrantType::ALL.iter().map(|g| g.as_str().to_string()).collect(),
            subject_types_supported: strings(&["public"]),
            id_token_signing_alg_values_supported: keys.id_token_algorithms(),
            token_endpoint_auth_methods_supported: strings(&[
                "client_secret_basic",
                "client_secret_post",
            ]),
            code_challenge_methods_supported: CodeChallengeMethod::SUPPORTED
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
        }
    }
}
