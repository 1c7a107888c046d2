//! Configuration for the OAuth authorization server.

use std::time::Duration;

/// OAuth protocol constants.
pub mod oauth {
    use std::time::Duration;

    /// Default server origin used in discovery URLs.
    pub const ORIGIN: &str = "http://localhost:3000";

    /// Default path the OAuth router is nested under.
    pub const BASE_PATH: &str = "/api/v3/oauth2";

    /// Access token lifetime in seconds (1 year).
    pub const ACCESS_TOKEN_EXP: i64 = 60 * 60 * 24 * 365;

    /// Upper bound for any configured lifetime, in seconds (10 years).
    pub const MAX_LIFETIME: i64 = 60 * 60 * 24 * 365 * 10;

    /// Authorization code lifetime in seconds (5 minutes).
    pub const AUTHORIZATION_CODE_EXP: i64 = 60 * 5;

    /// How long a stashed authorization request waits for the user's decision.
    pub const CONSENT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    /// Login page the user agent is sent to when no session exists.
    pub const LOGIN_PATH: &str = "/login";

    /// Consent page rendered by the frontend.
    pub const CONSENT_PATH: &str = "/consent";

    /// JWKS publication path, served by the key service.
    pub const JWKS_PATH: &str = "/api/v3/jwks";

    /// OpenID userinfo endpoint path.
    pub const USERINFO_PATH: &str = "/api/v3/users/me/oidc";

    /// Interval between store housekeeping runs.
    pub const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(10 * 60);
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute server origin (e.g. `https://q.example.com`).
    pub origin: String,

    /// Path the OAuth endpoints are mounted under.
    pub base_path: String,

    /// Lifetime applied to every access token, in seconds.
    pub access_token_exp: i64,

    /// Lifetime applied to every authorization record, in seconds.
    pub authorization_code_exp: i64,

    /// Whether refresh tokens are minted at all.
    pub is_refresh_enabled: bool,

    /// Window between accepting an authorization request and the user's decision.
    pub consent_timeout: Duration,

    /// Login page path.
    pub login_path: String,

    /// Consent page path.
    pub consent_path: String,

    /// JWKS path, relative to the origin.
    pub jwks_path: String,

    /// Userinfo endpoint path, relative to the origin.
    pub userinfo_path: String,

    /// Interval between store housekeeping runs.
    pub housekeeping_interval: Duration,
}

impl Config {
    /// Create a configuration for the given origin with default lifetimes.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            base_path: oauth::BASE_PATH.to_string(),
            access_token_exp: oauth::ACCESS_TOKEN_EXP,
            authorization_code_exp: oauth::AUTHORIZATION_CODE_EXP,
            is_refresh_enabled: false,
            consent_timeout: oauth::CONSENT_TIMEOUT,
            login_path: oauth::LOGIN_PATH.to_string(),
            consent_path: oauth::CONSENT_PATH.to_string(),
            jwks_path: oauth::JWKS_PATH.to_string(),
            userinfo_path: oauth::USERINFO_PATH.to_string(),
            housekeeping_interval: oauth::HOUSEKEEPING_INTERVAL,
        }
    }

    /// Create a test configuration: refresh enabled, short base path.
    #[must_use]
    pub fn for_testing(origin: &str) -> Self {
        Self {
            base_path: "/oauth2".to_string(),
            access_token_exp: 3600,
            is_refresh_enabled: true,
            housekeeping_interval: Duration::from_secs(1),
            ..Self::new(origin)
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if environment variables are invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create configuration from a variable lookup.
    ///
    /// Lifetimes must lie in `1..=MAX_LIFETIME` seconds.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let origin = lookup("OAUTH_ORIGIN").unwrap_or_else(|| oauth::ORIGIN.to_string());
        let mut config = Self::new(origin);

        if let Some(base_path) = lookup("OAUTH_BASE_PATH") {
            config.base_path = base_path;
        }
        if let Some(exp) = parse_lifetime(&lookup, "OAUTH_ACCESS_TOKEN_EXP")? {
            config.access_token_exp = exp;
        }
        if let Some(exp) = parse_lifetime(&lookup, "OAUTH_AUTHORIZATION_CODE_EXP")? {
            config.authorization_code_exp = exp;
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, "OAUTH_REFRESH_ENABLED")? {
            config.is_refresh_enabled = enabled;
        }
        if let Some(path) = lookup("OAUTH_LOGIN_PATH") {
            config.login_path = path;
        }
        if let Some(path) = lookup("OAUTH_CONSENT_PATH") {
            config.consent_path = path;
        }

        Ok(config)
    }

    /// Absolute URL of an endpoint mounted under the OAuth base path.
    #[must_use]
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}{}", self.origin, self.base_path, path)
    }

    /// Absolute URL of a path relative to the origin.
    #[must_use]
    pub fn origin_url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(oauth::ORIGIN)
    }
}

fn parse_var<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}"))
        })
        .transpose()
}

fn parse_lifetime(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
) -> anyhow::Result<Option<i64>> {
    let Some(secs) = parse_var::<i64>(lookup, name)? else {
        return Ok(None);
    };
    if !(1..=oauth::MAX_LIFETIME).contains(&secs) {
        anyhow::bail!("invalid value for {name}: {secs} is outside 1..={}", oauth::MAX_LIFETIME);
    }
    Ok(Some(secs))
}
