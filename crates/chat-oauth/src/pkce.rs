//! PKCE (Proof Key for Code Exchange) verification.
//!
//! Supports the `plain` and `S256` methods of RFC 7636.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use regex::Regex;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::PkceError;

static PKCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9~._-]{43,128}$").expect("valid PKCE regex pattern")
});

/// Code challenge method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    #[default]
    Plain,
    S256,
}

impl CodeChallengeMethod {
    /// Supported methods, as advertised in discovery.
    pub const SUPPORTED: [Self; 2] = [Self::Plain, Self::S256];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }

    /// Parse a stored method, where an empty string means `plain`.
    pub fn parse_or_default(s: &str) -> Result<Self, PkceError> {
        if s.is_empty() { Ok(Self::default()) } else { s.parse() }
    }
}

impl FromStr for CodeChallengeMethod {
    type Err = PkceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(PkceError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `s` is a syntactically valid code verifier or challenge.
#[must_use]
pub fn is_valid_pkce_string(s: &str) -> bool {
    PKCE_REGEX.is_match(s)
}

/// Verify a PKCE S256 code challenge.
///
/// Computes `BASE64URL(SHA256(code_verifier))` and compares to the stored challenge.
#[must_use]
pub fn verify_s256(code_verifier: &str, code_challenge: &str) -> bool {
    let hash = Sha256::digest(code_verifier.as_bytes());
    let computed = URL_SAFE_NO_PAD.encode(hash);
    computed.as_bytes().ct_eq(code_challenge.as_bytes()).into()
}

/// Check a verifier against a recorded challenge and method.
///
/// An empty verifier passes only when no challenge was recorded. A verifier
/// that fails the syntax check never passes. An unknown method is an error.
pub fn validate(challenge: &str, method: &str, verifier: &str) -> Result<bool, PkceError> {
    if verifier.is_empty() {
        return Ok(challenge.is_empty());
    }
    if !is_valid_pkce_string(verifier) {
        return Ok(false);
    }

    match CodeChallengeMethod::parse_or_default(method)? {
        CodeChallengeMethod::Plain => Ok(verifier.as_bytes().ct_eq(challenge.as_bytes()).into()),
        CodeChallengeMethod::S256 => Ok(verify_s256(verifier, challenge)),
    }
}
