//! OpenID Connect ID tokens (OpenID Connect Core 1.0 §2).
//!
//! The token endpoint attaches an ID token to every user-bound grant whose
//! scopes include `openid`. Signing goes through the [`SigningKeys`] seam so
//! deployments can plug in their key service; [`JwtSigningKeys`] signs
//! in-process with `jsonwebtoken`.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::directory::UserInfo;
use crate::error::SigningError;

/// Path under the origin serving user icons, by user name.
pub const ICON_PATH: &str = "/api/v3/public/icon/";

/// Claims of an ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Present when the grant carries the `profile` scope.
    #[serde(flatten)]
    pub profile: Option<ProfileClaims>,
}

/// Userinfo claims released under the `profile` scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileClaims {
    pub name: String,
    pub preferred_username: String,
    pub picture: String,
}

impl ProfileClaims {
    #[must_use]
    pub fn for_user(user: &UserInfo, origin: &str) -> Self {
        Self {
            name: user.name.clone(),
            preferred_username: user.name.clone(),
            picture: format!("{origin}{ICON_PATH}{}", user.name),
        }
    }
}

/// Key service seam: signs ID tokens and names the algorithms it signs with.
pub trait SigningKeys: Send + Sync {
    /// Algorithms advertised in the discovery document.
    fn id_token_algorithms(&self) -> Vec<String>;

    /// Sign `claims` into a compact JWS.
    fn sign_id_token(&self, claims: &IdTokenClaims) -> Result<String, SigningError>;
}

/// In-process signer holding one private key.
#[derive(Clone)]
pub struct JwtSigningKeys {
    algorithm: Algorithm,
    name: &'static str,
    key: EncodingKey,
}

impl JwtSigningKeys {
    /// HS256 with a shared secret. Relying parties need the same secret to
    /// verify, so this suits development and tests.
    #[must_use]
    pub fn hmac(secret: &[u8]) -> Self {
        Self { algorithm: Algorithm::HS256, name: "HS256", key: EncodingKey::from_secret(secret) }
    }

    /// Load a PEM private key: RSA (RS256), EC P-256 (ES256) or Ed25519 (EdDSA).
    pub fn from_pem(pem: &[u8]) -> Result<Self, SigningError> {
        if let Ok(key) = EncodingKey::from_rsa_pem(pem) {
            return Ok(Self { algorithm: Algorithm::RS256, name: "RS256", key });
        }
        if let Ok(key) = EncodingKey::from_ec_pem(pem) {
            return Ok(Self { algorithm: Algorithm::ES256, name: "ES256", key });
        }
        if let Ok(key) = EncodingKey::from_ed_pem(pem) {
            return Ok(Self { algorithm: Algorithm::EdDSA, name: "EdDSA", key });
        }
        Err(SigningError::UnsupportedKey)
    }
}

impl std::fmt::Debug for JwtSigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSigningKeys").field("algorithm", &self.name).finish()
    }
}

impl SigningKeys for JwtSigningKeys {
    fn id_token_algorithms(&self) -> Vec<String> {
        vec![self.name.to_string()]
    }

    fn sign_id_token(&self, claims: &IdTokenClaims) -> Result<String, SigningError> {
        let token = jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.key)?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation};
    use uuid::Uuid;

    use super::*;

    const SECRET: &[u8] = b"id-token-test-secret";

    fn claims(profile: Option<ProfileClaims>) -> IdTokenClaims {
        IdTokenClaims {
            iss: "https://q.example.com".into(),
            sub: Uuid::nil().to_string(),
            aud: "client".into(),
            exp: chrono::Utc::now().timestamp() + 600,
            iat: chrono::Utc::now().timestamp(),
            nonce: Some("n-0S6_WzA2Mj".into()),
            profile,
        }
    }

    fn decode(token: &str) -> IdTokenClaims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["client"]);
        validation.set_issuer(&["https://q.example.com"]);
        jsonwebtoken::decode::<IdTokenClaims>(token, &DecodingKey::from_secret(SECRET), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn test_hmac_sign_and_verify() {
        let keys = JwtSigningKeys::hmac(SECRET);
        assert_eq!(keys.id_token_algorithms(), vec!["HS256"]);

        let claims = claims(None);
        let token = keys.sign_id_token(&claims).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(decode(&token), claims);
    }

    #[test]
    fn test_profile_claims_are_flattened() {
        let user = UserInfo {
            id: Uuid::new_v4(),
            name: "alice".into(),
            active: true,
            role: "user".into(),
        };
        let profile = ProfileClaims::for_user(&user, "https://q.example.com");
        assert_eq!(profile.picture, "https://q.example.com/api/v3/public/icon/alice");

        let json = serde_json::to_value(claims(Some(profile))).unwrap();
        assert_eq!(json["preferred_username"], "alice");
        assert_eq!(json["nonce"], "n-0S6_WzA2Mj");
        assert!(json.get("profile").is_none());

        let json = serde_json::to_value(IdTokenClaims { nonce: None, ..claims(None) }).unwrap();
        assert!(json.get("nonce").is_none());
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        let err = JwtSigningKeys::from_pem(b"not a key").unwrap_err();
        assert!(matches!(err, SigningError::UnsupportedKey));
    }
}
