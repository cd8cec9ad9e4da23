use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

use crate::{config::AppConfig, models::Role};

const EMAIL_VERIFICATION_PURPOSE: &str = "verify_email";

/// Claims
///
/// Payload of an access token. `sub` is the account email; `exp` is only present
/// when a token lifetime is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// EmailClaims
///
/// Payload of the token mailed out at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailClaims {
    sub: String,
    purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not validate")]
    InvalidSignature,
    #[error("token is missing required claims")]
    MalformedClaims,
    #[error("token has expired")]
    Expired,
    #[error("token is not a well-formed JWT")]
    Malformed,
    #[error("token could not be signed")]
    Signing,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => TokenError::MalformedClaims,
            _ => TokenError::Malformed,
        }
    }
}

/// TokenService
///
/// Issues and verifies HS256 bearer tokens. Stateless: the only input besides the
/// token is the shared secret, so it is cloned freely into every request.
///
/// With no lifetime configured, tokens never expire. That mirrors the historical
/// contract and is logged as a warning at startup.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: Option<u64>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: Option<u64>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_secs)
    }

    pub fn expires(&self) -> bool {
        self.ttl_secs.is_some()
    }

    /// Encodes `{sub: email, role, id}` (plus `exp` when configured).
    pub fn issue(&self, email: &str, role: Role, id: Uuid) -> Result<String, TokenError> {
        let claims = Claims {
            sub: email.to_string(),
            role,
            id,
            exp: self.expiry(),
        };
        self.sign(&claims)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_claims(token)
    }

    pub fn issue_email_token(&self, email: &str) -> Result<String, TokenError> {
        let claims = EmailClaims {
            sub: email.to_string(),
            purpose: EMAIL_VERIFICATION_PURPOSE.to_string(),
            exp: self.expiry(),
        };
        self.sign(&claims)
    }

    /// Returns the email embedded in a verification token.
    pub fn verify_email_token(&self, token: &str) -> Result<String, TokenError> {
        let claims: EmailClaims = self.decode_claims(token)?;
        if claims.purpose != EMAIL_VERIFICATION_PURPOSE {
            return Err(TokenError::MalformedClaims);
        }
        Ok(claims.sub)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            tracing::error!("token signing failed: {:?}", e);
            TokenError::Signing
        })
    }

    fn decode_claims<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is checked whenever present, but only demanded when tokens are meant to expire.
        validation.validate_exp = true;
        validation.required_spec_claims.clear();
        if self.expires() {
            validation.required_spec_claims.insert("exp".to_string());
        }

        let data = decode::<T>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    fn expiry(&self) -> Option<u64> {
        self.ttl_secs.map(|ttl| now_secs().saturating_add(ttl))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
