//! Bearer token issuance and validation
//!
//! Tokens are HS256 JWTs signed with the configured shared secret. Validation
//! pins the algorithm, applies no clock leeway and treats a token whose
//! expiry equals the current second as expired.

use crate::error::{CredentialError, InvalidReason};
use chrono::{DateTime, Duration, TimeZone, Utc};
use gym_core::AuthConfig;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Who a token was issued to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    User,
    Application,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user or application identifier)
    pub sub: String,
    /// Roles at issuance; informational only
    pub roles: Vec<String>,
    /// Expiration time (timestamp)
    pub exp: i64,
    /// Issued at (timestamp)
    pub iat: i64,
    #[serde(default)]
    pub kind: TokenKind,
}

/// Identity carried by a validated token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub subject: String,
    pub roles: Vec<String>,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

/// Issued token as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and validates signed bearer tokens
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
    /// `None` when the configured lifetime is not representable
    ttl: Option<Duration>,
}

impl TokenService {
    /// Create a token service from the auth configuration
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            ttl: i64::try_from(config.token_ttl_hours)
                .ok()
                .and_then(Duration::try_hours),
        }
    }

    /// Issue a token for `subject` with the configured lifetime
    pub fn issue(
        &self,
        subject: &str,
        roles: Vec<String>,
        kind: TokenKind,
    ) -> Result<IssuedToken, CredentialError> {
        let now = Utc::now();
        let ttl = self
            .ttl
            .ok_or_else(|| CredentialError::Issue("token lifetime out of range".to_string()))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| CredentialError::Issue("token expiry out of range".to_string()))?;

        let claims = Claims {
            sub: subject.to_string(),
            roles,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            kind,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|e| CredentialError::Issue(e.to_string()))?;

        debug!("Issued {:?} token for {}", kind, subject);

        Ok(IssuedToken {
            token,
            token_type: "Bearer".to_string(),
            expires_in: ttl.num_seconds(),
        })
    }

    /// Validate a raw token (without the `Bearer ` prefix)
    pub fn validate(&self, token: &str) -> Result<TokenIdentity, CredentialError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.keys.decoding, &validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::InvalidSignature => InvalidReason::BadSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    InvalidReason::WrongAlgorithm
                }
                ErrorKind::ExpiredSignature => InvalidReason::Expired,
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                    InvalidReason::BadClaims
                }
                _ => InvalidReason::Malformed,
            };
            debug!("Token rejected: {} ({})", reason, e);
            CredentialError::Invalid(reason)
        })?;

        let claims = data.claims;

        if claims.exp <= Utc::now().timestamp() {
            debug!("Token rejected: expired at {}", claims.exp);
            return Err(CredentialError::Invalid(InvalidReason::Expired));
        }

        if claims.sub.trim().is_empty() {
            debug!("Token rejected: empty subject");
            return Err(CredentialError::Invalid(InvalidReason::BadClaims));
        }

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(CredentialError::Invalid(InvalidReason::BadClaims))?;

        Ok(TokenIdentity {
            subject: claims.sub,
            roles: claims.roles,
            kind: claims.kind,
            expires_at,
        })
    }
}
