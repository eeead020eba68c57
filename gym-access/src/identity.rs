//! Identity resolution
//!
//! A request may carry an API key, a bearer token, or both. Each present
//! source is resolved independently; a request is authenticated only when
//! every present source yields an identity.

use crate::credentials::CredentialStore;
use crate::error::AccessError;
use crate::tokens::{TokenKind, TokenService};
use serde::Serialize;
use tracing::debug;

/// Raw credential header values, as received
#[derive(Debug, Clone, Default)]
pub struct CredentialHeaders {
    /// `X-API-Key`
    pub api_key: Option<String>,
    /// `Authorization`
    pub authorization: Option<String>,
}

impl CredentialHeaders {
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.authorization.is_none()
    }
}

/// Where an identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    ApiKey,
    BearerToken,
}

/// A subject established by one credential source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject: String,
    pub source: CredentialSource,
    /// Roles claimed by a token at issuance; empty for API keys
    pub claimed_roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_kind: Option<TokenKind>,
}

/// One or two identities established for a request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedIdentities {
    Key { key: Identity },
    Token { token: Identity },
    Both { key: Identity, token: Identity },
}

impl ResolvedIdentities {
    fn from_parts(key: Option<Identity>, token: Option<Identity>) -> Option<Self> {
        match (key, token) {
            (Some(key), Some(token)) => Some(Self::Both { key, token }),
            (Some(key), None) => Some(Self::Key { key }),
            (None, Some(token)) => Some(Self::Token { token }),
            (None, None) => None,
        }
    }

    /// Identity from the API key, if one was presented
    pub fn key(&self) -> Option<&Identity> {
        match self {
            Self::Key { key } | Self::Both { key, .. } => Some(key),
            Self::Token { .. } => None,
        }
    }

    /// Identity from the bearer token, if one was presented
    pub fn token(&self) -> Option<&Identity> {
        match self {
            Self::Token { token } | Self::Both { token, .. } => Some(token),
            Self::Key { .. } => None,
        }
    }

    /// The identity used for ownership: the token subject when present,
    /// otherwise the key owner
    pub fn primary(&self) -> &Identity {
        match self {
            Self::Token { token } | Self::Both { token, .. } => token,
            Self::Key { key } => key,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.key().into_iter().chain(self.token())
    }

    pub fn is_dual(&self) -> bool {
        matches!(self, Self::Both { .. })
    }
}

/// Outcome of resolving a single credential source
#[derive(Debug)]
enum SourceOutcome {
    Absent,
    Identified(Identity),
    Rejected(AccessError),
}

/// Resolves credential headers into identities
#[derive(Clone)]
pub struct IdentityResolver {
    credentials: CredentialStore,
    tokens: TokenService,
}

impl IdentityResolver {
    pub fn new(credentials: CredentialStore, tokens: TokenService) -> Self {
        Self {
            credentials,
            tokens,
        }
    }

    /// Resolve every present credential source.
    ///
    /// No credential at all is `CredentialRequired`. When sources fail, the
    /// most severe failure wins: infrastructure fault, then malformed header,
    /// then invalid credential.
    pub async fn resolve(
        &self,
        headers: &CredentialHeaders,
    ) -> Result<ResolvedIdentities, AccessError> {
        if headers.is_empty() {
            return Err(AccessError::CredentialRequired);
        }

        let key = self.resolve_key(headers.api_key.as_deref()).await;
        let token = self.resolve_token(headers.authorization.as_deref());

        let mut rejection: Option<AccessError> = None;
        let mut accept = |outcome: SourceOutcome| match outcome {
            SourceOutcome::Absent => None,
            SourceOutcome::Identified(identity) => Some(identity),
            SourceOutcome::Rejected(err) => {
                rejection = match rejection.take() {
                    Some(current) if current.severity() >= err.severity() => Some(current),
                    _ => Some(err),
                };
                None
            }
        };

        let key = accept(key);
        let token = accept(token);

        if let Some(err) = rejection {
            return Err(err);
        }

        ResolvedIdentities::from_parts(key, token).ok_or(AccessError::CredentialRequired)
    }

    async fn resolve_key(&self, raw: Option<&str>) -> SourceOutcome {
        let Some(raw) = raw else {
            return SourceOutcome::Absent;
        };

        let key = raw.trim();
        if key.is_empty() {
            return SourceOutcome::Rejected(AccessError::Malformed(
                "X-API-Key header is empty".to_string(),
            ));
        }

        match self.credentials.authenticate_key(key).await {
            Ok(account) => SourceOutcome::Identified(Identity {
                subject: account,
                source: CredentialSource::ApiKey,
                claimed_roles: Vec::new(),
                token_kind: None,
            }),
            Err(err) => {
                debug!("API key rejected: {}", err);
                SourceOutcome::Rejected(err.into())
            }
        }
    }

    fn resolve_token(&self, raw: Option<&str>) -> SourceOutcome {
        let Some(raw) = raw else {
            return SourceOutcome::Absent;
        };

        let token = match parse_bearer(raw) {
            Some(token) => token,
            None => {
                return SourceOutcome::Rejected(AccessError::Malformed(
                    "Authorization header must be 'Bearer <token>'".to_string(),
                ))
            }
        };

        match self.tokens.validate(token) {
            Ok(identity) => SourceOutcome::Identified(Identity {
                subject: identity.subject,
                source: CredentialSource::BearerToken,
                claimed_roles: identity.roles,
                token_kind: Some(identity.kind),
            }),
            Err(err) => SourceOutcome::Rejected(err.into()),
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value
fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
