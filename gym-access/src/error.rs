//! Error types for credential validation, policy management and the access
//! pipeline.

use gym_core::GymError;
use std::fmt;

/// Why a credential was rejected. Only ever logged; callers see a single
/// "unauthenticated" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    UnknownKey,
    RevokedKey,
    Malformed,
    BadSignature,
    WrongAlgorithm,
    Expired,
    BadClaims,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            InvalidReason::UnknownKey => "unknown api key",
            InvalidReason::RevokedKey => "api key has been invalidated",
            InvalidReason::Malformed => "malformed token",
            InvalidReason::BadSignature => "signature mismatch",
            InvalidReason::WrongAlgorithm => "unexpected signing algorithm",
            InvalidReason::Expired => "token expired",
            InvalidReason::BadClaims => "missing or malformed claims",
        };
        f.write_str(reason)
    }
}

/// Credential store and token service errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid credential")]
    Invalid(InvalidReason),
    #[error("api key not found")]
    NotFound,
    #[error("token creation failed: {0}")]
    Issue(String),
    #[error(transparent)]
    Storage(#[from] GymError),
}

impl CredentialError {
    /// Storage faults and timeouts, as opposed to negative answers
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, CredentialError::Storage(_) | CredentialError::Issue(_))
    }
}

/// Policy store errors
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{field} must not be blank")]
    Invalid { field: &'static str },
    #[error("policy has not been loaded")]
    Unavailable,
    #[error(transparent)]
    Storage(#[from] GymError),
}

/// Route inference errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    #[error("unable to infer object from route {0:?}")]
    CannotInferObject(Option<String>),
}

/// Terminal failures of the access pipeline, one per response class
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("API key or bearer token required")]
    CredentialRequired,
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("invalid or expired credential")]
    Unauthenticated,
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("not permitted to {action} {object}")]
    Forbidden { object: String, action: String },
    #[error("policy store unavailable")]
    PolicyUnavailable,
    #[error("storage fault: {0}")]
    Storage(#[source] GymError),
}

impl AccessError {
    /// Stable machine-readable code for response payloads
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::CredentialRequired => "credential_required",
            AccessError::Malformed(_) => "malformed_request",
            AccessError::Unauthenticated => "unauthenticated",
            AccessError::Inference(_) => "cannot_infer_object",
            AccessError::Forbidden { .. } => "forbidden",
            AccessError::Storage(e) if e.is_timeout() => "storage_timeout",
            AccessError::PolicyUnavailable | AccessError::Storage(_) => "internal_error",
        }
    }

    /// Server-side faults, never a policy answer
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AccessError::PolicyUnavailable | AccessError::Storage(_)
        )
    }

    /// Ordering used when two credential sources fail differently:
    /// infrastructure fault > malformed > invalid.
    pub(crate) fn severity(&self) -> u8 {
        match self {
            AccessError::PolicyUnavailable | AccessError::Storage(_) => 3,
            AccessError::Malformed(_) => 2,
            _ => 1,
        }
    }
}

impl From<CredentialError> for AccessError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Invalid(_) | CredentialError::NotFound => AccessError::Unauthenticated,
            CredentialError::Storage(e) => AccessError::Storage(e),
            CredentialError::Issue(message) => AccessError::Storage(GymError::Internal {
                message,
                source: None,
                context: gym_core::ErrorContext::new("credentials"),
            }),
        }
    }
}

impl From<PolicyError> for AccessError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Storage(e) => AccessError::Storage(e),
            // Evaluation only reads snapshots; any other policy error means
            // the store is not in a usable state.
            _ => AccessError::PolicyUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credentials_collapse_to_unauthenticated() {
        for reason in [
            InvalidReason::UnknownKey,
            InvalidReason::Expired,
            InvalidReason::WrongAlgorithm,
        ] {
            let err: AccessError = CredentialError::Invalid(reason).into();
            assert!(matches!(err, AccessError::Unauthenticated));
            assert_eq!(err.to_string(), "invalid or expired credential");
        }
    }

    #[test]
    fn test_storage_timeout_has_its_own_code() {
        let err = AccessError::Storage(GymError::Timeout {
            operation: "find_key".to_string(),
            duration_ms: 5,
            context: gym_core::ErrorContext::new("test"),
        });
        assert_eq!(err.code(), "storage_timeout");
        assert!(err.is_infrastructure());
    }

    #[test]
    fn test_policy_unavailable_is_not_a_denial() {
        let err: AccessError = PolicyError::Unavailable.into();
        assert!(err.is_infrastructure());
        assert_ne!(err.code(), "forbidden");
    }
}
