//! Web error type and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gym_access::{AccessError, CredentialError, PolicyError};
use gym_core::GymError;
use serde_json::json;
use tracing::{error, warn};

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error(transparent)]
    Core(#[from] GymError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl From<CredentialError> for WebError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Invalid(_) => WebError::InvalidCredentials("invalid credential".into()),
            CredentialError::NotFound => WebError::NotFound("API key".into()),
            CredentialError::Issue(message) => WebError::Internal(message),
            CredentialError::Storage(e) => WebError::Core(e),
        }
    }
}

impl From<PolicyError> for WebError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Conflict(what) => WebError::Conflict(format!("{} already exists", what)),
            PolicyError::NotFound(what) => WebError::NotFound(capitalize(&what)),
            PolicyError::Invalid { field } => {
                WebError::Validation(format!("{} must not be blank", field))
            }
            PolicyError::Unavailable => WebError::Access(AccessError::PolicyUnavailable),
            PolicyError::Storage(e) => WebError::Core(e),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl WebError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            WebError::Access(e) => {
                let status = match e {
                    AccessError::CredentialRequired | AccessError::Unauthenticated => {
                        StatusCode::UNAUTHORIZED
                    }
                    AccessError::Malformed(_) | AccessError::Inference(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    AccessError::Forbidden { .. } => StatusCode::FORBIDDEN,
                    AccessError::Storage(inner) if inner.is_timeout() => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    AccessError::Storage(_) | AccessError::PolicyUnavailable => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.code())
            }
            WebError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            WebError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            WebError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            WebError::InvalidCredentials(_) => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            WebError::Core(e) if e.is_timeout() => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_timeout")
            }
            WebError::Core(_)
            | WebError::Database(_)
            | WebError::Server(_)
            | WebError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            if let WebError::Core(e) = &self {
                e.log();
            }
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Storage did not respond in time".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            if matches!(self, WebError::Access(AccessError::Forbidden { .. })) {
                warn!("{}", self);
            }
            self.to_string()
        };

        (
            status,
            Json(json!({
                "error": code,
                "message": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gym_access::{InferenceError, InvalidReason};
    use gym_core::ErrorContext;

    fn status_of(err: WebError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_access_failures_map_to_statuses() {
        assert_eq!(
            status_of(AccessError::CredentialRequired.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AccessError::Malformed("bad header".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AccessError::Unauthenticated.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AccessError::Inference(InferenceError::CannotInferObject(None)).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                AccessError::Forbidden {
                    object: "exercises".into(),
                    action: "delete".into()
                }
                .into()
            ),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(AccessError::PolicyUnavailable.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_timeout_is_service_unavailable() {
        let timeout = GymError::Timeout {
            operation: "api_key_lookup".into(),
            duration_ms: 50,
            context: ErrorContext::new("test"),
        };
        assert_eq!(
            status_of(AccessError::Storage(timeout).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_policy_and_credential_errors_map() {
        assert_eq!(
            status_of(PolicyError::Conflict("permission".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(PolicyError::NotFound("permission".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(PolicyError::Invalid { field: "role" }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CredentialError::Invalid(InvalidReason::Expired).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(CredentialError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
    }
}
