//! Access middleware
//!
//! Runs identity resolution, object/action inference and policy evaluation
//! for every protected route, then attaches the resulting `AccessContext`
//! to the request.

use crate::error::WebError;
use crate::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use gym_access::{AccessError, CredentialHeaders};
use tracing::debug;

/// Header carrying an opaque API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Collect the credential headers. A header that is not visible ASCII is
/// malformed.
pub fn credential_headers(headers: &HeaderMap) -> Result<CredentialHeaders, AccessError> {
    Ok(CredentialHeaders {
        api_key: header_text(headers, API_KEY_HEADER)?,
        authorization: header_text(headers, AUTHORIZATION.as_str())?,
    })
}

fn header_text(headers: &HeaderMap, name: &str) -> Result<Option<String>, AccessError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|_| AccessError::Malformed(format!("{} header is not valid text", name)))
        })
        .transpose()
}

/// Authorize the request or reject it with the pipeline's error
pub async fn access_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let headers = credential_headers(request.headers())?;
    let method = request.method().as_str().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());

    let context = state
        .access
        .authorize(&headers, &method, route.as_deref())
        .await?;

    debug!(
        subject = context.subject(),
        object = %context.descriptor.object,
        action = %context.descriptor.action,
        "Access granted"
    );

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
