//! API key administration
//!
//! Raw keys are returned once, by `create_api_key`. Every other endpoint
//! works with key ids.

use crate::auth::Caller;
use crate::error::{WebError, WebResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use gym_access::{ApiKeyRecord, IssuedApiKey};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub account: String,
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    _caller: Caller,
) -> WebResult<Json<Vec<ApiKeyRecord>>> {
    Ok(Json(state.credentials.list_keys().await?))
}

/// Keys bound to an account. The path segment is the account, shared with
/// `DELETE /api-keys/{id}` by route template.
pub async fn account_api_keys(
    State(state): State<AppState>,
    _caller: Caller,
    Path(account): Path<String>,
) -> WebResult<Json<Vec<ApiKeyRecord>>> {
    Ok(Json(state.credentials.keys_for_account(&account).await?))
}

pub async fn validate_api_key(
    State(state): State<AppState>,
    _caller: Caller,
    Path(api_key): Path<String>,
) -> WebResult<Json<Value>> {
    let valid = state.credentials.validate_key(&api_key).await?;
    Ok(Json(json!({ "valid": valid })))
}

pub async fn create_api_key(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateApiKeyRequest>,
) -> WebResult<(StatusCode, Json<IssuedApiKey>)> {
    let account = request.account.trim();
    if account.is_empty() {
        return Err(WebError::Validation("account is required".into()));
    }

    let issued = state.credentials.create_key(account).await?;
    info!(
        "API key {} issued for {} by {}",
        issued.id,
        issued.account,
        caller.subject()
    );
    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn invalidate_api_key(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> WebResult<Json<ApiKeyRecord>> {
    state.credentials.invalidate_key(&id).await?;
    let record = state.credentials.get_key(&id).await?;

    info!("API key {} invalidated by {}", id, caller.subject());
    Ok(Json(record))
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> WebResult<StatusCode> {
    state.credentials.delete_key(&id).await?;

    info!("API key {} deleted by {}", id, caller.subject());
    Ok(StatusCode::NO_CONTENT)
}
