//! Application review

use crate::auth::Caller;
use crate::database::{Application, ApplicationStatus};
use crate::error::{WebError, WebResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ApplicationStatus,
}

pub async fn list_applications(
    State(state): State<AppState>,
    _caller: Caller,
) -> WebResult<Json<Vec<Application>>> {
    Ok(Json(state.database.list_applications().await?))
}

/// Approve or reject an application. Moving back to `pending` is refused.
pub async fn update_application_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> WebResult<Json<Value>> {
    if request.status == ApplicationStatus::Pending {
        return Err(WebError::Validation(
            "status must be approved or rejected".into(),
        ));
    }

    if !state
        .database
        .set_application_status(&id, request.status)
        .await?
    {
        return Err(WebError::NotFound("Application".into()));
    }

    info!(
        "Application {} marked {} by {}",
        id,
        request.status.as_str(),
        caller.subject()
    );
    Ok(Json(json!({ "id": id, "status": request.status })))
}

pub async fn delete_application(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> WebResult<StatusCode> {
    if !state.database.delete_application(&id).await? {
        return Err(WebError::NotFound("Application".into()));
    }

    info!("Application {} deleted by {}", id, caller.subject());
    Ok(StatusCode::NO_CONTENT)
}
