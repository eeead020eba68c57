//! Public authentication handlers: registration, login and application
//! onboarding

use super::users::{normalize_email, LoginRequest, RegisterRequest, UserInfo};
use crate::database::Application;
use crate::error::{WebError, WebResult};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use gym_access::IssuedToken;
use serde::Deserialize;
use tracing::info;

/// User registration endpoint
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> WebResult<(StatusCode, Json<UserInfo>)> {
    let user = state.users.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// User login endpoint
pub async fn login_user(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> WebResult<Json<IssuedToken>> {
    Ok(Json(state.users.login(request).await?))
}

/// Application registration request
#[derive(Debug, Deserialize)]
pub struct RegisterApplicationRequest {
    pub name: String,
    pub email: String,
}

/// Register an application; it starts out pending review
pub async fn register_application(
    State(state): State<AppState>,
    Json(request): Json<RegisterApplicationRequest>,
) -> WebResult<(StatusCode, Json<Application>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(WebError::Validation("name is required".to_string()));
    }
    let email = normalize_email(&request.email)?;

    let application = state.database.insert_application(name, &email).await?;
    info!("Application registered: {} ({})", application.name, application.email);

    Ok((StatusCode::CREATED, Json(application)))
}

/// Application token request
#[derive(Debug, Deserialize)]
pub struct ApplicationTokenRequest {
    pub email: String,
}

/// Issue a token for an approved application
pub async fn application_token(
    State(state): State<AppState>,
    Json(request): Json<ApplicationTokenRequest>,
) -> WebResult<Json<IssuedToken>> {
    Ok(Json(state.users.application_token(&request.email).await?))
}
