//! Permission and role administration
//!
//! Writes go through the policy store, which persists first and then
//! publishes a new snapshot.

use crate::auth::Caller;
use crate::error::WebResult;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use gym_access::{PermissionRule, RoleAssignment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub subject: String,
    pub object: String,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub user: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub roles: Vec<String>,
    pub users: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct UserRolesResponse {
    pub user: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub rules: usize,
    pub assignments: usize,
    pub loaded_at: DateTime<Utc>,
}

pub async fn list_permissions(
    State(state): State<AppState>,
    _caller: Caller,
) -> WebResult<Json<Vec<PermissionRule>>> {
    Ok(Json(state.policy.list_permissions().await?))
}

/// Rules whose subject is a given user or role
pub async fn subject_permissions(
    State(state): State<AppState>,
    _caller: Caller,
    Path(subject): Path<String>,
) -> WebResult<Json<Vec<PermissionRule>>> {
    Ok(Json(state.policy.find_permissions(&subject).await?))
}

pub async fn add_permission(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<PermissionRequest>,
) -> WebResult<(StatusCode, Json<PermissionRule>)> {
    let rule = state
        .policy
        .add_permission(&request.subject, &request.object, &request.action)
        .await?;

    info!(
        "Permission ({}, {}, {}) added by {}",
        rule.subject,
        rule.object,
        rule.action,
        caller.subject()
    );
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn remove_permission(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<PermissionRequest>,
) -> WebResult<StatusCode> {
    state
        .policy
        .remove_permission(&request.subject, &request.object, &request.action)
        .await?;

    info!(
        "Permission ({}, {}, {}) removed by {}",
        request.subject,
        request.object,
        request.action,
        caller.subject()
    );
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_groups(
    State(state): State<AppState>,
    _caller: Caller,
) -> WebResult<Json<GroupsResponse>> {
    let snapshot = state.policy.snapshot().await?;

    Ok(Json(GroupsResponse {
        roles: snapshot.all_roles().into_iter().collect(),
        users: snapshot.memberships(),
    }))
}

pub async fn user_groups(
    State(state): State<AppState>,
    _caller: Caller,
    Path(user): Path<String>,
) -> WebResult<Json<UserRolesResponse>> {
    let roles = state.policy.roles_of(&user).await?.into_iter().collect();
    Ok(Json(UserRolesResponse { user, roles }))
}

pub async fn assign_role(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<RoleRequest>,
) -> WebResult<(StatusCode, Json<RoleAssignment>)> {
    let assignment = state
        .policy
        .assign_role(&request.user, &request.role)
        .await?;

    info!(
        "Role {} assigned to {} by {}",
        assignment.role,
        assignment.user,
        caller.subject()
    );
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn unassign_role(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<RoleRequest>,
) -> WebResult<StatusCode> {
    state
        .policy
        .unassign_role(&request.user, &request.role)
        .await?;

    info!(
        "Role {} removed from {} by {}",
        request.role,
        request.user,
        caller.subject()
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Rebuild the policy snapshot from storage
pub async fn reload_policy(
    State(state): State<AppState>,
    caller: Caller,
) -> WebResult<Json<ReloadResponse>> {
    let snapshot = state.policy.reload().await?;

    info!(
        "Policy reloaded by {}: {} rules, {} assignments",
        caller.subject(),
        snapshot.rule_count(),
        snapshot.assignment_count()
    );
    Ok(Json(ReloadResponse {
        rules: snapshot.rule_count(),
        assignments: snapshot.assignment_count(),
        loaded_at: snapshot.loaded_at(),
    }))
}
