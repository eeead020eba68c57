//! Route definitions
//!
//! Public routes need no credential. Protected routes sit behind the access
//! middleware, applied as a route layer so the matched template is known.

use crate::auth::handlers as auth;
use crate::handlers::{self, api_keys, applications, exercises, permissions, routines};
use crate::{middleware::access_middleware, AppState};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

/// Routes reachable without credentials
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/health", get(handlers::health_check))
        .route("/register", post(auth::register_user))
        .route("/login", post(auth::login_user))
        .route("/applications/register", post(auth::register_application))
        .route("/applications/token", post(auth::application_token))
}

/// Routes guarded by the access pipeline
pub fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Exercises
        .route(
            "/exercises",
            get(exercises::list_exercises).post(exercises::create_exercise),
        )
        .route(
            "/exercises/{id}",
            get(exercises::get_exercise)
                .put(exercises::update_exercise)
                .delete(exercises::delete_exercise),
        )
        // Routines
        .route(
            "/routines",
            get(routines::list_routines).post(routines::create_routine),
        )
        .route(
            "/routines/{id}",
            get(routines::get_routine)
                .put(routines::update_routine)
                .delete(routines::delete_routine),
        )
        // API keys
        .route(
            "/api-keys",
            get(api_keys::list_api_keys).post(api_keys::create_api_key),
        )
        .route(
            "/api-keys/{id}",
            get(api_keys::account_api_keys).delete(api_keys::delete_api_key),
        )
        .route(
            "/api-keys/validate/{api_key}",
            get(api_keys::validate_api_key),
        )
        .route(
            "/api-keys/{id}/invalidate",
            put(api_keys::invalidate_api_key),
        )
        // Permissions
        .route(
            "/permissions",
            get(permissions::list_permissions)
                .post(permissions::add_permission)
                .delete(permissions::remove_permission),
        )
        .route(
            "/permissions/role/{subject}",
            get(permissions::subject_permissions),
        )
        .route(
            "/permissions/groups",
            get(permissions::list_groups)
                .post(permissions::assign_role)
                .delete(permissions::unassign_role),
        )
        .route("/permissions/groups/{user}", get(permissions::user_groups))
        .route("/permissions/reload", post(permissions::reload_policy))
        // Applications
        .route("/applications", get(applications::list_applications))
        .route(
            "/applications/{id}/status",
            put(applications::update_application_status),
        )
        .route("/applications/{id}", delete(applications::delete_application))
        .route_layer(middleware::from_fn_with_state(state, access_middleware))
}

/// All routes combined
pub fn all_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state))
}
