//! Gym Web Server
//!
//! HTTP API for the gym service. Protected routes run through the access
//! pipeline from `gym-access`; public routes cover registration, login and
//! application onboarding.

pub mod auth;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use auth::Caller;
pub use error::{WebError, WebResult};
pub use server::{GymServer, GymServerBuilder};
pub use state::AppState;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            AUTHORIZATION,
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(middleware::API_KEY_HEADER),
        ]);

    routes::all_routes(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
