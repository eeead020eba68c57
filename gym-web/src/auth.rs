//! Authentication: the `Caller` extractor, user accounts and the public
//! login/registration endpoints

pub mod handlers;
pub mod users;

use crate::error::WebError;
use axum::{extract::FromRequestParts, http::request::Parts};
use gym_access::AccessContext;
use std::ops::Deref;

/// The authorized caller of a protected route.
///
/// Only available behind the access middleware, which stores the
/// `AccessContext` in the request extensions.
#[derive(Debug, Clone)]
pub struct Caller(pub AccessContext);

impl Deref for Caller {
    type Target = AccessContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessContext>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| WebError::Internal("route is not behind the access middleware".into()))
    }
}
