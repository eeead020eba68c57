//! Object/action inference from the matched route
//!
//! The object is the first segment of the route *template* (never the
//! concrete path), so `/exercises/{id}` and `/exercises` both protect the
//! `exercises` object.

use crate::error::InferenceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Abstract action derived from the HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    /// Any other method; never granted
    Unknown,
}

impl Action {
    pub fn from_method(method: &str) -> Self {
        match method {
            "GET" => Action::Read,
            "POST" => Action::Create,
            "PUT" | "PATCH" => Action::Update,
            "DELETE" => Action::Delete,
            _ => Action::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a request is trying to do, in policy terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestDescriptor {
    pub object: String,
    pub action: Action,
}

/// Derive the protected object and action for a request.
///
/// `route` is the matched route template, or `None` when the request did not
/// match a route.
pub fn infer(method: &str, route: Option<&str>) -> Result<RequestDescriptor, InferenceError> {
    let cannot_infer = || InferenceError::CannotInferObject(route.map(str::to_string));

    let template = route.ok_or_else(cannot_infer)?;
    let first = template
        .strip_prefix('/')
        .and_then(|rest| rest.split('/').next())
        .ok_or_else(cannot_infer)?;

    if first.is_empty() || first.starts_with('{') || first.starts_with(':') || first.starts_with('*')
    {
        return Err(cannot_infer());
    }

    Ok(RequestDescriptor {
        object: first.to_string(),
        action: Action::from_method(method),
    })
}
