//! Exercise catalogue

use crate::auth::Caller;
use crate::database::Exercise;
use crate::error::{WebError, WebResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

/// Exercise create/update payload
#[derive(Debug, Deserialize)]
pub struct ExerciseInput {
    pub name: String,
    pub primary_muscles: String,
    #[serde(default)]
    pub secondary_muscles: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub focus: String,
}

impl ExerciseInput {
    fn validate(&self) -> WebResult<()> {
        let required = [
            ("name", &self.name),
            ("primary_muscles", &self.primary_muscles),
            ("type", &self.kind),
            ("focus", &self.focus),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(WebError::Validation(format!("{} is required", field))),
            None => Ok(()),
        }
    }

    fn into_exercise(self, id: String) -> Exercise {
        Exercise {
            id,
            name: self.name.trim().to_string(),
            primary_muscles: self.primary_muscles,
            secondary_muscles: self.secondary_muscles,
            kind: self.kind,
            focus: self.focus,
        }
    }
}

pub async fn list_exercises(
    State(state): State<AppState>,
    _caller: Caller,
) -> WebResult<Json<Vec<Exercise>>> {
    Ok(Json(state.database.list_exercises().await?))
}

pub async fn get_exercise(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> WebResult<Json<Exercise>> {
    state
        .database
        .get_exercise(&id)
        .await?
        .map(Json)
        .ok_or_else(|| WebError::NotFound("Exercise".into()))
}

pub async fn create_exercise(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<ExerciseInput>,
) -> WebResult<(StatusCode, Json<Exercise>)> {
    input.validate()?;
    let exercise = input.into_exercise(Uuid::new_v4().to_string());
    state.database.save_exercise(&exercise).await?;

    info!("Exercise {} created by {}", exercise.id, caller.subject());
    Ok((StatusCode::CREATED, Json(exercise)))
}

pub async fn update_exercise(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(input): Json<ExerciseInput>,
) -> WebResult<Json<Exercise>> {
    input.validate()?;
    if state.database.get_exercise(&id).await?.is_none() {
        return Err(WebError::NotFound("Exercise".into()));
    }

    let exercise = input.into_exercise(id);
    state.database.save_exercise(&exercise).await?;

    info!("Exercise {} updated by {}", exercise.id, caller.subject());
    Ok(Json(exercise))
}

pub async fn delete_exercise(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> WebResult<StatusCode> {
    if !state.database.delete_exercise(&id).await? {
        return Err(WebError::NotFound("Exercise".into()));
    }

    info!("Exercise {} deleted by {}", id, caller.subject());
    Ok(StatusCode::NO_CONTENT)
}
