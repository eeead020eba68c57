//! Training routines

use crate::auth::Caller;
use crate::database::{Routine, RoutineExercise};
use crate::error::{WebError, WebResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

/// Routine create/update payload
#[derive(Debug, Deserialize)]
pub struct RoutineInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercises: Vec<RoutineExercise>,
}

impl RoutineInput {
    fn validate(&self) -> WebResult<()> {
        if self.name.trim().is_empty() {
            return Err(WebError::Validation("name is required".into()));
        }
        if self
            .exercises
            .iter()
            .any(|entry| entry.exercise_id.trim().is_empty())
        {
            return Err(WebError::Validation("exercise_id is required".into()));
        }
        Ok(())
    }
}

pub async fn list_routines(
    State(state): State<AppState>,
    _caller: Caller,
) -> WebResult<Json<Vec<Routine>>> {
    Ok(Json(state.database.list_routines().await?))
}

pub async fn get_routine(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> WebResult<Json<Routine>> {
    state
        .database
        .get_routine(&id)
        .await?
        .map(Json)
        .ok_or_else(|| WebError::NotFound("Routine".into()))
}

pub async fn create_routine(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<RoutineInput>,
) -> WebResult<(StatusCode, Json<Routine>)> {
    input.validate()?;

    let now = Utc::now();
    let routine = Routine {
        id: Uuid::new_v4().to_string(),
        name: input.name.trim().to_string(),
        description: input.description,
        exercises: input.exercises,
        owner: caller.subject().to_string(),
        created_at: now,
        updated_at: now,
    };
    state.database.save_routine(&routine).await?;

    info!("Routine {} created by {}", routine.id, routine.owner);
    Ok((StatusCode::CREATED, Json(routine)))
}

pub async fn update_routine(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(input): Json<RoutineInput>,
) -> WebResult<Json<Routine>> {
    input.validate()?;

    let existing = state
        .database
        .get_routine(&id)
        .await?
        .ok_or_else(|| WebError::NotFound("Routine".into()))?;

    let routine = Routine {
        name: input.name.trim().to_string(),
        description: input.description,
        exercises: input.exercises,
        updated_at: Utc::now(),
        ..existing
    };
    state.database.save_routine(&routine).await?;

    info!("Routine {} updated by {}", routine.id, caller.subject());
    Ok(Json(routine))
}

pub async fn delete_routine(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> WebResult<StatusCode> {
    if !state.database.delete_routine(&id).await? {
        return Err(WebError::NotFound("Routine".into()));
    }

    info!("Routine {} deleted by {}", id, caller.subject());
    Ok(StatusCode::NO_CONTENT)
}
