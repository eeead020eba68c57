//! SQLite connection pool and resource storage
//!
//! Holds users, exercises, routines and applications. API keys and policy
//! tables are owned by `gym-access` and share the same pool.

use crate::error::{WebError, WebResult};
use chrono::{DateTime, Utc};
use gym_core::DatabaseConfig;
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Open the pool described by `config`.
///
/// In-memory databases get a single long-lived connection so every
/// component sees the same database.
pub async fn connect(config: &DatabaseConfig) -> WebResult<SqlitePool> {
    info!("Connecting to database: {}", config.url);

    let pool = if config.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(&config.url)
            .await?
    } else {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!("Creating database directory: {}", parent.display());
                std::fs::create_dir_all(parent)?;
            }
        }

        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?
    };

    info!("Database connection established");
    Ok(pool)
}

fn parse_timestamp(value: &str) -> WebResult<DateTime<Utc>> {
    value
        .parse()
        .map_err(|e| WebError::Internal(format!("corrupt timestamp {:?}: {}", value, e)))
}

/// Registered user
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    created_at: String,
}

impl UserRow {
    fn into_record(self) -> WebResult<UserRecord> {
        Ok(UserRecord {
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
        })
    }
}

/// Exercise catalogue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub primary_muscles: String,
    #[serde(default)]
    pub secondary_muscles: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub focus: String,
}

#[derive(sqlx::FromRow)]
struct ExerciseRow {
    id: String,
    name: String,
    primary_muscles: String,
    secondary_muscles: String,
    kind: String,
    focus: String,
}

impl From<ExerciseRow> for Exercise {
    fn from(row: ExerciseRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            primary_muscles: row.primary_muscles,
            secondary_muscles: row.secondary_muscles,
            kind: row.kind,
            focus: row.focus,
        }
    }
}

/// One set within a routine exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    pub reps: u32,
    pub weight: f64,
    /// Rest after the set, in seconds
    pub rest: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineExercise {
    pub exercise_id: String,
    #[serde(default)]
    pub sets: Vec<Set>,
    pub order: u32,
}

/// Training routine owned by the subject that created it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    pub description: String,
    pub exercises: Vec<RoutineExercise>,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RoutineRow {
    id: String,
    name: String,
    description: String,
    exercises: String, // JSON array
    owner: String,
    created_at: String,
    updated_at: String,
}

impl RoutineRow {
    fn into_routine(self) -> WebResult<Routine> {
        let exercises: Vec<RoutineExercise> = serde_json::from_str(&self.exercises)
            .map_err(|e| WebError::Internal(format!("corrupt routine {}: {}", self.id, e)))?;

        Ok(Routine {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            name: self.name,
            description: self.description,
            exercises,
            owner: self.owner,
        })
    }
}

/// Application review state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    fn parse(value: &str) -> WebResult<Self> {
        match value {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(WebError::Internal(format!(
                "unknown application status {:?}",
                other
            ))),
        }
    }
}

/// Third-party application requesting API access
#[derive(Debug, Clone, Serialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: String,
    name: String,
    email: String,
    status: String,
    created_at: String,
}

impl ApplicationRow {
    fn into_application(self) -> WebResult<Application> {
        Ok(Application {
            status: ApplicationStatus::parse(&self.status)?,
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            name: self.name,
            email: self.email,
        })
    }
}

/// Resource storage
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Wrap an open pool, creating tables if needed
    pub async fn new(pool: SqlitePool) -> WebResult<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> WebResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS exercises (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                primary_muscles TEXT NOT NULL,
                secondary_muscles TEXT NOT NULL DEFAULT '',
                kind TEXT NOT NULL,
                focus TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS routines (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                exercises TEXT NOT NULL DEFAULT '[]',
                owner TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_routines_owner ON routines(owner)",
            r#"
            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_applications_email ON applications(email)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(pool).await?;
        }

        debug!("Resource tables ready");
        Ok(())
    }

    /// The underlying pool, shared with the access stores
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Users

    pub async fn insert_user(&self, email: &str, password_hash: &str) -> WebResult<UserRecord> {
        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(WebError::Conflict("User already exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> WebResult<Option<UserRecord>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_record)
            .transpose()
    }

    // Exercises

    pub async fn list_exercises(&self) -> WebResult<Vec<Exercise>> {
        let rows = sqlx::query_as::<_, ExerciseRow>("SELECT * FROM exercises ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Exercise::from).collect())
    }

    pub async fn get_exercise(&self, id: &str) -> WebResult<Option<Exercise>> {
        Ok(
            sqlx::query_as::<_, ExerciseRow>("SELECT * FROM exercises WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(Exercise::from),
        )
    }

    pub async fn save_exercise(&self, exercise: &Exercise) -> WebResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO exercises (id, name, primary_muscles, secondary_muscles, kind, focus)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&exercise.id)
        .bind(&exercise.name)
        .bind(&exercise.primary_muscles)
        .bind(&exercise.secondary_muscles)
        .bind(&exercise.kind)
        .bind(&exercise.focus)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns whether a row was deleted
    pub async fn delete_exercise(&self, id: &str) -> WebResult<bool> {
        let result = sqlx::query("DELETE FROM exercises WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Routines

    pub async fn list_routines(&self) -> WebResult<Vec<Routine>> {
        let rows = sqlx::query_as::<_, RoutineRow>("SELECT * FROM routines ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(RoutineRow::into_routine).collect()
    }

    pub async fn get_routine(&self, id: &str) -> WebResult<Option<Routine>> {
        sqlx::query_as::<_, RoutineRow>("SELECT * FROM routines WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(RoutineRow::into_routine)
            .transpose()
    }

    pub async fn save_routine(&self, routine: &Routine) -> WebResult<()> {
        let exercises = serde_json::to_string(&routine.exercises)
            .map_err(|e| WebError::Internal(format!("failed to encode routine: {}", e)))?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO routines (id, name, description, exercises, owner, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&routine.id)
        .bind(&routine.name)
        .bind(&routine.description)
        .bind(exercises)
        .bind(&routine.owner)
        .bind(routine.created_at.to_rfc3339())
        .bind(routine.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_routine(&self, id: &str) -> WebResult<bool> {
        let result = sqlx::query("DELETE FROM routines WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Applications

    pub async fn insert_application(&self, name: &str, email: &str) -> WebResult<Application> {
        let application = Application {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            status: ApplicationStatus::Pending,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO applications (id, name, email, status, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&application.id)
        .bind(&application.name)
        .bind(&application.email)
        .bind(application.status.as_str())
        .bind(application.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(application)
    }

    pub async fn list_applications(&self) -> WebResult<Vec<Application>> {
        let rows =
            sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(ApplicationRow::into_application).collect()
    }

    /// An approved application registered under `email`, if any
    pub async fn find_approved_application(&self, email: &str) -> WebResult<Option<Application>> {
        sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE email = ? AND status = 'approved' LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(ApplicationRow::into_application)
        .transpose()
    }

    pub async fn set_application_status(
        &self,
        id: &str,
        status: ApplicationStatus,
    ) -> WebResult<bool> {
        let result = sqlx::query("UPDATE applications SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_application(&self, id: &str) -> WebResult<bool> {
        let result = sqlx::query("DELETE FROM applications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
