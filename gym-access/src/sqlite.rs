//! SQLite-backed API key storage and policy adapter

use crate::credentials::{ApiKeyRecord, ApiKeyStorage};
use crate::policy::{PermissionRule, PolicyAdapter, PolicyData, RoleAssignment};
use chrono::{DateTime, Utc};
use gym_core::{GymError, GymResult};
use sqlx::SqlitePool;
use tracing::info;

fn db_error(operation: &str, e: sqlx::Error) -> GymError {
    GymError::storage("sqlite", operation, e)
}

/// Database API key row
#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: String,
    key_hash: String,
    account: String,
    is_valid: bool,
    created_at: String, // RFC 3339
}

impl ApiKeyRow {
    fn into_record(self) -> GymResult<ApiKeyRecord> {
        let created_at: DateTime<Utc> = self.created_at.parse().map_err(|e| GymError::Storage {
            message: format!("corrupt created_at for api key {}: {}", self.id, e),
            source: None,
            context: gym_core::ErrorContext::new("sqlite").with_operation("decode_api_key"),
        })?;

        Ok(ApiKeyRecord {
            id: self.id,
            key_hash: self.key_hash,
            account: self.account,
            is_valid: self.is_valid,
            created_at,
        })
    }
}

/// API key storage in the `api_keys` table
pub struct SqliteApiKeyStorage {
    pool: SqlitePool,
}

impl SqliteApiKeyStorage {
    /// Create the storage, creating its table if needed
    pub async fn new(pool: SqlitePool) -> GymResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id TEXT PRIMARY KEY,
                key_hash TEXT UNIQUE NOT NULL,
                account TEXT NOT NULL,
                is_valid BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| db_error("create_api_keys_table", e))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_api_keys_account ON api_keys(account)")
            .execute(&pool)
            .await
            .map_err(|e| db_error("create_api_keys_index", e))?;

        info!("API key table ready");
        Ok(Self { pool })
    }

    fn collect(rows: Vec<ApiKeyRow>) -> GymResult<Vec<ApiKeyRecord>> {
        rows.into_iter().map(ApiKeyRow::into_record).collect()
    }
}

#[async_trait::async_trait]
impl ApiKeyStorage for SqliteApiKeyStorage {
    async fn insert(&self, record: &ApiKeyRecord) -> GymResult<()> {
        sqlx::query(
            "INSERT INTO api_keys (id, key_hash, account, is_valid, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.key_hash)
        .bind(&record.account)
        .bind(record.is_valid)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert_api_key", e))?;
        Ok(())
    }

    async fn find_by_hash(&self, key_hash: &str) -> GymResult<Option<ApiKeyRecord>> {
        sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys WHERE key_hash = ?")
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find_api_key_by_hash", e))?
            .map(ApiKeyRow::into_record)
            .transpose()
    }

    async fn find_by_id(&self, id: &str) -> GymResult<Option<ApiKeyRecord>> {
        sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find_api_key_by_id", e))?
            .map(ApiKeyRow::into_record)
            .transpose()
    }

    async fn list(&self) -> GymResult<Vec<ApiKeyRecord>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list_api_keys", e))?;
        Self::collect(rows)
    }

    async fn list_by_account(&self, account: &str) -> GymResult<Vec<ApiKeyRecord>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(
            "SELECT * FROM api_keys WHERE account = ? ORDER BY created_at",
        )
        .bind(account)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list_api_keys_by_account", e))?;
        Self::collect(rows)
    }

    async fn mark_invalid(&self, id: &str) -> GymResult<bool> {
        let result = sqlx::query("UPDATE api_keys SET is_valid = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("invalidate_api_key", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> GymResult<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete_api_key", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    subject: String,
    object: String,
    action: String,
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    user: String,
    role: String,
}

/// Policy adapter over the `policy_rules` and `role_assignments` tables
pub struct SqlitePolicyAdapter {
    pool: SqlitePool,
}

impl SqlitePolicyAdapter {
    /// Create the adapter, creating its tables if needed
    pub async fn new(pool: SqlitePool) -> GymResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS policy_rules (
                subject TEXT NOT NULL,
                object TEXT NOT NULL,
                action TEXT NOT NULL,
                PRIMARY KEY (subject, object, action)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| db_error("create_policy_rules_table", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS role_assignments (
                user TEXT NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (user, role)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| db_error("create_role_assignments_table", e))?;

        info!("Policy tables ready");
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl PolicyAdapter for SqlitePolicyAdapter {
    async fn load(&self) -> GymResult<PolicyData> {
        let rules = sqlx::query_as::<_, RuleRow>(
            "SELECT subject, object, action FROM policy_rules ORDER BY subject, object, action",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load_policy_rules", e))?;

        let assignments = sqlx::query_as::<_, AssignmentRow>(
            "SELECT user, role FROM role_assignments ORDER BY user, role",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load_role_assignments", e))?;

        Ok(PolicyData {
            rules: rules
                .into_iter()
                .map(|row| PermissionRule {
                    subject: row.subject,
                    object: row.object,
                    action: row.action,
                })
                .collect(),
            assignments: assignments
                .into_iter()
                .map(|row| RoleAssignment {
                    user: row.user,
                    role: row.role,
                })
                .collect(),
        })
    }

    async fn insert_rule(&self, rule: &PermissionRule) -> GymResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO policy_rules (subject, object, action) VALUES (?, ?, ?)",
        )
        .bind(&rule.subject)
        .bind(&rule.object)
        .bind(&rule.action)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert_policy_rule", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_rule(&self, rule: &PermissionRule) -> GymResult<bool> {
        let result = sqlx::query(
            "DELETE FROM policy_rules WHERE subject = ? AND object = ? AND action = ?",
        )
        .bind(&rule.subject)
        .bind(&rule.object)
        .bind(&rule.action)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("delete_policy_rule", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_assignment(&self, assignment: &RoleAssignment) -> GymResult<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO role_assignments (user, role) VALUES (?, ?)")
                .bind(&assignment.user)
                .bind(&assignment.role)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("insert_role_assignment", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_assignment(&self, assignment: &RoleAssignment) -> GymResult<bool> {
        let result = sqlx::query("DELETE FROM role_assignments WHERE user = ? AND role = ?")
            .bind(&assignment.user)
            .bind(&assignment.role)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete_role_assignment", e))?;
        Ok(result.rows_affected() > 0)
    }
}
