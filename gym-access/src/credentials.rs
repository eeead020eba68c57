//! API key credential store
//!
//! Keys are opaque: the raw value is returned once at creation and only its
//! SHA-256 digest is persisted. A key is usable while its validity flag is
//! set; invalidation is one-way.

use crate::error::{CredentialError, InvalidReason};
use chrono::{DateTime, Utc};
use gym_core::{bounded, AuthConfig, GymResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Stored API key record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Unique API key ID
    pub id: String,
    /// SHA-256 digest of the raw key
    #[serde(skip_serializing)]
    pub key_hash: String,
    /// Account the key acts for
    pub account: String,
    /// Cleared by invalidation, never set again
    pub is_valid: bool,
    /// When the key was created
    pub created_at: DateTime<Utc>,
}

/// A freshly created key; the only place the raw key is ever exposed
#[derive(Debug, Clone, Serialize)]
pub struct IssuedApiKey {
    pub id: String,
    pub api_key: String,
    pub account: String,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

/// API key storage backend
#[async_trait::async_trait]
pub trait ApiKeyStorage: Send + Sync {
    /// Store a new API key record
    async fn insert(&self, record: &ApiKeyRecord) -> GymResult<()>;

    /// Get a record by key digest
    async fn find_by_hash(&self, key_hash: &str) -> GymResult<Option<ApiKeyRecord>>;

    /// Get a record by ID
    async fn find_by_id(&self, id: &str) -> GymResult<Option<ApiKeyRecord>>;

    /// List every record
    async fn list(&self) -> GymResult<Vec<ApiKeyRecord>>;

    /// List records bound to an account
    async fn list_by_account(&self, account: &str) -> GymResult<Vec<ApiKeyRecord>>;

    /// Clear the validity flag; returns whether the record exists
    async fn mark_invalid(&self, id: &str) -> GymResult<bool>;

    /// Delete a record; returns whether it existed
    async fn delete(&self, id: &str) -> GymResult<bool>;
}

/// In-memory API key storage
///
/// Records and the digest index share one lock so lookups never interleave
/// with a half-applied insert or delete.
#[derive(Debug, Default)]
pub struct MemoryApiKeyStorage {
    inner: RwLock<MemoryKeys>,
}

#[derive(Debug, Default)]
struct MemoryKeys {
    records: HashMap<String, ApiKeyRecord>,
    by_hash: HashMap<String, String>, // hash -> id
}

impl MemoryApiKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ApiKeyStorage for MemoryApiKeyStorage {
    async fn insert(&self, record: &ApiKeyRecord) -> GymResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .by_hash
            .insert(record.key_hash.clone(), record.id.clone());
        inner.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_by_hash(&self, key_hash: &str) -> GymResult<Option<ApiKeyRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_hash
            .get(key_hash)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> GymResult<Option<ApiKeyRecord>> {
        Ok(self.inner.read().await.records.get(id).cloned())
    }

    async fn list(&self) -> GymResult<Vec<ApiKeyRecord>> {
        let mut records: Vec<ApiKeyRecord> =
            self.inner.read().await.records.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn list_by_account(&self, account: &str) -> GymResult<Vec<ApiKeyRecord>> {
        let mut records: Vec<ApiKeyRecord> = self
            .inner
            .read()
            .await
            .records
            .values()
            .filter(|record| record.account == account)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn mark_invalid(&self, id: &str) -> GymResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.records.get_mut(id) {
            Some(record) => {
                record.is_valid = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> GymResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.records.remove(id) {
            Some(record) => {
                inner.by_hash.remove(&record.key_hash);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Credential store for API keys
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn ApiKeyStorage>,
    timeout_ms: u64,
}

impl CredentialStore {
    /// Create a credential store over the given backend
    pub fn new(storage: Arc<dyn ApiKeyStorage>, config: &AuthConfig) -> Self {
        Self {
            storage,
            timeout_ms: config.storage_timeout_ms,
        }
    }

    /// Create a credential store with memory storage
    pub fn memory(config: &AuthConfig) -> Self {
        Self::new(Arc::new(MemoryApiKeyStorage::new()), config)
    }

    /// Whether `key` names an existing, valid record. Unknown keys are
    /// `Ok(false)`; only storage faults are errors.
    pub async fn validate_key(&self, key: &str) -> Result<bool, CredentialError> {
        match self.authenticate_key(key).await {
            Ok(_) => Ok(true),
            Err(CredentialError::Invalid(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The account bound to a valid key, `None` for unknown or invalidated
    /// keys
    pub async fn resolve_key_owner(&self, key: &str) -> Result<Option<String>, CredentialError> {
        match self.authenticate_key(key).await {
            Ok(account) => Ok(Some(account)),
            Err(CredentialError::Invalid(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve a key to its account in a single lookup, reporting why it was
    /// rejected
    pub async fn authenticate_key(&self, key: &str) -> Result<String, CredentialError> {
        if key.is_empty() {
            return Err(CredentialError::Invalid(InvalidReason::UnknownKey));
        }

        let key_hash = hash_key(key);
        let record = bounded(
            self.storage.find_by_hash(&key_hash),
            self.timeout_ms,
            "api_key_lookup",
        )
        .await?;

        match record {
            Some(record) if record.is_valid => {
                debug!("API key {} resolved to account {}", record.id, record.account);
                Ok(record.account)
            }
            Some(record) => {
                debug!("API key {} has been invalidated", record.id);
                Err(CredentialError::Invalid(InvalidReason::RevokedKey))
            }
            None => {
                debug!("API key {}... not found", key_prefix(key));
                Err(CredentialError::Invalid(InvalidReason::UnknownKey))
            }
        }
    }

    /// Create a new key bound to `account`
    pub async fn create_key(&self, account: &str) -> Result<IssuedApiKey, CredentialError> {
        let raw_key = generate_raw_key();
        let record = ApiKeyRecord {
            id: Uuid::new_v4().to_string(),
            key_hash: hash_key(&raw_key),
            account: account.to_string(),
            is_valid: true,
            created_at: Utc::now(),
        };

        bounded(self.storage.insert(&record), self.timeout_ms, "api_key_insert").await?;

        info!("Created API key {} for account: {}", record.id, account);

        Ok(IssuedApiKey {
            id: record.id,
            api_key: raw_key,
            account: record.account,
            is_valid: record.is_valid,
            created_at: record.created_at,
        })
    }

    /// Invalidate a key permanently. Invalidating an already invalid key is a
    /// successful no-op.
    pub async fn invalidate_key(&self, id: &str) -> Result<(), CredentialError> {
        let record = bounded(self.storage.find_by_id(id), self.timeout_ms, "api_key_find")
            .await?
            .ok_or(CredentialError::NotFound)?;

        if !record.is_valid {
            debug!("API key {} already invalid", id);
            return Ok(());
        }

        let found = bounded(
            self.storage.mark_invalid(id),
            self.timeout_ms,
            "api_key_invalidate",
        )
        .await?;

        if !found {
            return Err(CredentialError::NotFound);
        }

        info!("Invalidated API key {} for account: {}", id, record.account);
        Ok(())
    }

    /// Delete a key record
    pub async fn delete_key(&self, id: &str) -> Result<(), CredentialError> {
        let found = bounded(self.storage.delete(id), self.timeout_ms, "api_key_delete").await?;
        if found {
            info!("Deleted API key: {}", id);
            Ok(())
        } else {
            Err(CredentialError::NotFound)
        }
    }

    /// Get a single record by ID
    pub async fn get_key(&self, id: &str) -> Result<ApiKeyRecord, CredentialError> {
        bounded(self.storage.find_by_id(id), self.timeout_ms, "api_key_find")
            .await?
            .ok_or(CredentialError::NotFound)
    }

    /// List all key records
    pub async fn list_keys(&self) -> Result<Vec<ApiKeyRecord>, CredentialError> {
        Ok(bounded(self.storage.list(), self.timeout_ms, "api_key_list").await?)
    }

    /// List key records bound to `account`
    pub async fn keys_for_account(
        &self,
        account: &str,
    ) -> Result<Vec<ApiKeyRecord>, CredentialError> {
        Ok(bounded(
            self.storage.list_by_account(account),
            self.timeout_ms,
            "api_key_list_by_account",
        )
        .await?)
    }
}

/// Generate a raw API key
fn generate_raw_key() -> String {
    format!("gk_{}", Uuid::new_v4().simple())
}

/// Hash an API key for storage
pub(crate) fn hash_key(key: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn key_prefix(key: &str) -> &str {
    let end = key
        .char_indices()
        .nth(6)
        .map(|(idx, _)| idx)
        .unwrap_or(key.len());
    &key[..end]
}
