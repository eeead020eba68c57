//! Role-based policy store
//!
//! Permission rules are `(subject, object, action)` triples where the subject
//! is a user or a role. Role assignments map users to roles (one level, no
//! role hierarchy). Readers always see a complete immutable snapshot;
//! mutations are serialized, persisted through the adapter, then published
//! as a new snapshot.

use crate::error::PolicyError;
use chrono::{DateTime, Utc};
use gym_core::{bounded, AuthConfig, GymResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A single permission grant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionRule {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl PermissionRule {
    /// Build a rule, rejecting blank fields
    pub fn new(subject: &str, object: &str, action: &str) -> Result<Self, PolicyError> {
        Ok(Self {
            subject: required("subject", subject)?,
            object: required("object", object)?,
            action: required("action", action)?,
        })
    }
}

/// A user-to-role membership
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user: String,
    pub role: String,
}

impl RoleAssignment {
    pub fn new(user: &str, role: &str) -> Result<Self, PolicyError> {
        Ok(Self {
            user: required("user", user)?,
            role: required("role", role)?,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, PolicyError> {
    let value = value.trim();
    if value.is_empty() {
        Err(PolicyError::Invalid { field })
    } else {
        Ok(value.to_string())
    }
}

/// Everything the durable store holds
#[derive(Debug, Clone, Default)]
pub struct PolicyData {
    pub rules: Vec<PermissionRule>,
    pub assignments: Vec<RoleAssignment>,
}

/// How a subject was granted an (object, action) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", content = "role", rename_all = "snake_case")]
pub enum Grant {
    Direct,
    Role(String),
}

/// Immutable, internally consistent view of the policy
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    rules: BTreeSet<PermissionRule>,
    assignments: BTreeSet<RoleAssignment>,
    loaded_at: DateTime<Utc>,
}

impl PolicySnapshot {
    pub fn new(data: PolicyData) -> Self {
        Self {
            rules: data.rules.into_iter().collect(),
            assignments: data.assignments.into_iter().collect(),
            loaded_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(PolicyData::default())
    }

    /// Find a grant for `subject`, directly or through one of its roles.
    /// A direct grant is reported in preference to a role grant.
    pub fn grant_for(&self, subject: &str, object: &str, action: &str) -> Option<Grant> {
        if self.has_rule(subject, object, action) {
            return Some(Grant::Direct);
        }

        self.roles_of(subject)
            .into_iter()
            .find(|role| self.has_rule(role, object, action))
            .map(Grant::Role)
    }

    fn has_rule(&self, subject: &str, object: &str, action: &str) -> bool {
        self.rules.contains(&PermissionRule {
            subject: subject.to_string(),
            object: object.to_string(),
            action: action.to_string(),
        })
    }

    pub fn rules(&self) -> impl Iterator<Item = &PermissionRule> {
        self.rules.iter()
    }

    pub fn rules_for<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a PermissionRule> {
        self.rules.iter().filter(move |rule| rule.subject == subject)
    }

    pub fn contains_rule(&self, rule: &PermissionRule) -> bool {
        self.rules.contains(rule)
    }

    pub fn contains_assignment(&self, assignment: &RoleAssignment) -> bool {
        self.assignments.contains(assignment)
    }

    pub fn roles_of(&self, user: &str) -> BTreeSet<String> {
        self.assignments
            .iter()
            .filter(|a| a.user == user)
            .map(|a| a.role.clone())
            .collect()
    }

    pub fn users_of(&self, role: &str) -> BTreeSet<String> {
        self.assignments
            .iter()
            .filter(|a| a.role == role)
            .map(|a| a.user.clone())
            .collect()
    }

    /// Every role that has at least one member
    pub fn all_roles(&self) -> BTreeSet<String> {
        self.assignments.iter().map(|a| a.role.clone()).collect()
    }

    /// Role name to member list
    pub fn memberships(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for assignment in &self.assignments {
            map.entry(assignment.role.clone())
                .or_default()
                .push(assignment.user.clone());
        }
        map
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    fn with_rule(&self, rule: PermissionRule, present: bool) -> Self {
        let mut next = self.clone();
        if present {
            next.rules.insert(rule);
        } else {
            next.rules.remove(&rule);
        }
        next
    }

    fn with_assignment(&self, assignment: RoleAssignment, present: bool) -> Self {
        let mut next = self.clone();
        if present {
            next.assignments.insert(assignment);
        } else {
            next.assignments.remove(&assignment);
        }
        next
    }
}

/// Durable backing store for policy rules and role assignments
#[async_trait::async_trait]
pub trait PolicyAdapter: Send + Sync {
    /// Load the full policy
    async fn load(&self) -> GymResult<PolicyData>;

    /// Persist a rule; returns `false` if it was already present
    async fn insert_rule(&self, rule: &PermissionRule) -> GymResult<bool>;

    /// Remove a rule; returns `false` if it was absent
    async fn delete_rule(&self, rule: &PermissionRule) -> GymResult<bool>;

    /// Persist an assignment; returns `false` if it was already present
    async fn insert_assignment(&self, assignment: &RoleAssignment) -> GymResult<bool>;

    /// Remove an assignment; returns `false` if it was absent
    async fn delete_assignment(&self, assignment: &RoleAssignment) -> GymResult<bool>;
}

/// In-memory policy adapter
#[derive(Debug, Default)]
pub struct MemoryPolicyAdapter {
    rules: RwLock<BTreeSet<PermissionRule>>,
    assignments: RwLock<BTreeSet<RoleAssignment>>,
}

impl MemoryPolicyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the adapter, e.g. with bootstrap rules
    pub fn with_data(data: PolicyData) -> Self {
        Self {
            rules: RwLock::new(data.rules.into_iter().collect()),
            assignments: RwLock::new(data.assignments.into_iter().collect()),
        }
    }
}

#[async_trait::async_trait]
impl PolicyAdapter for MemoryPolicyAdapter {
    async fn load(&self) -> GymResult<PolicyData> {
        Ok(PolicyData {
            rules: self.rules.read().await.iter().cloned().collect(),
            assignments: self.assignments.read().await.iter().cloned().collect(),
        })
    }

    async fn insert_rule(&self, rule: &PermissionRule) -> GymResult<bool> {
        Ok(self.rules.write().await.insert(rule.clone()))
    }

    async fn delete_rule(&self, rule: &PermissionRule) -> GymResult<bool> {
        Ok(self.rules.write().await.remove(rule))
    }

    async fn insert_assignment(&self, assignment: &RoleAssignment) -> GymResult<bool> {
        Ok(self.assignments.write().await.insert(assignment.clone()))
    }

    async fn delete_assignment(&self, assignment: &RoleAssignment) -> GymResult<bool> {
        Ok(self.assignments.write().await.remove(assignment))
    }
}

/// Policy store: durable adapter plus the published snapshot
#[derive(Clone)]
pub struct PolicyStore {
    adapter: Arc<dyn PolicyAdapter>,
    current: Arc<RwLock<Option<Arc<PolicySnapshot>>>>,
    writer: Arc<Mutex<()>>,
    timeout_ms: u64,
}

impl PolicyStore {
    /// Create a store that has not loaded anything yet. Reads fail with
    /// `Unavailable` until `reload` succeeds.
    pub fn new(adapter: Arc<dyn PolicyAdapter>, config: &AuthConfig) -> Self {
        Self {
            adapter,
            current: Arc::new(RwLock::new(None)),
            writer: Arc::new(Mutex::new(())),
            timeout_ms: config.storage_timeout_ms,
        }
    }

    /// Create a store and load it from the adapter
    pub async fn open(
        adapter: Arc<dyn PolicyAdapter>,
        config: &AuthConfig,
    ) -> Result<Self, PolicyError> {
        let store = Self::new(adapter, config);
        store.reload().await?;
        Ok(store)
    }

    /// Create an empty, loaded store backed by memory
    pub fn memory(config: &AuthConfig) -> Self {
        let mut store = Self::new(Arc::new(MemoryPolicyAdapter::new()), config);
        store.current = Arc::new(RwLock::new(Some(Arc::new(PolicySnapshot::empty()))));
        store
    }

    /// The currently published snapshot
    pub async fn snapshot(&self) -> Result<Arc<PolicySnapshot>, PolicyError> {
        self.current.read().await.clone().ok_or(PolicyError::Unavailable)
    }

    async fn publish(&self, snapshot: PolicySnapshot) {
        *self.current.write().await = Some(Arc::new(snapshot));
    }

    /// Re-read the durable store and atomically replace the snapshot
    pub async fn reload(&self) -> Result<Arc<PolicySnapshot>, PolicyError> {
        let _guard = self.writer.lock().await;

        let data = bounded(self.adapter.load(), self.timeout_ms, "policy_load").await?;
        let snapshot = Arc::new(PolicySnapshot::new(data));

        *self.current.write().await = Some(snapshot.clone());

        info!(
            "Policy loaded: {} rules, {} role assignments",
            snapshot.rule_count(),
            snapshot.assignment_count()
        );
        Ok(snapshot)
    }

    pub async fn list_permissions(&self) -> Result<Vec<PermissionRule>, PolicyError> {
        Ok(self.snapshot().await?.rules().cloned().collect())
    }

    /// Rules whose subject is exactly `subject`
    pub async fn find_permissions(&self, subject: &str) -> Result<Vec<PermissionRule>, PolicyError> {
        Ok(self.snapshot().await?.rules_for(subject).cloned().collect())
    }

    pub async fn add_permission(
        &self,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<PermissionRule, PolicyError> {
        let rule = PermissionRule::new(subject, object, action)?;
        let _guard = self.writer.lock().await;
        let current = self.snapshot().await?;

        let inserted = bounded(
            self.adapter.insert_rule(&rule),
            self.timeout_ms,
            "policy_insert_rule",
        )
        .await?;

        if !current.contains_rule(&rule) || inserted {
            self.publish(current.with_rule(rule.clone(), true)).await;
        }

        if !inserted {
            debug!("Permission already exists: {:?}", rule);
            return Err(PolicyError::Conflict("permission".to_string()));
        }

        info!(
            "Added permission: {} {} {}",
            rule.subject, rule.object, rule.action
        );
        Ok(rule)
    }

    pub async fn remove_permission(
        &self,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<(), PolicyError> {
        let rule = PermissionRule::new(subject, object, action)?;
        let _guard = self.writer.lock().await;
        let current = self.snapshot().await?;

        let removed = bounded(
            self.adapter.delete_rule(&rule),
            self.timeout_ms,
            "policy_delete_rule",
        )
        .await?;

        if current.contains_rule(&rule) {
            self.publish(current.with_rule(rule.clone(), false)).await;
        }

        if !removed {
            return Err(PolicyError::NotFound("permission".to_string()));
        }

        info!(
            "Removed permission: {} {} {}",
            rule.subject, rule.object, rule.action
        );
        Ok(())
    }

    pub async fn assign_role(&self, user: &str, role: &str) -> Result<RoleAssignment, PolicyError> {
        let assignment = RoleAssignment::new(user, role)?;
        let _guard = self.writer.lock().await;
        let current = self.snapshot().await?;

        let inserted = bounded(
            self.adapter.insert_assignment(&assignment),
            self.timeout_ms,
            "policy_insert_assignment",
        )
        .await?;

        if !current.contains_assignment(&assignment) || inserted {
            self.publish(current.with_assignment(assignment.clone(), true))
                .await;
        }

        if !inserted {
            return Err(PolicyError::Conflict("role assignment".to_string()));
        }

        info!("Assigned role {} to {}", assignment.role, assignment.user);
        Ok(assignment)
    }

    pub async fn unassign_role(&self, user: &str, role: &str) -> Result<(), PolicyError> {
        let assignment = RoleAssignment::new(user, role)?;
        let _guard = self.writer.lock().await;
        let current = self.snapshot().await?;

        let removed = bounded(
            self.adapter.delete_assignment(&assignment),
            self.timeout_ms,
            "policy_delete_assignment",
        )
        .await?;

        if current.contains_assignment(&assignment) {
            self.publish(current.with_assignment(assignment.clone(), false))
                .await;
        }

        if !removed {
            return Err(PolicyError::NotFound("role assignment".to_string()));
        }

        info!("Removed role {} from {}", assignment.role, assignment.user);
        Ok(())
    }

    pub async fn roles_of(&self, user: &str) -> Result<BTreeSet<String>, PolicyError> {
        Ok(self.snapshot().await?.roles_of(user))
    }

    pub async fn users_of(&self, role: &str) -> Result<BTreeSet<String>, PolicyError> {
        Ok(self.snapshot().await?.users_of(role))
    }

    pub async fn all_roles(&self) -> Result<BTreeSet<String>, PolicyError> {
        Ok(self.snapshot().await?.all_roles())
    }

    pub async fn role_memberships(&self) -> Result<BTreeMap<String, Vec<String>>, PolicyError> {
        Ok(self.snapshot().await?.memberships())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PolicyStore {
        PolicyStore::memory(&AuthConfig::default())
    }

    #[tokio::test]
    async fn test_role_inheritance() {
        let store = store();
        store.add_permission("trainer", "exercises", "read").await.unwrap();
        store.assign_role("coach@example.com", "trainer").await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(
            snapshot.grant_for("coach@example.com", "exercises", "read"),
            Some(Grant::Role("trainer".to_string()))
        );
        assert_eq!(snapshot.grant_for("coach@example.com", "exercises", "delete"), None);
        assert_eq!(snapshot.grant_for("someone@example.com", "exercises", "read"), None);
    }

    #[tokio::test]
    async fn test_direct_grant_preferred() {
        let store = store();
        store.add_permission("trainer", "routines", "read").await.unwrap();
        store.add_permission("coach", "routines", "read").await.unwrap();
        store.assign_role("coach", "trainer").await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.grant_for("coach", "routines", "read"), Some(Grant::Direct));
    }

    #[tokio::test]
    async fn test_duplicate_permission_conflicts() {
        let store = store();
        store.add_permission("admin", "permissions", "read").await.unwrap();
        let result = store.add_permission("admin", "permissions", "read").await;
        assert!(matches!(result, Err(PolicyError::Conflict(_))));
        assert_eq!(store.list_permissions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_permission_not_found() {
        let store = store();
        let result = store.remove_permission("admin", "permissions", "read").await;
        assert!(matches!(result, Err(PolicyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_blank_fields_rejected() {
        let store = store();
        assert!(matches!(
            store.add_permission("admin", " ", "read").await,
            Err(PolicyError::Invalid { field: "object" })
        ));
        assert!(matches!(
            store.assign_role("", "trainer").await,
            Err(PolicyError::Invalid { field: "user" })
        ));
    }

    #[tokio::test]
    async fn test_filters_and_memberships() {
        let store = store();
        store.add_permission("trainer", "exercises", "read").await.unwrap();
        store.add_permission("trainer", "routines", "read").await.unwrap();
        store.add_permission("admin", "permissions", "read").await.unwrap();
        store.assign_role("coach", "trainer").await.unwrap();
        store.assign_role("alice", "trainer").await.unwrap();
        store.assign_role("alice", "admin").await.unwrap();

        assert_eq!(store.find_permissions("trainer").await.unwrap().len(), 2);
        assert!(store.find_permissions("nobody").await.unwrap().is_empty());

        let alice: Vec<String> = store.roles_of("alice").await.unwrap().into_iter().collect();
        assert_eq!(alice, vec!["admin".to_string(), "trainer".to_string()]);

        let trainers: Vec<String> = store.users_of("trainer").await.unwrap().into_iter().collect();
        assert_eq!(trainers, vec!["alice".to_string(), "coach".to_string()]);

        assert_eq!(store.all_roles().await.unwrap().len(), 2);
        let memberships = store.role_memberships().await.unwrap();
        assert_eq!(memberships["admin"], vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn test_unassign_role_revokes_inherited_grants() {
        let store = store();
        store.add_permission("trainer", "exercises", "read").await.unwrap();
        store.assign_role("coach", "trainer").await.unwrap();
        store.unassign_role("coach", "trainer").await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.grant_for("coach", "exercises", "read"), None);
        assert!(matches!(
            store.unassign_role("coach", "trainer").await,
            Err(PolicyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unloaded_store_is_unavailable() {
        let store = PolicyStore::new(Arc::new(MemoryPolicyAdapter::new()), &AuthConfig::default());
        assert!(matches!(store.snapshot().await, Err(PolicyError::Unavailable)));
        assert!(matches!(
            store.add_permission("a", "b", "read").await,
            Err(PolicyError::Unavailable)
        ));

        store.reload().await.unwrap();
        assert!(store.snapshot().await.is_ok());
    }

    #[tokio::test]
    async fn test_held_snapshot_unaffected_by_mutation() {
        let store = store();
        store.add_permission("trainer", "exercises", "read").await.unwrap();
        store.assign_role("coach", "trainer").await.unwrap();

        let before = store.snapshot().await.unwrap();
        store.remove_permission("trainer", "exercises", "read").await.unwrap();
        let after = store.snapshot().await.unwrap();

        assert!(before.grant_for("coach", "exercises", "read").is_some());
        assert!(after.grant_for("coach", "exercises", "read").is_none());
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_changes() {
        let adapter = Arc::new(MemoryPolicyAdapter::new());
        let store = PolicyStore::open(adapter.clone(), &AuthConfig::default())
            .await
            .unwrap();
        let before = store.snapshot().await.unwrap();

        adapter
            .insert_rule(&PermissionRule::new("admin", "permissions", "create").unwrap())
            .await
            .unwrap();
        assert_eq!(store.list_permissions().await.unwrap().len(), 0);

        store.reload().await.unwrap();
        assert_eq!(store.list_permissions().await.unwrap().len(), 1);
        assert_eq!(before.rule_count(), 0);
    }

    #[tokio::test]
    async fn test_reload_after_external_removal_keeps_held_snapshot() {
        let adapter = Arc::new(MemoryPolicyAdapter::new());
        let rule = PermissionRule::new("trainer", "routines", "update").unwrap();
        adapter.insert_rule(&rule).await.unwrap();
        let store = PolicyStore::open(adapter.clone(), &AuthConfig::default())
            .await
            .unwrap();

        let before = store.snapshot().await.unwrap();
        assert!(adapter.delete_rule(&rule).await.unwrap());
        store.reload().await.unwrap();
        let after = store.snapshot().await.unwrap();

        assert_eq!(
            before.grant_for("trainer", "routines", "update"),
            Some(Grant::Direct)
        );
        assert_eq!(after.grant_for("trainer", "routines", "update"), None);
        assert_eq!(before.grant_for("trainer", "routines", "read"), None);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_all_land() {
        let store = store();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add_permission(&format!("user-{i}"), "exercises", "read")
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.list_permissions().await.unwrap().len(), 16);
    }
}
