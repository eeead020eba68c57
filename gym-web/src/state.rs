//! Application state shared by every handler

use crate::auth::users::UserService;
use crate::database::{self, Database};
use crate::error::WebResult;
use gym_access::{
    AccessControl, CredentialStore, IdentityResolver, PolicyError, PolicyEvaluator, PolicyStore,
    SqliteApiKeyStorage, SqlitePolicyAdapter, TokenService,
};
use gym_core::GymConfig;
use std::sync::Arc;
use tracing::info;

/// Role granted to the configured bootstrap administrator
pub const ADMIN_ROLE: &str = "admin";

/// Objects the administrator role is granted on
pub const ADMIN_OBJECTS: [&str; 5] = [
    "exercises",
    "routines",
    "api-keys",
    "permissions",
    "applications",
];

const ADMIN_ACTIONS: [&str; 4] = ["read", "create", "update", "delete"];

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GymConfig>,
    pub database: Database,
    pub credentials: CredentialStore,
    pub tokens: TokenService,
    pub policy: PolicyStore,
    pub access: AccessControl,
    pub users: UserService,
}

impl AppState {
    /// Connect to storage, load the policy and wire the access pipeline
    pub async fn new(config: GymConfig) -> WebResult<Self> {
        let pool = database::connect(&config.database).await?;

        let database = Database::new(pool.clone()).await?;
        let key_storage = SqliteApiKeyStorage::new(pool.clone()).await?;
        let policy_adapter = SqlitePolicyAdapter::new(pool).await?;

        let credentials = CredentialStore::new(Arc::new(key_storage), &config.auth);
        let policy = PolicyStore::open(Arc::new(policy_adapter), &config.auth).await?;
        let tokens = TokenService::new(&config.auth);

        let access = AccessControl::new(
            IdentityResolver::new(credentials.clone(), tokens.clone()),
            PolicyEvaluator::new(policy.clone()),
        );
        let users = UserService::new(database.clone(), tokens.clone(), policy.clone());

        let state = Self {
            config: Arc::new(config),
            database,
            credentials,
            tokens,
            policy,
            access,
            users,
        };

        if let Some(subject) = state.config.auth.bootstrap_admin.clone() {
            state.bootstrap_admin(&subject).await?;
        }

        info!(
            "Application state ready (database: {})",
            state.config.database.url
        );
        Ok(state)
    }

    /// State over a private in-memory database
    pub async fn for_testing() -> WebResult<Self> {
        Self::new(GymConfig::for_testing()).await
    }

    /// Give `subject` the admin role and make sure the role can manage every
    /// resource. Grants that already exist are left alone.
    pub async fn bootstrap_admin(&self, subject: &str) -> WebResult<()> {
        let mut granted = 0;

        for object in ADMIN_OBJECTS {
            for action in ADMIN_ACTIONS {
                match self.policy.add_permission(ADMIN_ROLE, object, action).await {
                    Ok(_) => granted += 1,
                    Err(PolicyError::Conflict(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        match self.policy.assign_role(subject, ADMIN_ROLE).await {
            Ok(_) | Err(PolicyError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }

        info!(
            "Bootstrap admin {} ready ({} new grants)",
            subject, granted
        );
        Ok(())
    }
}
