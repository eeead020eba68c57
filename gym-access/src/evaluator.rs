//! Policy evaluation
//!
//! Every resolved identity must independently be granted the inferred
//! (object, action). Role membership comes from the policy store only;
//! roles claimed inside a token are ignored here. The `unknown` action is
//! never granted.

use crate::error::AccessError;
use crate::identity::{CredentialSource, ResolvedIdentities};
use crate::inference::{Action, RequestDescriptor};
use crate::policy::{Grant, PolicySnapshot, PolicyStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

/// Result of checking one identity
#[derive(Debug, Clone, Serialize)]
pub struct SubjectCheck {
    pub subject: String,
    pub source: CredentialSource,
    pub grant: Option<Grant>,
}

impl SubjectCheck {
    pub fn allowed(&self) -> bool {
        self.grant.is_some()
    }
}

/// Full record of an access decision
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub decision: Decision,
    pub object: String,
    pub action: String,
    pub checks: Vec<SubjectCheck>,
    pub policy_loaded_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }

    /// The first subject that was refused, if any
    pub fn denied_subject(&self) -> Option<&str> {
        self.checks
            .iter()
            .find(|check| !check.allowed())
            .map(|check| check.subject.as_str())
    }
}

/// Evaluate against a fixed snapshot
pub fn evaluate_with(
    snapshot: &PolicySnapshot,
    identities: &ResolvedIdentities,
    descriptor: &RequestDescriptor,
) -> DecisionRecord {
    let action = descriptor.action.as_str();
    let grantable = descriptor.action != Action::Unknown;

    let checks: Vec<SubjectCheck> = identities
        .iter()
        .map(|identity| SubjectCheck {
            subject: identity.subject.clone(),
            source: identity.source,
            grant: grantable
                .then(|| snapshot.grant_for(&identity.subject, &descriptor.object, action))
                .flatten(),
        })
        .collect();

    let decision = if !checks.is_empty() && checks.iter().all(SubjectCheck::allowed) {
        Decision::Allow
    } else {
        Decision::Deny
    };

    DecisionRecord {
        decision,
        object: descriptor.object.clone(),
        action: action.to_string(),
        checks,
        policy_loaded_at: snapshot.loaded_at(),
    }
}

/// Evaluates requests against the current policy snapshot
#[derive(Clone)]
pub struct PolicyEvaluator {
    policy: PolicyStore,
}

impl PolicyEvaluator {
    pub fn new(policy: PolicyStore) -> Self {
        Self { policy }
    }

    /// Produce a decision record. Errors only on infrastructure faults; a
    /// denial is a successful evaluation.
    pub async fn evaluate(
        &self,
        identities: &ResolvedIdentities,
        descriptor: &RequestDescriptor,
    ) -> Result<DecisionRecord, AccessError> {
        let snapshot: Arc<PolicySnapshot> = self.policy.snapshot().await?;
        let record = evaluate_with(&snapshot, identities, descriptor);

        debug!(
            decision = ?record.decision,
            object = %record.object,
            action = %record.action,
            subjects = record.checks.len(),
            "Policy evaluated"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::identity::{CredentialHeaders, IdentityResolver};
    use crate::inference::infer;
    use crate::policy::{MemoryPolicyAdapter, PermissionRule, PolicyData, RoleAssignment};
    use crate::tokens::{TokenKind, TokenService};
    use gym_core::AuthConfig;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "evaluator-test-secret-01".to_string(),
            ..AuthConfig::default()
        }
    }

    struct Fixture {
        resolver: IdentityResolver,
        credentials: CredentialStore,
        tokens: TokenService,
        policy: PolicyStore,
    }

    async fn fixture() -> Fixture {
        let config = config();
        let adapter = MemoryPolicyAdapter::with_data(PolicyData {
            rules: vec![
                PermissionRule::new("trainer", "exercises", "read").unwrap(),
                PermissionRule::new("partner-app", "exercises", "read").unwrap(),
            ],
            assignments: vec![RoleAssignment::new("coach@example.com", "trainer").unwrap()],
        });
        let policy = PolicyStore::open(Arc::new(adapter), &config).await.unwrap();
        let credentials = CredentialStore::memory(&config);
        let tokens = TokenService::new(&config);
        Fixture {
            resolver: IdentityResolver::new(credentials.clone(), tokens.clone()),
            credentials,
            tokens,
            policy,
        }
    }

    fn bearer(tokens: &TokenService, subject: &str, roles: &[&str]) -> Option<String> {
        let roles = roles.iter().map(|r| r.to_string()).collect();
        let issued = tokens.issue(subject, roles, TokenKind::User).unwrap();
        Some(format!("Bearer {}", issued.token))
    }

    #[tokio::test]
    async fn test_token_subject_allowed_through_role() {
        let f = fixture().await;
        let identities = f
            .resolver
            .resolve(&CredentialHeaders {
                api_key: None,
                authorization: bearer(&f.tokens, "coach@example.com", &[]),
            })
            .await
            .unwrap();

        let evaluator = PolicyEvaluator::new(f.policy.clone());
        let record = evaluator
            .evaluate(&identities, &infer("GET", Some("/exercises")).unwrap())
            .await
            .unwrap();

        assert!(record.is_allowed());
        assert_eq!(record.checks[0].grant, Some(Grant::Role("trainer".to_string())));

        let record = evaluator
            .evaluate(&identities, &infer("DELETE", Some("/exercises/{id}")).unwrap())
            .await
            .unwrap();
        assert!(!record.is_allowed());
    }

    #[tokio::test]
    async fn test_token_role_claims_do_not_grant_access() {
        let f = fixture().await;
        let identities = f
            .resolver
            .resolve(&CredentialHeaders {
                api_key: None,
                authorization: bearer(&f.tokens, "stranger@example.com", &["trainer"]),
            })
            .await
            .unwrap();

        let record = PolicyEvaluator::new(f.policy.clone())
            .evaluate(&identities, &infer("GET", Some("/exercises")).unwrap())
            .await
            .unwrap();

        assert_eq!(record.decision, Decision::Deny);
    }

    #[tokio::test]
    async fn test_dual_identities_both_must_pass() {
        let f = fixture().await;
        let outsider_key = f.credentials.create_key("outsider").await.unwrap();
        let partner_key = f.credentials.create_key("partner-app").await.unwrap();
        let evaluator = PolicyEvaluator::new(f.policy.clone());
        let descriptor = infer("GET", Some("/exercises")).unwrap();

        let denied = f
            .resolver
            .resolve(&CredentialHeaders {
                api_key: Some(outsider_key.api_key),
                authorization: bearer(&f.tokens, "coach@example.com", &[]),
            })
            .await
            .unwrap();
        let record = evaluator.evaluate(&denied, &descriptor).await.unwrap();
        assert_eq!(record.decision, Decision::Deny);
        assert_eq!(record.denied_subject(), Some("outsider"));

        let allowed = f
            .resolver
            .resolve(&CredentialHeaders {
                api_key: Some(partner_key.api_key),
                authorization: bearer(&f.tokens, "coach@example.com", &[]),
            })
            .await
            .unwrap();
        let record = evaluator.evaluate(&allowed, &descriptor).await.unwrap();
        assert!(record.is_allowed());
        assert_eq!(record.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_action_never_granted() {
        let f = fixture().await;
        let identities = f
            .resolver
            .resolve(&CredentialHeaders {
                api_key: None,
                authorization: bearer(&f.tokens, "coach@example.com", &[]),
            })
            .await
            .unwrap();
        let descriptor = infer("OPTIONS", Some("/exercises")).unwrap();
        let evaluator = PolicyEvaluator::new(f.policy.clone());

        assert!(!evaluator.evaluate(&identities, &descriptor).await.unwrap().is_allowed());

        f.policy
            .add_permission("trainer", "exercises", "unknown")
            .await
            .unwrap();
        assert!(!evaluator.evaluate(&identities, &descriptor).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_evaluation_uses_one_snapshot() {
        let f = fixture().await;
        let identities = f
            .resolver
            .resolve(&CredentialHeaders {
                api_key: None,
                authorization: bearer(&f.tokens, "coach@example.com", &[]),
            })
            .await
            .unwrap();
        let descriptor = infer("GET", Some("/exercises")).unwrap();

        let held = f.policy.snapshot().await.unwrap();
        f.policy
            .unassign_role("coach@example.com", "trainer")
            .await
            .unwrap();

        assert!(evaluate_with(&held, &identities, &descriptor).is_allowed());
        let fresh = f.policy.snapshot().await.unwrap();
        assert!(!evaluate_with(&fresh, &identities, &descriptor).is_allowed());
    }

    #[tokio::test]
    async fn test_unloaded_policy_is_infrastructure_error() {
        let f = fixture().await;
        let unloaded = PolicyStore::new(Arc::new(MemoryPolicyAdapter::new()), &config());
        let identities = f
            .resolver
            .resolve(&CredentialHeaders {
                api_key: None,
                authorization: bearer(&f.tokens, "coach@example.com", &[]),
            })
            .await
            .unwrap();

        let result = PolicyEvaluator::new(unloaded)
            .evaluate(&identities, &infer("GET", Some("/exercises")).unwrap())
            .await;
        assert!(matches!(result, Err(AccessError::PolicyUnavailable)));
    }
}
