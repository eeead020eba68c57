//! The access pipeline: identity resolution, then route inference, then
//! policy evaluation. Stops at the first failure.

use crate::error::AccessError;
use crate::evaluator::{DecisionRecord, PolicyEvaluator};
use crate::identity::{CredentialHeaders, IdentityResolver, ResolvedIdentities};
use crate::inference::{infer, RequestDescriptor};
use serde::Serialize;
use tracing::{debug, warn};

/// Everything established about an allowed request
#[derive(Debug, Clone, Serialize)]
pub struct AccessContext {
    pub identities: ResolvedIdentities,
    pub descriptor: RequestDescriptor,
    pub decision: DecisionRecord,
}

impl AccessContext {
    /// Subject used for ownership of created resources
    pub fn subject(&self) -> &str {
        &self.identities.primary().subject
    }
}

/// Combined resolver and evaluator
#[derive(Clone)]
pub struct AccessControl {
    resolver: IdentityResolver,
    evaluator: PolicyEvaluator,
}

impl AccessControl {
    pub fn new(resolver: IdentityResolver, evaluator: PolicyEvaluator) -> Self {
        Self {
            resolver,
            evaluator,
        }
    }

    /// Authorize a request described by its credential headers, method and
    /// matched route template
    pub async fn authorize(
        &self,
        headers: &CredentialHeaders,
        method: &str,
        route: Option<&str>,
    ) -> Result<AccessContext, AccessError> {
        let identities = self.resolver.resolve(headers).await?;
        let descriptor = infer(method, route)?;
        let decision = self.evaluator.evaluate(&identities, &descriptor).await?;

        if !decision.is_allowed() {
            warn!(
                subject = decision.denied_subject().unwrap_or_default(),
                object = %decision.object,
                action = %decision.action,
                "Access denied"
            );
            return Err(AccessError::Forbidden {
                object: decision.object,
                action: decision.action,
            });
        }

        debug!(
            subject = %identities.primary().subject,
            object = %decision.object,
            action = %decision.action,
            "Access granted"
        );

        Ok(AccessContext {
            identities,
            descriptor,
            decision,
        })
    }
}
