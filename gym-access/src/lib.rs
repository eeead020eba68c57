//! Gym Access - credential validation, route inference and role-based policy
//! evaluation.
//!
//! The crate is framework-free: callers hand it credential header values,
//! the HTTP method and the matched route template, and get back either an
//! [`AccessContext`] or an [`AccessError`].

pub mod credentials;
pub mod error;
pub mod evaluator;
pub mod identity;
pub mod inference;
pub mod pipeline;
pub mod policy;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod tokens;

pub use credentials::{
    ApiKeyRecord, ApiKeyStorage, CredentialStore, IssuedApiKey, MemoryApiKeyStorage,
};
pub use error::{AccessError, CredentialError, InferenceError, InvalidReason, PolicyError};
pub use evaluator::{evaluate_with, Decision, DecisionRecord, PolicyEvaluator, SubjectCheck};
pub use identity::{
    CredentialHeaders, CredentialSource, Identity, IdentityResolver, ResolvedIdentities,
};
pub use inference::{infer, Action, RequestDescriptor};
pub use pipeline::{AccessContext, AccessControl};
pub use policy::{
    Grant, MemoryPolicyAdapter, PermissionRule, PolicyAdapter, PolicyData, PolicySnapshot,
    PolicyStore, RoleAssignment,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteApiKeyStorage, SqlitePolicyAdapter};
pub use tokens::{Claims, IssuedToken, TokenIdentity, TokenKind, TokenService};
