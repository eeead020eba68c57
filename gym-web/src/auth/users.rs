//! User accounts and token issuance

use crate::database::Database;
use crate::error::{WebError, WebResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use gym_access::{IssuedToken, PolicyStore, TokenKind, TokenService};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const MIN_PASSWORD_LEN: usize = 8;

/// User registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// User login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public user information
#[derive(Debug, Serialize, Clone)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Registration, login and application tokens
#[derive(Clone)]
pub struct UserService {
    database: Database,
    tokens: TokenService,
    policy: PolicyStore,
}

impl UserService {
    pub fn new(database: Database, tokens: TokenService, policy: PolicyStore) -> Self {
        Self {
            database,
            tokens,
            policy,
        }
    }

    /// Register a new user
    pub async fn register(&self, request: RegisterRequest) -> WebResult<UserInfo> {
        let email = normalize_email(&request.email)?;

        if request.password.len() < MIN_PASSWORD_LEN {
            return Err(WebError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password_hash = hash_password(&request.password)?;
        let user = self.database.insert_user(&email, &password_hash).await?;

        info!("User registered: {}", user.email);
        Ok(UserInfo {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        })
    }

    /// Verify credentials and issue a user token. Roles come from the policy
    /// store.
    pub async fn login(&self, request: LoginRequest) -> WebResult<IssuedToken> {
        let email = request.email.trim().to_lowercase();
        let invalid = || WebError::InvalidCredentials("Invalid email or password".to_string());

        let user = match self.database.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                debug!("Login for unknown email");
                return Err(invalid());
            }
        };

        if !verify_password(&request.password, &user.password_hash)? {
            warn!("Failed login for {}", user.email);
            return Err(invalid());
        }

        let roles: Vec<String> = self.policy.roles_of(&user.email).await?.into_iter().collect();
        let token = self.tokens.issue(&user.email, roles, TokenKind::User)?;

        info!("User logged in: {}", user.email);
        Ok(token)
    }

    /// Issue an application token for an approved application
    pub async fn application_token(&self, email: &str) -> WebResult<IssuedToken> {
        let email = email.trim().to_lowercase();

        let application = self
            .database
            .find_approved_application(&email)
            .await?
            .ok_or_else(|| {
                WebError::InvalidCredentials("Invalid application or not approved".to_string())
            })?;

        let roles: Vec<String> = self
            .policy
            .roles_of(&application.email)
            .await?
            .into_iter()
            .collect();
        let token = self
            .tokens
            .issue(&application.email, roles, TokenKind::Application)?;

        info!("Issued application token for {}", application.email);
        Ok(token)
    }
}

/// Trim, lowercase and sanity-check an email address
pub(crate) fn normalize_email(email: &str) -> WebResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(WebError::Validation("a valid email is required".to_string())),
    }
}

/// Hash password using Argon2
fn hash_password(password: &str) -> WebResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WebError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify password against hash
fn verify_password(password: &str, hash: &str) -> WebResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| WebError::Internal(format!("stored password hash is invalid: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
