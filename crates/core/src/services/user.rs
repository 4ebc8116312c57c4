//! User service.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;
use updoot_common::{AppError, AppResult, Config, IdGenerator};
use updoot_db::{entities::user, repositories::UserRepository};

/// A validation problem tied to one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result of register/login/change-password: either field errors or the user.
///
/// `token` is the bearer token to use for subsequent requests and is only
/// present when `user` is.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<user::Model>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl UserResponse {
    /// A response carrying a single field error.
    #[must_use]
    pub fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            errors: Some(vec![FieldError::new(field, message)]),
            ..Default::default()
        }
    }

    /// A successful response.
    #[must_use]
    pub fn user(user: user::Model, token: String) -> Self {
        Self {
            errors: None,
            user: Some(user),
            token: Some(token),
        }
    }

    /// Whether the response carries field errors.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.errors.is_some()
    }
}

/// Input for registering a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
    min_password_len: usize,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(user_repo: UserRepository, config: &Config) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
            min_password_len: config.auth.min_password_len,
        }
    }

    /// Check registration input, returning the first problem found.
    #[must_use]
    pub fn validate_register(&self, input: &RegisterInput) -> Option<FieldError> {
        if input.username.chars().count() <= 2 {
            return Some(FieldError::new(
                "username",
                "username must be at least 2 character",
            ));
        }
        if input.username.contains('@') {
            return Some(FieldError::new("username", "Cannot include @ sign"));
        }
        if !input.email.contains('@') {
            return Some(FieldError::new("email", "Invalid email"));
        }
        if input.password.chars().count() <= self.min_password_len {
            return Some(FieldError::new(
                "password",
                format!(
                    "password must be at least {} character",
                    self.min_password_len
                ),
            ));
        }
        None
    }

    /// Register a new user.
    pub async fn register(&self, input: RegisterInput) -> AppResult<UserResponse> {
        if let Some(error) = self.validate_register(&input) {
            return Ok(UserResponse {
                errors: Some(vec![error]),
                ..Default::default()
            });
        }

        let password_hash = hash_password(&input.password)?;
        let token = self.id_gen.generate_token();
        let now = Utc::now();

        let model = user::ActiveModel {
            username: Set(input.username),
            email: Set(input.email),
            password: Set(password_hash),
            token: Set(Some(token.clone())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        match self.user_repo.create(model).await {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "User registered");
                Ok(UserResponse::user(user, token))
            }
            Err(AppError::Conflict(_)) => {
                Ok(UserResponse::error("username", "Username already exist"))
            }
            Err(e) => Err(e),
        }
    }

    /// Log in by username, or by email when the identifier contains `@`.
    pub async fn login(&self, username_or_email: &str, password: &str) -> AppResult<UserResponse> {
        if username_or_email.trim().is_empty() {
            return Ok(UserResponse::error(
                "usernameOrEmail",
                "Username must not be empty",
            ));
        }
        if password.trim().is_empty() {
            return Ok(UserResponse::error("password", "Password must not be empty"));
        }

        let found = if username_or_email.contains('@') {
            self.user_repo.find_by_email(username_or_email).await?
        } else {
            self.user_repo.find_by_username(username_or_email).await?
        };

        let Some(user) = found else {
            return Ok(UserResponse::error("usernameOrEmail", "User not found"));
        };

        if !verify_password(password, &user.password)? {
            return Ok(UserResponse::error("password", "Wrong Password"));
        }

        let token = match user.token.clone() {
            Some(token) => token,
            None => self.regenerate_token(user.id).await?,
        };

        info!(user_id = user.id, "User logged in");
        Ok(UserResponse::user(user, token))
    }

    /// Invalidate the user's current token.
    pub async fn logout(&self, user_id: i32) -> AppResult<bool> {
        self.regenerate_token(user_id).await?;
        info!(user_id, "User logged out");
        Ok(true)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: i32) -> AppResult<Option<user::Model>> {
        self.user_repo.find_by_id(id).await
    }

    /// Authenticate a user by bearer token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Issue a fresh token for a user.
    pub async fn regenerate_token(&self, user_id: i32) -> AppResult<String> {
        let token = self.id_gen.generate_token();
        self.user_repo.update_token(user_id, &token).await?;
        Ok(token)
    }
}

/// Hash a password using Argon2.
pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
