//! Password reset service.
//!
//! Reset tokens live in Redis under `{prefix}:forget-password:{token}` and
//! map to a user ID until they expire or are used.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use fred::{clients::Client as RedisClient, interfaces::KeysInterface, types::Expiration};
use tokio::sync::Mutex;
use tracing::{debug, info};
use updoot_common::{AppError, AppResult, Config, IdGenerator};
use updoot_db::repositories::UserRepository;

use crate::services::user::{UserResponse, hash_password};

/// Key prefix for reset tokens.
pub const FORGET_PASSWORD_PREFIX: &str = "forget-password:";

/// Storage for short-lived reset tokens.
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Store `token` → `user_id`, expiring after `ttl_secs`.
    async fn put(&self, token: &str, user_id: i32, ttl_secs: i64) -> AppResult<()>;

    /// Look up the user a token was issued for.
    async fn get(&self, token: &str) -> AppResult<Option<i32>>;

    /// Remove a token.
    async fn remove(&self, token: &str) -> AppResult<()>;
}

/// Delivery of reset links to users.
#[async_trait]
pub trait ResetLinkSender: Send + Sync {
    /// Send `link` to `email`.
    async fn send(&self, email: &str, link: &str) -> AppResult<()>;
}

/// Redis-backed token store.
#[derive(Clone)]
pub struct RedisResetTokenStore {
    redis: Arc<RedisClient>,
    prefix: String,
}

impl RedisResetTokenStore {
    /// Create a new store using `prefix` as the key namespace.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, prefix: &str) -> Self {
        Self {
            redis,
            prefix: prefix.to_string(),
        }
    }

    fn key(&self, token: &str) -> String {
        format!("{}:{FORGET_PASSWORD_PREFIX}{token}", self.prefix)
    }
}

#[async_trait]
impl ResetTokenStore for RedisResetTokenStore {
    async fn put(&self, token: &str, user_id: i32, ttl_secs: i64) -> AppResult<()> {
        self.redis
            .set::<(), _, _>(
                self.key(token),
                user_id.to_string(),
                Some(Expiration::EX(ttl_secs)),
                None,
                false,
            )
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn get(&self, token: &str) -> AppResult<Option<i32>> {
        let value: Option<String> = self
            .redis
            .get(self.key(token))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        Ok(value.and_then(|v| v.parse().ok()))
    }

    async fn remove(&self, token: &str) -> AppResult<()> {
        self.redis
            .del::<(), _>(self.key(token))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}

/// In-process token store for tests and single-node development.
#[derive(Default)]
pub struct InMemoryResetTokenStore {
    entries: Mutex<HashMap<String, (i32, Instant)>>,
}

impl InMemoryResetTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResetTokenStore for InMemoryResetTokenStore {
    async fn put(&self, token: &str, user_id: i32, ttl_secs: i64) -> AppResult<()> {
        let ttl = Duration::from_secs(u64::try_from(ttl_secs).unwrap_or(0));
        self.entries
            .lock()
            .await
            .insert(token.to_string(), (user_id, Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, token: &str) -> AppResult<Option<i32>> {
        let mut entries = self.entries.lock().await;
        match entries.get(token) {
            Some(&(user_id, expires_at)) if Instant::now() < expires_at => Ok(Some(user_id)),
            Some(_) => {
                entries.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, token: &str) -> AppResult<()> {
        self.entries.lock().await.remove(token);
        Ok(())
    }
}

/// Sender that only logs the link. Real mail delivery is plugged in by
/// implementing [`ResetLinkSender`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogResetLinkSender;

#[async_trait]
impl ResetLinkSender for LogResetLinkSender {
    async fn send(&self, email: &str, link: &str) -> AppResult<()> {
        info!(email = %email, link = %link, "Password reset link issued");
        Ok(())
    }
}

/// Password reset service.
#[derive(Clone)]
pub struct PasswordResetService {
    user_repo: UserRepository,
    store: Arc<dyn ResetTokenStore>,
    sender: Arc<dyn ResetLinkSender>,
    id_gen: IdGenerator,
    client_url: String,
    ttl_secs: i64,
    min_password_len: usize,
}

impl PasswordResetService {
    /// Create a new password reset service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        store: Arc<dyn ResetTokenStore>,
        sender: Arc<dyn ResetLinkSender>,
        config: &Config,
    ) -> Self {
        Self {
            user_repo,
            store,
            sender,
            id_gen: IdGenerator::new(),
            client_url: config.auth.client_url.trim_end_matches('/').to_string(),
            ttl_secs: config.auth.reset_token_ttl_secs,
            min_password_len: config.auth.min_password_len,
        }
    }

    /// Issue a reset link for `email`.
    ///
    /// Always returns `true` so callers cannot probe which emails exist.
    pub async fn forgot_password(&self, email: &str) -> AppResult<bool> {
        let Some(user) = self.user_repo.find_by_email(email).await? else {
            debug!(email = %email, "Password reset requested for unknown email");
            return Ok(true);
        };

        let token = self.id_gen.generate_uuid_v4();
        self.store.put(&token, user.id, self.ttl_secs).await?;

        let link = format!("{}/change-password/{token}", self.client_url);
        self.sender.send(&user.email, &link).await?;

        info!(user_id = user.id, "Password reset token issued");
        Ok(true)
    }

    /// Set a new password using a reset token. The token is consumed.
    pub async fn change_password(&self, token: &str, new_password: &str) -> AppResult<UserResponse> {
        if new_password.chars().count() < self.min_password_len {
            return Ok(UserResponse::error(
                "newPassword",
                format!(
                    "Length must be greater than {}",
                    self.min_password_len.saturating_sub(1)
                ),
            ));
        }

        let Some(user_id) = self.store.get(token).await? else {
            return Ok(UserResponse::error("token", "Invalid token"));
        };

        let Some(user) = self.user_repo.find_by_id(user_id).await? else {
            return Ok(UserResponse::error("token", "User no longer exists"));
        };

        let password_hash = hash_password(new_password)?;
        self.user_repo.update_password(user.id, &password_hash).await?;
        self.store.remove(token).await?;

        let session_token = match user.token.clone() {
            Some(t) => t,
            None => {
                let t = self.id_gen.generate_token();
                self.user_repo.update_token(user.id, &t).await?;
                t
            }
        };

        info!(user_id = user.id, "Password changed");
        Ok(UserResponse::user(user, session_token))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use updoot_common::config::{AuthConfig, DatabaseConfig, RedisConfig, ServerConfig};
    use updoot_db::entities::user;

    /// Captures sent links.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ResetLinkSender for RecordingSender {
        async fn send(&self, email: &str, link: &str) -> AppResult<()> {
            self.sent
                .lock()
                .await
                .push((email.to_string(), link.to_string()));
            Ok(())
        }
    }

    fn create_test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 4000,
                url: "http://localhost:4000".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/test".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://localhost".to_string(),
                prefix: "test".to_string(),
            },
            auth: AuthConfig::default(),
        }
    }

    fn create_test_user(id: i32) -> user::Model {
        user::Model {
            id,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "old".to_string(),
            token: Some("session".to_string()),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[tokio::test]
    async fn test_in_memory_store_expiry() {
        let store = InMemoryResetTokenStore::new();
        store.put("fresh", 1, 60).await.unwrap();
        store.put("stale", 2, 0).await.unwrap();

        assert_eq!(store.get("fresh").await.unwrap(), Some(1));
        assert_eq!(store.get("stale").await.unwrap(), None);

        store.remove("fresh").await.unwrap();
        assert_eq!(store.get("fresh").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_still_true() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let sender = Arc::new(RecordingSender::default());
        let service = PasswordResetService::new(
            UserRepository::new(Arc::new(db)),
            Arc::new(InMemoryResetTokenStore::new()),
            sender.clone(),
            &create_test_config(),
        );

        assert!(service.forgot_password("nobody@example.com").await.unwrap());
        assert!(sender.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_forgot_password_stores_token_and_sends_link() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user(7)]])
            .into_connection();
        let store = Arc::new(InMemoryResetTokenStore::new());
        let sender = Arc::new(RecordingSender::default());
        let service = PasswordResetService::new(
            UserRepository::new(Arc::new(db)),
            store.clone(),
            sender.clone(),
            &create_test_config(),
        );

        assert!(service.forgot_password("alice@example.com").await.unwrap());

        let sent = sender.sent.lock().await;
        assert_eq!(sent.len(), 1);
        let (email, link) = &sent[0];
        assert_eq!(email, "alice@example.com");

        let token = link
            .strip_prefix("http://localhost:3000/change-password/")
            .unwrap();
        assert_eq!(store.get(token).await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_change_password_too_short() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = PasswordResetService::new(
            UserRepository::new(Arc::new(db)),
            Arc::new(InMemoryResetTokenStore::new()),
            Arc::new(LogResetLinkSender),
            &create_test_config(),
        );

        let response = service.change_password("any", "ab").await.unwrap();

        assert_eq!(response.errors.unwrap()[0].field, "newPassword");
    }

    #[tokio::test]
    async fn test_change_password_invalid_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = PasswordResetService::new(
            UserRepository::new(Arc::new(db)),
            Arc::new(InMemoryResetTokenStore::new()),
            Arc::new(LogResetLinkSender),
            &create_test_config(),
        );

        let response = service.change_password("missing", "longenough").await.unwrap();

        let errors = response.errors.unwrap();
        assert_eq!(errors[0].field, "token");
        assert_eq!(errors[0].message, "Invalid token");
    }

    #[tokio::test]
    async fn test_change_password_user_gone() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let store = Arc::new(InMemoryResetTokenStore::new());
        store.put("tok", 9, 60).await.unwrap();
        let service = PasswordResetService::new(
            UserRepository::new(Arc::new(db)),
            store,
            Arc::new(LogResetLinkSender),
            &create_test_config(),
        );

        let response = service.change_password("tok", "longenough").await.unwrap();

        assert_eq!(response.errors.unwrap()[0].message, "User no longer exists");
    }

    #[tokio::test]
    async fn test_change_password_consumes_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user(7)]])
            .append_exec_results([exec_ok()])
            .into_connection();
        let store = Arc::new(InMemoryResetTokenStore::new());
        store.put("tok", 7, 60).await.unwrap();
        let service = PasswordResetService::new(
            UserRepository::new(Arc::new(db)),
            store.clone(),
            Arc::new(LogResetLinkSender),
            &create_test_config(),
        );

        let response = service.change_password("tok", "longenough").await.unwrap();

        assert!(!response.is_error());
        assert_eq!(response.token.as_deref(), Some("session"));
        assert_eq!(store.get("tok").await.unwrap(), None);
    }
}
