//! API integration tests.
//!
//! These tests drive the full router (with auth middleware) against a mock
//! database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    middleware,
    response::Response,
};
use chrono::Utc;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
use serde_json::Value;
use tower::ServiceExt;
use updoot_api::{middleware::AppState, router as api_router};
use updoot_common::config::{AuthConfig, Config, DatabaseConfig, RedisConfig, ServerConfig};
use updoot_core::{
    InMemoryResetTokenStore, LoaderFactory, LogResetLinkSender, PasswordResetService,
    PostService, UserService, VoteService,
};
use updoot_db::{
    entities::{post, updoot, user},
    repositories::{PostRepository, UpdootRepository, UserRepository},
};

/// Create a test configuration.
fn create_test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 4000,
            url: "http://localhost:4000".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://localhost/test".to_string(),
            max_connections: 10,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://localhost".to_string(),
            prefix: "updoot".to_string(),
        },
        auth: AuthConfig::default(),
    }
}

fn create_test_user(id: i32) -> user::Model {
    user::Model {
        id,
        username: format!("user{id}"),
        email: format!("user{id}@example.com"),
        password: String::new(),
        token: Some(format!("token-{id}")),
        created_at: Utc::now().into(),
        updated_at: Utc::now().into(),
    }
}

fn create_test_post(id: i32, creator_id: i32, text: &str) -> post::Model {
    post::Model {
        id,
        title: format!("Post {id}"),
        text: text.to_string(),
        points: 0,
        creator_id,
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

/// Create the test router on top of `db`.
fn create_test_router(db: MockDatabase) -> Router {
    let db = Arc::new(db.into_connection());
    let config = create_test_config();

    let user_repo = UserRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let updoot_repo = UpdootRepository::new(Arc::clone(&db));

    let state = AppState {
        user_service: UserService::new(user_repo.clone(), &config),
        post_service: PostService::new(post_repo.clone()),
        vote_service: VoteService::new(Arc::clone(&db), post_repo, updoot_repo.clone()),
        password_reset_service: PasswordResetService::new(
            user_repo.clone(),
            Arc::new(InMemoryResetTokenStore::new()),
            Arc::new(LogResetLinkSender),
            &config,
        ),
        loaders: LoaderFactory::new(user_repo, updoot_repo),
    };

    Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            updoot_api::middleware::auth_middleware,
        ))
        .with_state(state)
}

fn post_json(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_vote_without_token_is_unauthorized() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(post_json("/api/posts/vote", None, r#"{"postId":1,"value":1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_vote_with_token() {
    let app = create_test_router(
        MockDatabase::new(DatabaseBackend::Postgres)
            // auth middleware
            .append_query_results([[create_test_user(2)]])
            // post row lock
            .append_query_results([[create_test_post(1, 1, "body")]])
            // no prior vote
            .append_query_results([Vec::<updoot::Model>::new()])
            .append_exec_results([exec_ok(), exec_ok()]),
    );

    let response = app
        .oneshot(post_json(
            "/api/posts/vote",
            Some("token-2"),
            r#"{"postId":1,"value":-1}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"], true);
}

#[tokio::test]
async fn test_vote_on_missing_post_is_not_found() {
    let app = create_test_router(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user(2)]])
            .append_query_results([Vec::<post::Model>::new()]),
    );

    let response = app
        .oneshot(post_json(
            "/api/posts/vote",
            Some("token-2"),
            r#"{"postId":77,"value":1}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_posts_anonymous() {
    let long_text = "a".repeat(80);
    let app = create_test_router(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                create_test_post(2, 1, &long_text),
                create_test_post(1, 1, "short"),
            ]])
            .append_query_results([[create_test_user(1)]]),
    );

    let response = app
        .oneshot(post_json("/api/posts/list", None, r#"{"limit":5}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let posts = body["data"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(body["data"]["hasMore"], false);
    assert_eq!(posts[0]["textSnippet"].as_str().unwrap().len(), 50);
    assert_eq!(posts[0]["creator"]["username"], "user1");
    assert!(posts[0]["voteStatus"].is_null());
    assert!(posts[0]["creator"].get("password").is_none());
}

#[tokio::test]
async fn test_list_posts_bad_cursor() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(post_json(
            "/api/posts/list",
            None,
            r#"{"limit":5,"cursor":"not-a-time"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_show_missing_post_is_null() {
    let app = create_test_router(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new()]),
    );

    let response = app
        .oneshot(post_json("/api/posts/show", None, r#"{"id":5}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_create_post_requires_auth() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(post_json(
            "/api/posts/create",
            None,
            r#"{"title":"Hi","text":"there"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_anonymous_is_null() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app.oneshot(post_json("/api/me", None, "{}")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_me_with_token() {
    let app = create_test_router(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user(3)]]),
    );

    let response = app
        .oneshot(post_json("/api/me", Some("token-3"), "{}"))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["data"]["id"], 3);
    assert_eq!(body["data"]["username"], "user3");
}

#[tokio::test]
async fn test_register_field_error() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(post_json(
            "/api/register",
            None,
            r#"{"username":"jo","email":"jo@example.com","password":"secret"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["errors"][0]["field"], "username");
    assert!(body["data"].get("user").is_none());
}

#[tokio::test]
async fn test_forgot_password_unknown_email() {
    let app = create_test_router(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]),
    );

    let response = app
        .oneshot(post_json(
            "/api/forgot-password",
            None,
            r#"{"email":"ghost@example.com"}"#,
        ))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["data"], true);
}

#[tokio::test]
async fn test_change_password_invalid_token() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(post_json(
            "/api/change-password",
            None,
            r#"{"token":"nope","newPassword":"longenough"}"#,
        ))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["data"]["errors"][0]["field"], "token");
}
