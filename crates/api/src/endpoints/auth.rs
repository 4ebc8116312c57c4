//! Account endpoints: register, login, logout, me, password reset.

use axum::{Json, Router, extract::State, routing::post};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use updoot_common::AppResult;
use updoot_core::{FieldError, RegisterInput, UserResponse};
use updoot_db::entities::user;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Public view of a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<user::Model> for UserSummary {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Field errors or the user plus their bearer token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<UserResponse> for AuthResponse {
    fn from(res: UserResponse) -> Self {
        Self {
            errors: res.errors,
            user: res.user.map(UserSummary::from),
            token: res.token,
        }
    }
}

/// Register request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Create a new account.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let res = state
        .user_service
        .register(RegisterInput {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok(ApiResponse::ok(res.into()))
}

/// Login request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Log in with username or email.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let res = state
        .user_service
        .login(&req.username_or_email, &req.password)
        .await?;

    Ok(ApiResponse::ok(res.into()))
}

/// Log out (invalidate current token by regenerating).
async fn logout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<bool>> {
    let ok = state.user_service.logout(user.id).await?;
    Ok(ApiResponse::ok(ok))
}

/// The current user, or null.
async fn me(MaybeAuthUser(user): MaybeAuthUser) -> ApiResponse<Option<UserSummary>> {
    ApiResponse::ok(user.map(UserSummary::from))
}

/// Forgot password request.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Send a password reset link.
async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<bool>> {
    let ok = state
        .password_reset_service
        .forgot_password(&req.email)
        .await?;
    Ok(ApiResponse::ok(ok))
}

/// Change password request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Set a new password with a reset token.
async fn change_password(
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let res = state
        .password_reset_service
        .change_password(&req.token, &req.new_password)
        .await?;

    Ok(ApiResponse::ok(res.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", post(me))
        .route("/forgot-password", post(forgot_password))
        .route("/change-password", post(change_password))
}
