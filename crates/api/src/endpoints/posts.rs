//! Post and voting endpoints.

use axum::{Json, Router, extract::State, routing::post};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use updoot_common::AppResult;
use updoot_core::{CreatePostInput, UpdatePostInput, VoteDirection, text_snippet};
use updoot_db::entities::post;

use super::auth::UserSummary;
use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Post response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub text_snippet: String,
    pub points: i32,
    pub vote_status: Option<i32>,
    pub creator_id: i32,
    pub creator: Option<UserSummary>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl PostResponse {
    fn new(post: post::Model, creator: Option<UserSummary>, vote_status: Option<i32>) -> Self {
        Self {
            text_snippet: text_snippet(&post.text),
            id: post.id,
            title: post.title,
            text: post.text,
            points: post.points,
            vote_status,
            creator_id: post.creator_id,
            creator,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Attach creators and the viewer's vote status to posts, two queries total.
async fn present(
    state: &AppState,
    posts: Vec<post::Model>,
    viewer_id: Option<i32>,
) -> AppResult<Vec<PostResponse>> {
    let users = state.loaders.users();
    let votes = state.loaders.vote_status(viewer_id);

    let creator_ids: Vec<i32> = posts.iter().map(|p| p.creator_id).collect();
    let post_ids: Vec<i32> = posts.iter().map(|p| p.id).collect();

    let creators = users.load_many(&creator_ids).await?;
    let statuses = votes.load_many(&post_ids).await?;

    Ok(posts
        .into_iter()
        .zip(creators)
        .zip(statuses)
        .map(|((post, creator), status)| {
            PostResponse::new(post, creator.map(UserSummary::from), status)
        })
        .collect())
}

/// Vote request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub post_id: i32,
    pub value: i32,
}

/// Up- or downvote a post. `value` of -1 is a downvote, anything else an upvote.
async fn vote(
    user: MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<bool>> {
    state
        .vote_service
        .cast_vote(req.post_id, user.id(), VoteDirection::from_value(req.value))
        .await?;

    Ok(ApiResponse::ok(true))
}

/// List posts request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsRequest {
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Creation time of the last post already seen, in milliseconds.
    pub cursor: Option<String>,
}

const fn default_limit() -> u64 {
    10
}

/// Paginated posts response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedPosts {
    pub posts: Vec<PostResponse>,
    pub has_more: bool,
    /// Cursor for the next page.
    pub next_cursor: Option<String>,
}

/// List posts, newest first.
async fn list(
    user: MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListPostsRequest>,
) -> AppResult<ApiResponse<PaginatedPosts>> {
    let page = state
        .post_service
        .list(req.limit, req.cursor.as_deref())
        .await?;

    let next_cursor = page
        .posts
        .last()
        .map(|p| p.created_at.timestamp_millis().to_string());
    let posts = present(&state, page.posts, user.id()).await?;

    Ok(ApiResponse::ok(PaginatedPosts {
        posts,
        has_more: page.has_more,
        next_cursor,
    }))
}

/// Request addressing a single post.
#[derive(Debug, Deserialize)]
pub struct PostIdRequest {
    pub id: i32,
}

/// Show a single post, or null.
async fn show(
    user: MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<PostIdRequest>,
) -> AppResult<ApiResponse<Option<PostResponse>>> {
    let Some(post) = state.post_service.get(req.id).await? else {
        return Ok(ApiResponse::ok(None));
    };

    let post = present(&state, vec![post], user.id()).await?.pop();
    Ok(ApiResponse::ok(post))
}

/// Create post request.
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
}

/// Create a post.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state
        .post_service
        .create(
            user.id,
            CreatePostInput {
                title: req.title,
                text: req.text,
            },
        )
        .await?;

    Ok(ApiResponse::ok(PostResponse::new(
        post,
        Some(user.into()),
        None,
    )))
}

/// Update post request.
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub id: i32,
    pub title: Option<String>,
    pub text: Option<String>,
}

/// Edit one of the caller's posts. Null if the post does not exist.
async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<ApiResponse<Option<PostResponse>>> {
    let viewer_id = user.id;
    let Some(post) = state
        .post_service
        .update(
            req.id,
            viewer_id,
            UpdatePostInput {
                title: req.title,
                text: req.text,
            },
        )
        .await?
    else {
        return Ok(ApiResponse::ok(None));
    };

    let status = state.loaders.vote_status(Some(viewer_id)).load(post.id).await?;
    Ok(ApiResponse::ok(Some(PostResponse::new(
        post,
        Some(user.into()),
        status,
    ))))
}

/// Delete one of the caller's posts.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PostIdRequest>,
) -> AppResult<ApiResponse<bool>> {
    let deleted = state.post_service.delete(req.id, user.id).await?;
    Ok(ApiResponse::ok(deleted))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vote", post(vote))
        .route("/list", post(list))
        .route("/show", post(show))
        .route("/create", post(create))
        .route("/update", post(update))
        .route("/delete", post(delete))
}
