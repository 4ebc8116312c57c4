//! Post service.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::Deserialize;
use tracing::info;
use updoot_common::{AppError, AppResult};
use updoot_db::{entities::post, repositories::PostRepository};
use validator::Validate;

/// Maximum page size for post listings.
pub const MAX_PAGE_SIZE: u64 = 50;

/// Length of the text preview shown in listings, in characters.
pub const SNIPPET_LEN: usize = 50;

/// Input for creating a post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 256))]
    pub title: String,

    #[validate(length(max = 10000))]
    pub text: String,
}

/// Input for updating a post. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePostInput {
    #[validate(length(min = 1, max = 256))]
    pub title: Option<String>,

    #[validate(length(max = 10000))]
    pub text: Option<String>,
}

/// One page of posts, newest first.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<post::Model>,
    pub has_more: bool,
}

/// First [`SNIPPET_LEN`] characters of a post's text.
#[must_use]
pub fn text_snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LEN).collect()
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(post_repo: PostRepository) -> Self {
        Self { post_repo }
    }

    /// List posts newest first.
    ///
    /// `cursor` is a creation time in milliseconds since the epoch; only
    /// posts created strictly before it are returned.
    pub async fn list(&self, limit: u64, cursor: Option<&str>) -> AppResult<PostPage> {
        let limit = limit.min(MAX_PAGE_SIZE);
        let before = cursor.map(parse_cursor).transpose()?;

        let mut posts = self
            .post_repo
            .find_recent(limit + 1, before.map(Into::into))
            .await?;

        let has_more = posts.len() as u64 > limit;
        posts.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(PostPage { posts, has_more })
    }

    /// Get a post by ID.
    pub async fn get(&self, id: i32) -> AppResult<Option<post::Model>> {
        self.post_repo.find_by_id(id).await
    }

    /// Create a post. New posts start with zero points.
    pub async fn create(&self, creator_id: i32, input: CreatePostInput) -> AppResult<post::Model> {
        input.validate()?;

        let now = Utc::now();
        let model = post::ActiveModel {
            title: Set(input.title),
            text: Set(input.text),
            points: Set(0),
            creator_id: Set(creator_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let created = self.post_repo.create(model).await?;
        info!(post_id = created.id, creator_id, "Post created");
        Ok(created)
    }

    /// Update a post's title and/or text. Only the creator may edit.
    ///
    /// Returns `None` when the post does not exist.
    pub async fn update(
        &self,
        id: i32,
        editor_id: i32,
        input: UpdatePostInput,
    ) -> AppResult<Option<post::Model>> {
        input.validate()?;

        let Some(existing) = self.post_repo.find_by_id(id).await? else {
            return Ok(None);
        };

        if existing.creator_id != editor_id {
            return Err(AppError::Forbidden("Not the creator of this post".to_string()));
        }

        let mut active: post::ActiveModel = existing.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(text) = input.text {
            active.text = Set(text);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = self.post_repo.update(active).await?;
        Ok(Some(updated))
    }

    /// Delete a post. Only the creator may delete.
    ///
    /// Returns `false` when the post does not exist.
    pub async fn delete(&self, id: i32, user_id: i32) -> AppResult<bool> {
        let Some(existing) = self.post_repo.find_by_id(id).await? else {
            return Ok(false);
        };

        if existing.creator_id != user_id {
            return Err(AppError::Forbidden("Not the creator of this post".to_string()));
        }

        self.post_repo.delete(id).await?;
        info!(post_id = id, user_id, "Post deleted");
        Ok(true)
    }
}

fn parse_cursor(cursor: &str) -> AppResult<DateTime<Utc>> {
    cursor
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid cursor: {cursor}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn create_test_post(id: i32, creator_id: i32) -> post::Model {
        post::Model {
            id,
            title: format!("Post {id}"),
            text: "Lorem ipsum".to_string(),
            points: 0,
            creator_id,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn service(db: MockDatabase) -> PostService {
        PostService::new(PostRepository::new(Arc::new(db.into_connection())))
    }

    #[test]
    fn test_text_snippet() {
        assert_eq!(text_snippet("short"), "short");

        let long = "x".repeat(120);
        assert_eq!(text_snippet(&long).len(), 50);

        let multibyte = "é".repeat(60);
        assert_eq!(text_snippet(&multibyte).chars().count(), 50);
    }

    #[test]
    fn test_parse_cursor() {
        let parsed = parse_cursor("1700000000000").unwrap();
        assert_eq!(parsed.timestamp_millis(), 1_700_000_000_000);

        assert!(matches!(parse_cursor("yesterday"), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_list_has_more() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results(
            [[
                create_test_post(3, 1),
                create_test_post(2, 1),
                create_test_post(1, 1),
            ]],
        ));

        let page = service.list(2, None).await.unwrap();

        assert!(page.has_more);
        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.posts[0].id, 3);
    }

    #[tokio::test]
    async fn test_list_last_page() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post(1, 1)]]),
        );

        let page = service.list(10, Some("1700000000000")).await.unwrap();

        assert!(!page.has_more);
        assert_eq!(page.posts.len(), 1);
    }

    #[tokio::test]
    async fn test_list_caps_limit() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );
        let service = PostService::new(PostRepository::new(Arc::clone(&db)));

        service.list(500, None).await.unwrap();

        drop(service);
        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        let values = log[0].statements()[0].values.as_ref().unwrap();
        assert!(
            values
                .0
                .iter()
                .any(|v| *v == sea_orm::Value::BigUnsigned(Some(MAX_PAGE_SIZE + 1)))
        );
    }

    #[tokio::test]
    async fn test_update_missing_post() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()]),
        );

        let result = service
            .update(9, 1, UpdatePostInput::default())
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_by_other_user_forbidden() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post(1, 10)]]),
        );

        let result = service
            .update(
                1,
                11,
                UpdatePostInput {
                    title: Some("Mine now".to_string()),
                    text: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .create(
                1,
                CreatePostInput {
                    title: String::new(),
                    text: "body".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post(1, 10)]])
                .append_query_results([Vec::<post::Model>::new()])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }]),
        );

        assert!(service.delete(1, 10).await.unwrap());
        assert!(!service.delete(2, 10).await.unwrap());
    }
}
