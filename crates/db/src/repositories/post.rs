//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, post};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use updoot_common::{AppError, AppResult};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i32) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Get posts newest first, optionally only those created before `before`.
    pub async fn find_recent(
        &self,
        limit: u64,
        before: Option<DateTimeWithTimeZone>,
    ) -> AppResult<Vec<post::Model>> {
        let mut query = Post::find()
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(limit);

        if let Some(before) = before {
            query = query.filter(post::Column::CreatedAt.lt(before));
        }

        query
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post. Its updoots are removed by the foreign key cascade.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        Post::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ==================== Score (vote transaction only) ====================

    /// Load a post and lock its row until the surrounding transaction ends.
    pub async fn lock_by_id<C>(&self, conn: &C, id: i32) -> Result<Option<post::Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Post::find_by_id(id).lock_exclusive().one(conn).await
    }

    /// Add `delta` to the post's points atomically (single UPDATE, no fetch).
    ///
    /// Returns the number of rows touched, 0 when the post does not exist.
    pub async fn add_points<C>(&self, conn: &C, id: i32, delta: i32) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let result = Post::update_many()
            .col_expr(post::Column::Points, Expr::col(post::Column::Points).add(delta))
            .filter(post::Column::Id.eq(id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}
